//! Typed session persistence on top of a [`PersistentStore`].
//!
//! The whole session is one JSON record under [`StorageKeys::SESSION`], so
//! saving it is a single `set`. Older clients stored the session as separate
//! keys (`authToken`, `currentUser`, `programs`, `currentProgramId`);
//! [`SessionVault::load`] reads that layout once and migrates it.
//!
//! Record types loaded through the vault must accept the field names
//! `token`, `user`, `programs` and `currentProgramId`, which is what the
//! migration assembles.

use crate::{PersistentStore, StorageError, StorageKeys};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The underlying store failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A stored record exists but cannot be decoded
    #[error("Corrupt session record: {0}")]
    Corrupt(String),
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Session record persistence.
#[derive(Clone)]
pub struct SessionVault {
    store: Arc<dyn PersistentStore>,
}

impl SessionVault {
    /// Create a vault over the given store.
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Persist `record`, replacing any previous session.
    pub fn save<T: Serialize>(&self, record: &T) -> VaultResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.store.set(StorageKeys::SESSION, &json)?;
        Ok(())
    }

    /// Load the stored session.
    ///
    /// Returns `Ok(None)` when nothing is stored and `VaultError::Corrupt`
    /// when something is stored but does not decode.
    pub fn load<T: DeserializeOwned + Serialize>(&self) -> VaultResult<Option<T>> {
        if let Some(json) = self.store.get(StorageKeys::SESSION)? {
            let record = serde_json::from_str(&json)
                .map_err(|e| VaultError::Corrupt(e.to_string()))?;
            return Ok(Some(record));
        }

        let Some(legacy) = self.read_legacy()? else {
            return Ok(None);
        };

        let record: T = serde_json::from_value(legacy)
            .map_err(|e| VaultError::Corrupt(format!("legacy session: {}", e)))?;

        self.save(&record)?;
        self.remove_legacy();
        info!("Migrated legacy session keys to single session record");

        Ok(Some(record))
    }

    /// Whether a session (current or legacy layout) is stored.
    pub fn has_session(&self) -> VaultResult<bool> {
        if self.store.has(StorageKeys::SESSION)? {
            return Ok(true);
        }
        let has_token = self.store.has(StorageKeys::LEGACY_AUTH_TOKEN)?;
        let has_user = self.store.has(StorageKeys::LEGACY_CURRENT_USER)?;
        Ok(has_token && has_user)
    }

    /// Remove the stored session in both layouts.
    pub fn clear(&self) -> VaultResult<()> {
        self.store.remove(StorageKeys::SESSION)?;
        self.remove_legacy();
        Ok(())
    }

    /// Assemble a record from the legacy keys, if both the token and the
    /// user are present.
    fn read_legacy(&self) -> VaultResult<Option<Value>> {
        let token = self.store.get(StorageKeys::LEGACY_AUTH_TOKEN)?;
        let user = self.store.get(StorageKeys::LEGACY_CURRENT_USER)?;
        let (Some(token), Some(user)) = (token, user) else {
            return Ok(None);
        };

        debug!("Found legacy session keys");

        let parse = |key: &str, raw: &str| {
            serde_json::from_str::<Value>(raw)
                .map_err(|e| VaultError::Corrupt(format!("legacy {}: {}", key, e)))
        };

        let mut record = Map::new();
        record.insert("token".into(), Value::String(token));
        record.insert("user".into(), parse(StorageKeys::LEGACY_CURRENT_USER, &user)?);

        if let Some(programs) = self.store.get(StorageKeys::LEGACY_PROGRAMS)? {
            record.insert("programs".into(), parse(StorageKeys::LEGACY_PROGRAMS, &programs)?);
        }

        // Older clients wrote "undefined"/"null" here when no program was set
        if let Some(raw) = self.store.get(StorageKeys::LEGACY_CURRENT_PROGRAM_ID)? {
            if let Ok(id) = raw.trim().parse::<i64>() {
                record.insert("currentProgramId".into(), Value::from(id));
            }
        }

        Ok(Some(Value::Object(record)))
    }

    fn remove_legacy(&self) {
        for key in StorageKeys::LEGACY {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to remove legacy session key");
            }
        }
    }
}
