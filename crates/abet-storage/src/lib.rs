//! Persistent storage for the ABET assessment console.
//!
//! This crate provides:
//! - The [`PersistentStore`] key/value abstraction (a durable per-origin
//!   storage area, the console's equivalent of browser local storage)
//! - [`MemoryStore`] for tests and ephemeral runs
//! - [`FileStore`], a JSON file per server origin with atomic rewrites
//! - [`SessionVault`], the typed single-record session layer on top

mod file;
mod keys;
mod memory;
mod traits;
mod vault;

pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use traits::PersistentStore;
pub use vault::{SessionVault, VaultError, VaultResult};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
