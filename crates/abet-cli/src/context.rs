//! Per-run application context.

use abet_auth::{HttpAuthApi, RestoreOutcome, SessionManager};
use abet_config::{Config, Paths};
use abet_router::Router;
use abet_storage::{FileStore, SessionVault, StorageError};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Everything a command needs: one session per run, shared with the router.
pub struct AppContext {
    pub paths: Paths,
    pub config: Config,
    pub api_url: Url,
    pub session: Arc<SessionManager>,
    pub router: Router,
}

impl AppContext {
    /// Wire the session and router for the server in `config`.
    ///
    /// A storage file that is not valid JSON is removed; the run then
    /// starts logged out.
    pub fn new(paths: Paths, config: Config) -> Result<Self> {
        let api_url = config.api_url()?;
        paths.ensure_dirs()?;

        let storage_file = paths.storage_file(&api_url);
        let store = match FileStore::open(&storage_file) {
            Ok(store) => store,
            Err(StorageError::Encoding(reason)) => {
                warn!(
                    path = %storage_file.display(),
                    reason = %reason,
                    "Storage file is corrupt, starting without a session"
                );
                std::fs::remove_file(&storage_file)
                    .with_context(|| format!("Failed to remove {}", storage_file.display()))?;
                FileStore::open(&storage_file)?
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {}", storage_file.display()))
            }
        };
        let vault = SessionVault::new(Arc::new(store));

        let api = HttpAuthApi::new(api_url.clone(), config.request_timeout())?;
        let session = Arc::new(SessionManager::new(vault, Arc::new(api)));
        session.set_state_callback(Box::new(|change| {
            debug!(
                phase = %change.phase,
                holds_token = change.phase.holds_token(),
                user_id = ?change.user_id,
                "Session phase changed"
            );
        }));
        let router = Router::new(session.clone());

        debug!(api_url = %api_url, storage = %storage_file.display(), "Context ready");

        Ok(Self {
            paths,
            config,
            api_url,
            session,
            router,
        })
    }

    /// Restore the stored session for this server.
    pub fn restore(&self) -> RestoreOutcome {
        self.session.load_from_storage()
    }
}
