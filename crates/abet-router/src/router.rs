//! Navigation with redirect following.

use crate::guard::{NavigationDecision, Redirect, RouteGuard};
use crate::route::{RouteName, RouteTable};
use abet_auth::SessionManager;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Most redirects a single navigation may follow.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Redirect loop: gave up on {path} after {hops} redirects")]
    RedirectLoop { path: String, hops: usize },
}

pub type RouterResult<T> = Result<T, RouterError>;

/// Where a navigation ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteName>,
    pub params: BTreeMap<String, String>,
    /// Redirects taken, in order.
    pub redirects: Vec<Redirect>,
}

impl Navigation {
    pub fn was_redirected(&self) -> bool {
        !self.redirects.is_empty()
    }
}

pub struct Router {
    guard: RouteGuard,
}

impl Router {
    /// Router over the standard route table.
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self::with_table(session, RouteTable::standard())
    }

    pub fn with_table(session: Arc<SessionManager>, table: RouteTable) -> Self {
        Self {
            guard: RouteGuard::new(session, table),
        }
    }

    pub fn table(&self) -> &RouteTable {
        self.guard.table()
    }

    /// Navigate to `path`, following guard redirects.
    pub fn navigate(&self, path: &str) -> RouterResult<Navigation> {
        let mut location = path.to_string();
        let mut redirects = Vec::new();

        loop {
            let check = self.guard.before_each(&location);

            match check.decision {
                NavigationDecision::Allow => {
                    debug!(
                        location = %check.target.full_path,
                        redirects = redirects.len(),
                        "Navigation allowed"
                    );
                    return Ok(Navigation {
                        location: check.target.full_path,
                        route: check.target.route,
                        params: check.target.params,
                        redirects,
                    });
                }
                NavigationDecision::Redirect(redirect) => {
                    if redirects.len() == MAX_REDIRECTS {
                        warn!(path, hops = MAX_REDIRECTS, "Redirect loop");
                        return Err(RouterError::RedirectLoop {
                            path: path.to_string(),
                            hops: MAX_REDIRECTS,
                        });
                    }
                    location = redirect.location();
                    redirects.push(redirect);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::RedirectReason;
    use crate::route::{Route, RouteMeta};
    use abet_auth::testing::{user, ScriptedApi};
    use abet_auth::{Role, SessionRecord};
    use abet_storage::{MemoryStore, SessionVault};

    fn session(role: Option<Role>) -> Arc<SessionManager> {
        let vault = SessionVault::new(Arc::new(MemoryStore::new()));
        if let Some(role) = role {
            vault
                .save(&SessionRecord::new(
                    "tok".into(),
                    user(1, "someone@uni.edu", role),
                    Vec::new(),
                ))
                .unwrap();
        }
        Arc::new(SessionManager::new(vault, Arc::new(ScriptedApi::new())))
    }

    #[test]
    fn test_logged_out_lands_on_login() {
        let router = Router::new(session(None));
        let nav = router.navigate("/3/summary").unwrap();

        assert_eq!(nav.route, Some(RouteName::Login));
        assert_eq!(nav.location, "/login?redirect=%2F3%2Fsummary");
        assert_eq!(nav.redirects.len(), 1);
        assert_eq!(nav.redirects[0].query_param("redirect"), Some("/3/summary"));
    }

    #[test]
    fn test_instructor_lands_on_home() {
        let router = Router::new(session(Some(Role::Instructor)));
        let nav = router.navigate("/3/instructors").unwrap();

        assert_eq!(nav.route, Some(RouteName::Home));
        assert_eq!(nav.location, "/");
        assert_eq!(nav.redirects[0].reason, RedirectReason::AdminRequired);
    }

    #[test]
    fn test_admin_visiting_signup_lands_on_home() {
        let router = Router::new(session(Some(Role::Admin)));
        let nav = router.navigate("/signup").unwrap();

        assert_eq!(nav.route, Some(RouteName::Home));
        assert_eq!(nav.redirects[0].reason, RedirectReason::AlreadyLoggedIn);
    }

    #[test]
    fn test_allowed_navigation_keeps_params() {
        let router = Router::new(session(Some(Role::Instructor)));
        let nav = router.navigate("/3/course/41").unwrap();

        assert!(!nav.was_redirected());
        assert_eq!(nav.route, Some(RouteName::Course));
        assert_eq!(nav.params["course_id"], "41");
    }

    #[test]
    fn test_redirect_loop_is_an_error() {
        // Login itself requires a session: every hop lands back on login
        let table = RouteTable::new(vec![Route::new(
            RouteName::Login,
            "/login",
            RouteMeta::AUTHENTICATED,
        )]);
        let router = Router::with_table(session(None), table);

        match router.navigate("/login") {
            Err(RouterError::RedirectLoop { path, hops }) => {
                assert_eq!(path, "/login");
                assert_eq!(hops, MAX_REDIRECTS);
            }
            other => panic!("expected redirect loop, got {other:?}"),
        }
    }
}
