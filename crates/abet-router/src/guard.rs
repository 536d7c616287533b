//! Route authorization.

use crate::route::{RouteName, RouteTable, Target, DEFAULT_LANDING_PATH, LOGIN_PATH};
use abet_auth::{SessionManager, SessionSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

/// Why a navigation was redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    /// The route needs a session and there is none.
    LoginRequired,
    /// The route is admin-only.
    AdminRequired,
    /// Login/signup page while already logged in.
    AlreadyLoggedIn,
}

/// Where to go instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub route: RouteName,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub reason: RedirectReason,
}

impl Redirect {
    /// Path plus encoded query.
    pub fn location(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        format!("{}?{}", self.path, query)
    }

    /// Value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum NavigationDecision {
    Allow,
    Redirect(Redirect),
}

/// Decide whether `session` may enter `target`. The first matching rule
/// wins.
pub fn authorize(target: &Target, session: &SessionSnapshot) -> NavigationDecision {
    let logged_in = session.is_logged_in();

    if target.meta.requires_auth && !logged_in {
        return NavigationDecision::Redirect(Redirect {
            route: RouteName::Login,
            path: LOGIN_PATH.to_string(),
            query: vec![("redirect".to_string(), target.full_path.clone())],
            reason: RedirectReason::LoginRequired,
        });
    }

    if target.meta.requires_admin && !session.is_admin() {
        return NavigationDecision::Redirect(landing(RedirectReason::AdminRequired));
    }

    if logged_in && target.route.is_some_and(|route| route.is_auth_page()) {
        return NavigationDecision::Redirect(landing(RedirectReason::AlreadyLoggedIn));
    }

    NavigationDecision::Allow
}

fn landing(reason: RedirectReason) -> Redirect {
    Redirect {
        route: RouteName::Home,
        path: DEFAULT_LANDING_PATH.to_string(),
        query: Vec::new(),
        reason,
    }
}

/// Result of one guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardCheck {
    pub target: Target,
    pub decision: NavigationDecision,
}

/// Runs [`authorize`] before each navigation against the live session.
pub struct RouteGuard {
    session: Arc<SessionManager>,
    table: RouteTable,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionManager>, table: RouteTable) -> Self {
        Self { session, table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Check a navigation to `path`.
    ///
    /// A logged-out session is first given its one chance to restore
    /// itself from storage. The decision always uses a fresh snapshot.
    pub fn before_each(&self, path: &str) -> GuardCheck {
        let target = self.table.resolve(path);

        if !self.session.is_logged_in() {
            if let Some(outcome) = self.session.hydrate_once() {
                debug!(outcome = ?outcome, "Hydrated session before navigation");
            }
        }

        let snapshot = self.session.snapshot();
        let decision = authorize(&target, &snapshot);

        if let NavigationDecision::Redirect(redirect) = &decision {
            debug!(
                path = %target.full_path,
                reason = ?redirect.reason,
                to = %redirect.path,
                "Navigation redirected"
            );
        }

        GuardCheck { target, decision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abet_auth::testing::{user, ScriptedApi};
    use abet_auth::{Role, SessionRecord};
    use abet_storage::{MemoryStore, SessionVault};

    fn snapshot(role: Option<Role>) -> SessionSnapshot {
        match role {
            Some(role) => SessionSnapshot {
                user: Some(user(1, "someone@uni.edu", role)),
                auth_token: Some("tok".into()),
                ..Default::default()
            },
            None => SessionSnapshot::default(),
        }
    }

    fn decide(path: &str, role: Option<Role>) -> NavigationDecision {
        let target = RouteTable::standard().resolve(path);
        authorize(&target, &snapshot(role))
    }

    fn redirect(decision: NavigationDecision) -> Redirect {
        match decision {
            NavigationDecision::Redirect(redirect) => redirect,
            NavigationDecision::Allow => panic!("expected a redirect"),
        }
    }

    #[test]
    fn test_logged_out_is_sent_to_login_with_return_path() {
        let redirect = redirect(decide("/3/summary?term=fall", None));

        assert_eq!(redirect.route, RouteName::Login);
        assert_eq!(redirect.reason, RedirectReason::LoginRequired);
        assert_eq!(redirect.query_param("redirect"), Some("/3/summary?term=fall"));
        assert_eq!(
            redirect.location(),
            "/login?redirect=%2F3%2Fsummary%3Fterm%3Dfall"
        );
    }

    #[test]
    fn test_instructor_bounced_from_admin_route() {
        let redirect = redirect(decide("/3/courses", Some(Role::Instructor)));

        assert_eq!(redirect.path, DEFAULT_LANDING_PATH);
        assert_eq!(redirect.reason, RedirectReason::AdminRequired);
        assert_eq!(redirect.location(), "/");
    }

    #[test]
    fn test_admin_route_check_ignores_path_case() {
        for path in ["/3/COURSES", "/3/Instructors", "/3/INSTRUCTOR/4"] {
            let redirect = redirect(decide(path, Some(Role::Instructor)));
            assert_eq!(redirect.reason, RedirectReason::AdminRequired, "{}", path);
            assert_eq!(redirect.location(), "/");
        }
        assert_eq!(
            redirect(decide("/SIGNUP", Some(Role::Admin))).reason,
            RedirectReason::AlreadyLoggedIn
        );
    }

    #[test]
    fn test_logged_in_user_bounced_from_auth_pages() {
        for path in ["/signup", "/login"] {
            let redirect = redirect(decide(path, Some(Role::Admin)));
            assert_eq!(redirect.route, RouteName::Home);
            assert_eq!(redirect.reason, RedirectReason::AlreadyLoggedIn);
        }
    }

    #[test]
    fn test_allowed_navigations() {
        assert_eq!(decide("/login", None), NavigationDecision::Allow);
        assert_eq!(decide("/signup", None), NavigationDecision::Allow);
        assert_eq!(decide("/test-connection", None), NavigationDecision::Allow);
        assert_eq!(decide("/unknown/page", None), NavigationDecision::Allow);
        assert_eq!(decide("/3/summary", Some(Role::Instructor)), NavigationDecision::Allow);
        assert_eq!(decide("/3/instructors", Some(Role::Admin)), NavigationDecision::Allow);
    }

    #[test]
    fn test_login_rule_precedes_admin_rule() {
        let redirect = redirect(decide("/3/instructor/4", None));
        assert_eq!(redirect.reason, RedirectReason::LoginRequired);
    }

    #[test]
    fn test_user_without_token_is_logged_out() {
        let session = SessionSnapshot {
            user: Some(user(1, "a@uni.edu", Role::Admin)),
            ..Default::default()
        };
        let target = RouteTable::standard().resolve("/");
        assert_eq!(
            redirect(authorize(&target, &session)).reason,
            RedirectReason::LoginRequired
        );
    }

    #[test]
    fn test_before_each_hydrates_from_storage() {
        let vault = SessionVault::new(Arc::new(MemoryStore::new()));
        vault
            .save(&SessionRecord::new(
                "tok".into(),
                user(2, "ad@uni.edu", Role::Admin),
                Vec::new(),
            ))
            .unwrap();

        let session = Arc::new(SessionManager::new(vault, Arc::new(ScriptedApi::new())));
        let guard = RouteGuard::new(session.clone(), RouteTable::standard());

        let check = guard.before_each("/3/courses");
        assert_eq!(check.decision, NavigationDecision::Allow);
        assert_eq!(check.target.route, Some(RouteName::ProgramCourses));
        assert!(session.is_logged_in());
    }

    #[test]
    fn test_before_each_sees_logout() {
        let vault = SessionVault::new(Arc::new(MemoryStore::new()));
        vault
            .save(&SessionRecord::new(
                "tok".into(),
                user(2, "jo@uni.edu", Role::Instructor),
                Vec::new(),
            ))
            .unwrap();

        let session = Arc::new(SessionManager::new(vault, Arc::new(ScriptedApi::new())));
        let guard = RouteGuard::new(session.clone(), RouteTable::standard());
        assert_eq!(guard.before_each("/").decision, NavigationDecision::Allow);

        session.logout();

        let check = guard.before_each("/");
        assert_eq!(redirect(check.decision).reason, RedirectReason::LoginRequired);
    }
}
