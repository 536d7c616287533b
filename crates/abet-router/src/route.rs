//! Route table and path matching.
//!
//! Patterns are slash-separated; a `:name` segment captures exactly one
//! non-empty path segment. Literal segments match case-insensitively.
//! Matching ignores empty segments, so trailing and doubled slashes do not
//! matter.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Path of the login page.
pub const LOGIN_PATH: &str = "/login";
/// Path users land on by default.
pub const DEFAULT_LANDING_PATH: &str = "/";

/// Access requirements of a route. Both default to unrestricted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_admin: bool,
}

impl RouteMeta {
    pub const PUBLIC: Self = Self {
        requires_auth: false,
        requires_admin: false,
    };

    pub const AUTHENTICATED: Self = Self {
        requires_auth: true,
        requires_admin: false,
    };

    pub const ADMIN: Self = Self {
        requires_auth: true,
        requires_admin: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RouteName {
    Home,
    Login,
    Signup,
    ConnectionTest,
    Summary,
    Fcar,
    Course,
    Instructor,
    ProgramCourses,
    ProgramInstructors,
}

impl RouteName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteName::Home => "Home",
            RouteName::Login => "Login",
            RouteName::Signup => "Signup",
            RouteName::ConnectionTest => "ConnectionTest",
            RouteName::Summary => "Summary",
            RouteName::Fcar => "FCAR",
            RouteName::Course => "Course",
            RouteName::Instructor => "Instructor",
            RouteName::ProgramCourses => "ProgramCourses",
            RouteName::ProgramInstructors => "ProgramInstructors",
        }
    }

    /// Pages that only make sense while logged out.
    pub fn is_auth_page(&self) -> bool {
        matches!(self, RouteName::Login | RouteName::Signup)
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// One entry of the route table.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: RouteName,
    pub pattern: String,
    pub meta: RouteMeta,
    segments: Vec<Segment>,
}

impl Route {
    pub fn new(name: RouteName, pattern: &str, meta: RouteMeta) -> Self {
        let segments = split_segments(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(param) => Segment::Param(param.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();

        Self {
            name,
            pattern: pattern.to_string(),
            meta,
            segments,
        }
    }

    /// Match `path` (no query) and capture its params.
    fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal.eq_ignore_ascii_case(part) => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// A resolved navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// The path as requested, including query and fragment.
    pub full_path: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteName>,
    pub meta: RouteMeta,
    pub params: BTreeMap<String, String>,
}

/// The application's routes, matched in order.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The console's route table.
    pub fn standard() -> Self {
        use RouteName::*;

        Self::new(vec![
            Route::new(Home, DEFAULT_LANDING_PATH, RouteMeta::AUTHENTICATED),
            Route::new(Login, LOGIN_PATH, RouteMeta::PUBLIC),
            Route::new(Signup, "/signup", RouteMeta::PUBLIC),
            Route::new(ConnectionTest, "/test-connection", RouteMeta::PUBLIC),
            Route::new(Summary, "/:program_id/summary", RouteMeta::AUTHENTICATED),
            Route::new(Fcar, "/:program_id/fcar/:measure_id", RouteMeta::AUTHENTICATED),
            Route::new(Course, "/:program_id/course/:course_id", RouteMeta::AUTHENTICATED),
            Route::new(
                Instructor,
                "/:program_id/instructor/:instructor_id",
                RouteMeta::ADMIN,
            ),
            Route::new(ProgramCourses, "/:program_id/courses", RouteMeta::ADMIN),
            Route::new(ProgramInstructors, "/:program_id/instructors", RouteMeta::ADMIN),
        ])
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Resolve a path. Unknown paths resolve to no route with unrestricted
    /// metadata.
    pub fn resolve(&self, full_path: &str) -> Target {
        let full_path = if full_path.starts_with('/') {
            full_path.to_string()
        } else {
            format!("/{}", full_path)
        };

        let without_fragment = full_path
            .split_once('#')
            .map_or(full_path.as_str(), |(before, _)| before);
        let (path, query) = match without_fragment.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (without_fragment.to_string(), None),
        };

        let matched = self
            .routes
            .iter()
            .find_map(|route| route.matches(&path).map(|params| (route, params)));

        match matched {
            Some((route, params)) => Target {
                full_path,
                path,
                query,
                route: Some(route.name),
                meta: route.meta,
                params,
            },
            None => Target {
                full_path,
                path,
                query,
                route: None,
                meta: RouteMeta::default(),
                params: BTreeMap::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_home() {
        let target = RouteTable::standard().resolve("/");
        assert_eq!(target.route, Some(RouteName::Home));
        assert!(target.meta.requires_auth);
        assert!(target.params.is_empty());
    }

    #[test]
    fn test_params_are_captured() {
        let target = RouteTable::standard().resolve("/3/fcar/17");
        assert_eq!(target.route, Some(RouteName::Fcar));
        assert_eq!(target.params["program_id"], "3");
        assert_eq!(target.params["measure_id"], "17");
        assert_eq!(target.meta, RouteMeta::AUTHENTICATED);
    }

    #[test]
    fn test_admin_routes() {
        let table = RouteTable::standard();
        for path in ["/3/courses", "/3/instructors", "/3/instructor/9"] {
            let target = table.resolve(path);
            assert_eq!(target.meta, RouteMeta::ADMIN, "{}", path);
        }
    }

    #[test]
    fn test_query_and_trailing_slash() {
        let target = RouteTable::standard().resolve("/3/summary/?term=fall#top");
        assert_eq!(target.route, Some(RouteName::Summary));
        assert_eq!(target.path, "/3/summary/");
        assert_eq!(target.query.as_deref(), Some("term=fall"));
        assert_eq!(target.full_path, "/3/summary/?term=fall#top");
    }

    #[test]
    fn test_public_pages() {
        let table = RouteTable::standard();
        assert_eq!(table.resolve("/login").route, Some(RouteName::Login));
        assert_eq!(table.resolve("/signup").route, Some(RouteName::Signup));
        assert_eq!(
            table.resolve("/test-connection").route,
            Some(RouteName::ConnectionTest)
        );
    }

    #[test]
    fn test_unknown_path_is_unrestricted() {
        let table = RouteTable::standard();
        for path in ["/nowhere", "/3/summary/extra", "/3/course"] {
            let target = table.resolve(path);
            assert_eq!(target.route, None, "{}", path);
            assert_eq!(target.meta, RouteMeta::default());
        }
    }

    #[test]
    fn test_missing_leading_slash() {
        let target = RouteTable::standard().resolve("login");
        assert_eq!(target.full_path, "/login");
        assert_eq!(target.route, Some(RouteName::Login));
    }

    #[test]
    fn test_standard_table_patterns() {
        let table = RouteTable::standard();
        assert_eq!(table.routes().len(), 10);
        let courses = table
            .routes()
            .iter()
            .find(|route| route.name == RouteName::ProgramCourses)
            .map(|route| route.pattern.as_str());
        assert_eq!(courses, Some("/:program_id/courses"));
    }

    #[test]
    fn test_literal_segments_ignore_case() {
        let table = RouteTable::standard();

        let target = table.resolve("/3/COURSES");
        assert_eq!(target.route, Some(RouteName::ProgramCourses));
        assert_eq!(target.meta, RouteMeta::ADMIN);

        let target = table.resolve("/Login");
        assert_eq!(target.route, Some(RouteName::Login));

        // Params keep the caller's casing
        let target = table.resolve("/3/Course/CS101");
        assert_eq!(target.route, Some(RouteName::Course));
        assert_eq!(target.params["course_id"], "CS101");
    }
}
