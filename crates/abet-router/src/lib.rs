//! Navigation for the ABET console.
//!
//! - [`RouteTable`]: the application's routes and their access metadata
//! - [`authorize`]: the pure access decision for one navigation
//! - [`RouteGuard`]: runs [`authorize`] against the live session
//! - [`Router`]: follows guard redirects to a final location

mod guard;
mod route;
mod router;

pub use guard::{authorize, GuardCheck, NavigationDecision, Redirect, RedirectReason, RouteGuard};
pub use route::{Route, RouteMeta, RouteName, RouteTable, Target, DEFAULT_LANDING_PATH, LOGIN_PATH};
pub use router::{Navigation, Router, RouterError, RouterResult, MAX_REDIRECTS};
