//! CLI command implementations.

mod auth;
mod navigation;
mod programs;

pub use auth::{login, logout, refresh, signup, status};
pub use navigation::{navigate, routes};
pub use programs::{programs, switch_program};

use crate::context::AppContext;
use abet_auth::{AuthError, User};
use anyhow::Result;

/// Restore the stored session and require that it is logged in.
fn require_session(ctx: &AppContext) -> Result<()> {
    ctx.restore();
    if !ctx.session.is_logged_in() {
        anyhow::bail!("Not logged in. Run 'abet login <email>' first");
    }
    Ok(())
}

/// The message the session recorded for a failed operation, or the error
/// itself.
fn failure_message(ctx: &AppContext, error: &AuthError) -> String {
    ctx.session
        .snapshot()
        .error
        .unwrap_or_else(|| error.to_string())
}

fn describe_user(user: &User) -> String {
    if user.full_name() == user.email {
        user.email.clone()
    } else {
        format!("{} <{}>", user.full_name(), user.email)
    }
}
