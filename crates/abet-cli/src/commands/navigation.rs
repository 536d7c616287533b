//! Navigation commands.

use crate::context::AppContext;
use crate::output::{self, OutputFormat};
use abet_router::RedirectReason;
use anyhow::Result;

fn reason_text(reason: RedirectReason) -> &'static str {
    match reason {
        RedirectReason::LoginRequired => "login required",
        RedirectReason::AdminRequired => "admin only",
        RedirectReason::AlreadyLoggedIn => "already logged in",
    }
}

/// Resolve a navigation the way the guard would.
pub async fn navigate(ctx: &AppContext, path: &str, format: &OutputFormat) -> Result<()> {
    let navigation = ctx.router.navigate(path)?;

    match format {
        OutputFormat::Text => {
            for redirect in &navigation.redirects {
                println!(
                    "  -> {} ({})",
                    redirect.location(),
                    reason_text(redirect.reason)
                );
            }
            output::print_row("Location", &navigation.location);
            output::print_row(
                "Route",
                navigation
                    .route
                    .map(|route| route.as_str())
                    .unwrap_or("(no route)"),
            );
            for (name, value) in &navigation.params {
                output::print_row(name, value);
            }
        }
        OutputFormat::Json => output::print_json(&navigation)?,
    }

    Ok(())
}

/// List the route table.
pub async fn routes(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    let routes = ctx.router.table().routes();

    match format {
        OutputFormat::Text => {
            output::print_heading("Routes");
            println!("{:<42} {:<20} {:<6} {}", "Pattern", "Name", "Auth", "Admin");
            for route in routes {
                println!(
                    "{:<42} {:<20} {:<6} {}",
                    route.pattern,
                    route.name.as_str(),
                    if route.meta.requires_auth { "yes" } else { "no" },
                    if route.meta.requires_admin { "yes" } else { "no" }
                );
            }
        }
        OutputFormat::Json => {
            let routes: Vec<_> = routes
                .iter()
                .map(|route| {
                    serde_json::json!({
                        "name": route.name.as_str(),
                        "pattern": route.pattern,
                        "meta": route.meta,
                    })
                })
                .collect();
            output::print_json(&routes)?;
        }
    }

    Ok(())
}
