//! Authentication commands.

use super::{describe_user, failure_message, require_session};
use crate::context::AppContext;
use crate::output::{self, OutputFormat};
use abet_auth::AuthError;
use anyhow::Result;
use std::io::{self, Write};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}

/// Login with email and password.
pub async fn login(
    ctx: &AppContext,
    email: &str,
    password: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.restore();

    let snapshot = ctx.session.snapshot();
    if let Some(user) = snapshot.user.as_ref().filter(|_| snapshot.is_logged_in()) {
        if user.email.eq_ignore_ascii_case(email) {
            output::print_success(&format!("Already logged in as {}", user.email), format);
            return Ok(());
        }
    }

    let password = password_or_prompt(password)?;

    match ctx.session.login(email, &password).await {
        Ok(response) => match format {
            OutputFormat::Text => {
                println!(
                    "Logged in as {} ({})",
                    describe_user(&response.user),
                    response.user.role
                );
            }
            OutputFormat::Json => output::print_json(&serde_json::json!({
                "status": "success",
                "user": response.user,
                "programs": response.programs,
            }))?,
        },
        Err(e) => anyhow::bail!(failure_message(ctx, &e)),
    }

    Ok(())
}

/// Create an account.
pub async fn signup(
    ctx: &AppContext,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let first_name = match first_name {
        Some(value) => value,
        None => prompt("First name")?,
    };
    let last_name = match last_name {
        Some(value) => value,
        None => prompt("Last name")?,
    };
    let email = match email {
        Some(value) => value,
        None => prompt("Email")?,
    };
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }

    let password = password_or_prompt(None)?;
    let confirmation = rpassword::prompt_password("Confirm password: ")?;
    if password != confirmation {
        anyhow::bail!("Passwords do not match");
    }

    ctx.restore();
    let response = match ctx
        .session
        .signup(&first_name, &last_name, &email, &password)
        .await
    {
        Ok(response) => response,
        Err(e) => anyhow::bail!(failure_message(ctx, &e)),
    };

    let logged_in = ctx.session.is_logged_in();
    match format {
        OutputFormat::Text => {
            println!("Account created for {}", describe_user(&response.user));
            if logged_in {
                println!("You are now logged in.");
            } else {
                println!("Run 'abet login {}' to sign in.", response.user.email);
            }
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "status": "success",
            "user": response.user,
            "logged_in": logged_in,
        }))?,
    }

    Ok(())
}

/// Logout and clear the stored session.
pub async fn logout(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    if !ctx.session.has_stored_session() {
        output::print_success("Already logged out", format);
        return Ok(());
    }
    ctx.session.logout();
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Show the stored session.
pub async fn status(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    ctx.restore();
    let snapshot = ctx.session.snapshot();

    match format {
        OutputFormat::Text => {
            println!("Server:   {}", ctx.api_url);
            match &snapshot.user {
                Some(user) if snapshot.is_logged_in() => {
                    println!("Auth:     logged in");
                    println!("User:     {}", describe_user(user));
                    println!("User ID:  {}", snapshot.user_id());
                    println!("Role:     {}", user.role);
                    match snapshot.current_program_id {
                        Some(id) => println!("Program:  {}", id),
                        None => println!("Program:  none selected"),
                    }
                }
                _ => println!("Auth:     not logged in"),
            }
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "api_url": ctx.api_url.as_str(),
            "storage_file": ctx.paths.storage_file(&ctx.api_url),
            "logged_in": snapshot.is_logged_in(),
            "is_admin": snapshot.is_admin(),
            "is_instructor": snapshot.is_instructor(),
            "user_id": snapshot.user_id(),
            "user_full_name": snapshot.user_full_name(),
            "session": snapshot,
        }))?,
    }

    Ok(())
}

/// Re-fetch the current user from the server.
pub async fn refresh(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    require_session(ctx)?;

    match ctx.session.refresh_user().await {
        Ok(Some(user)) => match format {
            OutputFormat::Text => {
                println!("Refreshed {} ({})", describe_user(&user), user.role)
            }
            OutputFormat::Json => output::print_json(&serde_json::json!({
                "status": "success",
                "user": user,
            }))?,
        },
        Ok(None) => anyhow::bail!("Not logged in"),
        Err(e) => anyhow::bail!(refresh_failure(&e, ctx.session.is_logged_in())),
    }

    Ok(())
}

/// Describe a failed refresh. The session survives a storage failure or a
/// superseded refresh, and ends on anything the server said.
fn refresh_failure(error: &AuthError, still_logged_in: bool) -> String {
    if still_logged_in {
        format!("Could not refresh user ({}); your session was kept", error)
    } else if error.is_transient() {
        format!(
            "Could not reach the server ({}); you have been logged out, login again once it is back",
            error
        )
    } else {
        format!("Session is no longer valid ({}); you have been logged out", error)
    }
}
