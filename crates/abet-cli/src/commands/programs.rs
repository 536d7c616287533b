//! Program access commands.

use super::{failure_message, require_session};
use crate::context::AppContext;
use crate::output::{self, OutputFormat};
use anyhow::Result;

/// List the programs the user can access.
pub async fn programs(ctx: &AppContext, refresh: bool, format: &OutputFormat) -> Result<()> {
    require_session(ctx)?;

    if refresh {
        if let Err(e) = ctx.session.refresh_programs().await {
            anyhow::bail!(failure_message(ctx, &e));
        }
    }

    let snapshot = ctx.session.snapshot();

    match format {
        OutputFormat::Text => {
            if snapshot.programs.is_empty() {
                println!("No programs found");
                return Ok(());
            }

            println!("{:<3}{:<10} {:<30} {}", "", "ID", "Name", "Role");
            println!("{}", "-".repeat(60));
            for program in &snapshot.programs {
                let marker = if Some(program.program_id) == snapshot.current_program_id {
                    "*"
                } else {
                    ""
                };
                println!(
                    "{:<3}{:<10} {:<30} {}",
                    marker,
                    program.program_id,
                    program.program_name.as_deref().unwrap_or("-"),
                    program.effective_role()
                );
            }
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "current_program_id": snapshot.current_program_id,
            "programs": snapshot.programs,
        }))?,
    }

    Ok(())
}

/// Make a program the active one.
pub async fn switch_program(ctx: &AppContext, program_id: i64, format: &OutputFormat) -> Result<()> {
    require_session(ctx)?;

    match ctx.session.switch_program(program_id).await {
        Ok(Some(switch)) => output::print_success(
            &format!(
                "Switched to program {} as {}",
                switch.program_id, switch.role
            ),
            format,
        ),
        Ok(None) => anyhow::bail!("Not logged in"),
        Err(e) => anyhow::bail!(failure_message(ctx, &e)),
    }

    Ok(())
}
