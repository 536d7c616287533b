//! ABET console - command-line client for the assessment server.

mod commands;
mod context;
mod output;

use abet_config::{init_logging, normalize_filter, Config, LogOptions, Paths, DEFAULT_LOG_LEVEL};
use anyhow::Result;
use clap::{Parser, Subcommand};
use context::AppContext;
use tracing::{debug, warn};

/// ABET console - sign in to the assessment server and check access.
#[derive(Parser)]
#[command(name = "abet")]
#[command(about = "Command-line client for the ABET assessment server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Assessment server URL; overrides the configured one
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login {
        /// Account email
        email: String,
        /// Password (prompted when omitted)
        #[arg(long, env = "ABET_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Logout and clear the stored session
    Logout,

    /// Show the stored session
    Status,

    /// Re-fetch the current user from the server
    Refresh,

    /// List the programs you can access
    Programs {
        /// Fetch the list from the server first
        #[arg(long)]
        refresh: bool,
    },

    /// Make a program the active one
    SwitchProgram {
        /// Program ID
        program_id: i64,
    },

    /// Check where a navigation to PATH ends up
    Navigate {
        /// Route path, e.g. /3/summary
        path: String,
    },

    /// List the route table
    Routes,
}

async fn run(cli: Cli) -> Result<()> {
    let paths = Paths::new()?;
    let mut config = Config::load(&paths)?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }

    let requested = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    let filter = normalize_filter(&requested);
    init_logging(LogOptions {
        default_level: filter
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        log_path: Some(paths.log_file()),
        also_stderr: false,
    })?;
    if filter.is_none() {
        warn!(level = %requested, "Unknown log level, using {}", DEFAULT_LOG_LEVEL);
    }

    let ctx = AppContext::new(paths, config)?;
    let format = &cli.format;

    debug!(api_url = %ctx.api_url, "Running command");

    match cli.command {
        Commands::Login { email, password } => {
            commands::login(&ctx, &email, password, format).await
        }
        Commands::Signup {
            first_name,
            last_name,
            email,
        } => commands::signup(&ctx, first_name, last_name, email, format).await,
        Commands::Logout => commands::logout(&ctx, format).await,
        Commands::Status => commands::status(&ctx, format).await,
        Commands::Refresh => commands::refresh(&ctx, format).await,
        Commands::Programs { refresh } => commands::programs(&ctx, refresh, format).await,
        Commands::SwitchProgram { program_id } => {
            commands::switch_program(&ctx, program_id, format).await
        }
        Commands::Navigate { path } => commands::navigate(&ctx, &path, format).await,
        Commands::Routes => commands::routes(&ctx, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login() {
        let cli = Cli::try_parse_from(["abet", "login", "jo@uni.edu", "--password", "pw"]).unwrap();
        match cli.command {
            Commands::Login { email, password } => {
                assert_eq!(email, "jo@uni.edu");
                assert_eq!(password.as_deref(), Some("pw"));
            }
            _ => panic!("expected login"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "abet",
            "navigate",
            "/3/summary",
            "--format",
            "json",
            "--api-url",
            "https://abet.example.edu",
        ])
        .unwrap();

        assert_eq!(cli.format, output::OutputFormat::Json);
        assert_eq!(cli.api_url.as_deref(), Some("https://abet.example.edu"));
        assert!(matches!(cli.command, Commands::Navigate { ref path } if path == "/3/summary"));
    }

    #[test]
    fn test_switch_program_requires_numeric_id() {
        assert!(Cli::try_parse_from(["abet", "switch-program", "abc"]).is_err());
        assert!(Cli::try_parse_from(["abet", "switch-program", "7"]).is_ok());
    }
}
