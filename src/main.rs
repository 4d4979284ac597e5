//! Desktop Commander MCP server.
//!
//! Run with `desktop-commander` to serve over stdin/stdout, or
//! `desktop-commander setup` / `desktop-commander remove` for maintenance.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use desktop_commander::config::default_config_path;
use desktop_commander::{maintenance, report_startup_failure, supervisor, McpError, Orchestrator};

/// Desktop Commander MCP server.
///
/// Communicates via JSON-RPC 2.0 over stdin/stdout.
#[derive(Parser)]
#[command(name = "desktop-commander")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration document.
    #[arg(long, value_name = "PATH", env = "DESKTOP_COMMANDER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging to stderr.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Maintenance>,
}

/// Maintenance verbs; each replaces normal startup entirely.
#[derive(Subcommand)]
enum Maintenance {
    /// Write the default configuration if none exists.
    Setup,
    /// Delete the configuration document.
    Remove,
}

fn init_logging(verbose: bool) -> Result<(), McpError> {
    let default = if verbose {
        "desktop_commander=debug"
    } else {
        "desktop_commander=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| McpError::Internal(format!("failed to initialize logging: {}", e)))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(default_config_path);

    if let Err(e) = init_logging(args.verbose) {
        report_startup_failure(&mut tokio::io::stdout(), &e.to_string()).await;
        return ExitCode::FAILURE;
    }

    if let Some(verb) = args.command {
        let result = match verb {
            Maintenance::Setup => maintenance::setup(&config_path).await,
            Maintenance::Remove => maintenance::remove(&config_path).await,
        };
        return match result {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    supervisor::install_panic_hook();

    let supervisor = match Orchestrator::new(config_path)
        .start(tokio::io::stdin(), tokio::io::stdout())
        .await
    {
        Ok(supervisor) => supervisor,
        Err(e) => {
            report_startup_failure(&mut tokio::io::stdout(), &e.to_string()).await;
            return ExitCode::FAILURE;
        }
    };

    match supervisor.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: Server error: {}", e);
            // A blocked stdin read would stall runtime shutdown.
            std::process::exit(1);
        }
    }
}
