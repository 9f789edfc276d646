// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `MeterBar` CLI - usage and spend tracking for metered services.
//!
//! # Examples
//!
//! ```bash
//! # Show usage for the enabled providers
//! meterbar
//!
//! # Show usage for specific providers
//! meterbar --provider claude,copilot
//!
//! # JSON output
//! meterbar --format json --pretty
//!
//! # End-of-month projection, refreshing Copilot's billing history first
//! meterbar cost --provider copilot --backfill
//!
//! # Dump an undocumented binary cache blob
//! meterbar decode blob.bin --base64
//!
//! # Watch mode
//! meterbar watch --interval 60
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, cost, decode, providers, usage, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// `MeterBar` CLI - usage and spend tracking.
#[derive(Parser)]
#[command(name = "meterbar")]
#[command(about = "Usage and spend tracking for metered AI and search services")]
#[command(long_about = r#"
MeterBar polls every enabled provider concurrently, reconciles multiple
accounts per provider, and forecasts end-of-month spend.

Credentials are read from METERBAR_<PROVIDER>_TOKEN variables (plus
numbered _TOKEN_<n> variants for extra accounts) and from each vendor's
own local login where one exists.

Examples:
  meterbar                       # Enabled providers
  meterbar --provider all        # Every known provider
  meterbar --provider copilot    # Single provider
  meterbar --format json         # JSON output
  meterbar cost --backfill       # Projection after a history refresh
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Providers to query for this run: "all", "default", or a
    /// comma-separated list such as "claude,copilot".
    #[arg(long, short, global = true)]
    pub provider: Option<String>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch current usage (default if no command specified).
    #[command(visible_alias = "u")]
    Usage,

    /// Show cost history and the end-of-month projection.
    #[command(visible_alias = "c")]
    Cost(cost::CostArgs),

    /// List available providers.
    #[command(visible_alias = "p")]
    Providers,

    /// Refresh on the configured cadence until interrupted.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Dump the field tree of a binary cache blob.
    Decode(decode::DecodeArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No selected provider produced data.
    ProviderMissing = 2,
    /// Input could not be decoded.
    ParseError = 3,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn log_directives(verbose: bool, quiet: bool) -> Option<&'static str> {
    if quiet {
        None
    } else if verbose {
        Some("meterbar=debug,info")
    } else {
        Some("meterbar=warn")
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let Some(directives) = log_directives(verbose, quiet) else {
        return;
    };
    let filter = EnvFilter::new(directives);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Usage) | None => usage::run(&cli).await,
        Some(Commands::Cost(args)) => cost::run(args, &cli).await,
        Some(Commands::Providers) => providers::run(&cli).await,
        Some(Commands::Watch(args)) => watch::run(args, &cli).await,
        Some(Commands::Decode(args)) => decode::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
    };

    match result {
        Ok(code) => {
            if !matches!(code, ExitCode::Success) {
                std::process::exit(code as i32);
            }
        }
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
