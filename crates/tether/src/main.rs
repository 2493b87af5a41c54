//! Tether - operator CLI for file-backed session storage.
//!
//! Main entry point for the `tether` binary.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

use commands::{list, purge, show, sweep};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Tether - inspect and maintain file-backed session storage
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Session directory (overrides the config file)
    #[arg(long, global = true, env = "TETHER_SESSION_DIR")]
    pub dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete expired and corrupt session files
    Sweep(sweep::SweepArgs),

    /// List stored sessions
    List(list::ListArgs),

    /// Show one session record without refreshing it
    Show(show::ShowArgs),

    /// Destroy one session
    Purge(purge::PurgeArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = match &cli.command {
        Commands::Sweep(args) if args.watch => args.log_dir.clone(),
        _ => None,
    };
    let _guard = init_tracing(cli.verbose, log_dir.as_deref());

    let ctx = commands::Context::resolve(
        cli.config.as_deref(),
        cli.dir.clone(),
        cli.json,
        cli.verbose,
    )?;

    match cli.command {
        Commands::Sweep(args) => sweep::run(args, &ctx).await,
        Commands::List(args) => list::run(args, &ctx).await,
        Commands::Show(args) => show::run(args, &ctx).await,
        Commands::Purge(args) => purge::run(args, &ctx).await,
    }
}

/// Console logging on stderr, plus a daily-rotated JSON file when `log_dir`
/// is given.
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let filter = if verbose {
        "tether=debug,tether_session=debug,info"
    } else {
        "tether=info,tether_session=warn,warn"
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::EnvFilter::new(filter));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "tether.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_filter(tracing_subscriber::EnvFilter::new(
                            "tether=trace,tether_session=debug,info",
                        )),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            None
        }
    }
}
