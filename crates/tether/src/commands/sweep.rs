//! Sweep command - reclaims expired and corrupt session files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use tether_session::{SessionStore, SweepReport, Sweeper};
use tracing::info;

use super::Context;

/// Arguments for the sweep command.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Keep sweeping on an interval until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Seconds between sweeps in watch mode (defaults to the configured interval)
    #[arg(long, requires = "watch")]
    pub interval: Option<u64>,

    /// Also write JSON logs to a daily-rotated file in this directory
    #[arg(long, requires = "watch")]
    pub log_dir: Option<PathBuf>,
}

/// Run the sweep command.
pub async fn run(args: SweepArgs, ctx: &Context) -> Result<()> {
    let report = if args.watch {
        let interval = args
            .interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| ctx.config.sweep_interval());
        let store: Arc<dyn SessionStore> = Arc::new(ctx.store.clone());
        let handle = Sweeper::spawn(store, interval)?;
        info!(
            dir = %ctx.store.dir().display(),
            interval_secs = interval.as_secs(),
            "Watching session directory"
        );
        tokio::signal::ctrl_c().await?;
        handle.shutdown().await
    } else {
        ctx.store.sweep().await
    };

    print_report(&report, ctx)
}

fn print_report(report: &SweepReport, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let green = Style::new().green();
    let yellow = Style::new().yellow();

    println!();
    println!("{}", style("Session Sweep").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Directory:"), ctx.store.dir().display());
    println!("  {} {}", dim.apply_to("Scanned:"), report.scanned);
    println!("  {} {}", dim.apply_to("Retained:"), report.retained);
    println!(
        "  {} {}",
        dim.apply_to("Removed:"),
        green.apply_to(format!(
            "{} ({} expired, {} corrupt)",
            report.removed(),
            report.removed_expired,
            report.removed_corrupt
        ))
    );
    if report.stale_temp_removed > 0 || ctx.verbose {
        println!(
            "  {} {}",
            dim.apply_to("Stale temp files:"),
            report.stale_temp_removed
        );
    }
    if report.failed > 0 {
        println!(
            "  {} {}",
            dim.apply_to("Failed:"),
            yellow.apply_to(report.failed)
        );
    }
    println!();

    Ok(())
}
