//! List command - shows stored sessions.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use tether_session::SessionSummary;

use super::{Context, format_ms};

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include sessions that have expired but not been swept yet
    #[arg(short, long)]
    pub all: bool,
}

/// Run the list command.
pub async fn run(args: ListArgs, ctx: &Context) -> Result<()> {
    let sessions: Vec<SessionSummary> = ctx
        .store
        .list()
        .await
        .into_iter()
        .filter(|s| args.all || !s.expired)
        .collect();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let red = Style::new().red();

    println!();
    println!("{}", style("Sessions").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    if sessions.is_empty() {
        println!("  {}", dim.apply_to("No sessions found."));
        println!();
        return Ok(());
    }

    for summary in &sessions {
        let id = if ctx.verbose {
            summary.id.to_string()
        } else {
            format!("{}…", summary.id.short())
        };
        let expiry = format_ms(summary.expires_at);
        let expiry = if summary.expired {
            red.apply_to(format!("expired {expiry}")).to_string()
        } else {
            format!("expires {expiry}")
        };
        println!(
            "  {}  {}  {}",
            style(id).cyan(),
            expiry,
            dim.apply_to(format!("{} keys", summary.keys))
        );
    }

    println!();
    println!("  {} {}", dim.apply_to("Total:"), sessions.len());
    println!();

    Ok(())
}
