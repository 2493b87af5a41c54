//! Show command - prints one session record without sliding its expiry.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use tether_session::{SessionData, TtlPolicy, now_ms};

use super::{Context, format_ms, parse_id};

/// Arguments for the show command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Session identifier (64 lowercase hex characters)
    pub id: String,
}

/// Show output for JSON mode.
#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    id: &'a str,
    expires_at: i64,
    expired: bool,
    data: &'a SessionData,
}

/// Run the show command.
pub async fn run(args: ShowArgs, ctx: &Context) -> Result<()> {
    let id = parse_id(&args.id)?;
    let Ok(record) = ctx.store.peek(&id).await else {
        bail!("no readable session {} in {}", id.short(), ctx.store.dir().display());
    };
    let expired = !TtlPolicy::new(ctx.config.ttl()).is_live(record.expires_at, now_ms());

    if ctx.json_output {
        let output = ShowOutput {
            id: id.as_str(),
            expires_at: record.expires_at,
            expired,
            data: &record.data,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{}", style("Session").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Id:"), id);
    println!(
        "  {} {}{}",
        dim.apply_to("Expires:"),
        format_ms(record.expires_at),
        if expired {
            Style::new().red().apply_to(" (expired)").to_string()
        } else {
            String::new()
        }
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&record.data)?);
    println!();

    Ok(())
}
