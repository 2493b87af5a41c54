//! Purge command - destroys one session.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;
use tether_session::SessionStore;

use super::{Context, parse_id};

/// Arguments for the purge command.
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Session identifier (64 lowercase hex characters)
    pub id: String,
}

#[derive(Debug, Serialize)]
struct PurgeOutput {
    id: String,
    removed: bool,
}

/// Run the purge command.
pub async fn run(args: PurgeArgs, ctx: &Context) -> Result<()> {
    let id = parse_id(&args.id)?;
    let path = ctx.store.path_for(&id);
    let existed = tokio::fs::try_exists(&path).await.unwrap_or(false);

    ctx.store.destroy(&id).await;
    let removed = existed && !tokio::fs::try_exists(&path).await.unwrap_or(true);

    if ctx.json_output {
        let output = PurgeOutput {
            id: id.to_string(),
            removed,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if removed {
        println!("{} Session {} purged", Style::new().green().apply_to("✓"), id.short());
    } else if existed {
        anyhow::bail!("session {} could not be removed", id.short());
    } else {
        println!("{}", Style::new().dim().apply_to(format!("Session {} not found", id.short())));
    }

    Ok(())
}
