//! CLI command handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use tether_session::{FileStore, SessionConfig, SessionId, StoreKind};

pub mod list;
pub mod purge;
pub mod show;
pub mod sweep;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// File store rooted at the resolved session directory.
    pub store: FileStore,
    /// Effective configuration.
    pub config: SessionConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Resolve configuration from an optional file plus CLI overrides.
    pub fn resolve(
        config_path: Option<&Path>,
        dir: Option<PathBuf>,
        json_output: bool,
        verbose: bool,
    ) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => SessionConfig::load_file(path)?,
            None => SessionConfig::default(),
        };

        if config.backend == StoreKind::Memory {
            bail!("the memory backend lives inside its host process and cannot be inspected");
        }
        if let Some(dir) = dir {
            config.storage_dir = dir;
        }

        tracing::debug!(dir = %config.storage_dir.display(), ttl_secs = config.ttl_secs, "Resolved session store");

        Ok(Self {
            store: FileStore::new(config.storage_dir.clone(), config.ttl()),
            config,
            json_output,
            verbose,
        })
    }
}

/// Parse a session id given on the command line.
pub(crate) fn parse_id(raw: &str) -> Result<SessionId> {
    SessionId::parse(raw).with_context(|| format!("'{raw}' is not a valid session id"))
}

/// Render epoch milliseconds as a UTC timestamp.
pub(crate) fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}
