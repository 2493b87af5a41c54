//! Configuration for session storage.
//!
//! ```toml
//! [session]
//! backend = "file"
//! ttl_secs = 3600
//! storage_dir = "/var/lib/app/sessions"
//! enable_sweep_task = true
//! sweep_interval_secs = 60
//!
//! [session.cookie]
//! name = "tether_sid"
//! same_site = "lax"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cookie::{CookieSettings, SameSite};
use crate::error::{Error, Result};

/// Default session TTL (1 hour).
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Which backend holds session records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Single-process, non-durable map.
    Memory,
    /// One JSON file per session.
    #[default]
    File,
}

/// Session storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend to open.
    pub backend: StoreKind,

    /// Sliding expiration window in seconds.
    pub ttl_secs: u64,

    /// Directory for the file backend.
    pub storage_dir: PathBuf,

    /// Whether to run the background sweeper.
    /// If false, expired sessions are only reclaimed on access or by an
    /// explicit sweep.
    pub enable_sweep_task: bool,

    /// Seconds between background sweeps.
    pub sweep_interval_secs: u64,

    /// Attributes for the session cookie.
    pub cookie: CookieSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::default(),
            ttl_secs: DEFAULT_TTL_SECS,
            storage_dir: default_storage_dir(),
            enable_sweep_task: true,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            cookie: CookieSettings::default(),
        }
    }
}

/// `<platform data dir>/tether/sessions`, or `./sessions` when the platform
/// has no data directory.
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tether").join("sessions"))
        .unwrap_or_else(|| PathBuf::from("sessions"))
}

#[derive(Deserialize)]
struct Sectioned {
    session: SessionConfig,
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML. Accepts a `[session]` table or top-level keys.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let table: toml::Table =
            toml::from_str(toml_str).map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

        let config = if table.contains_key("session") {
            toml::Value::Table(table)
                .try_into::<Sectioned>()
                .map(|s| s.session)
        } else {
            toml::Value::Table(table).try_into::<SessionConfig>()
        }
        .map_err(|e| Error::Config(format!("invalid session config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Reject settings no store can honour.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(Error::Config("ttl_secs must be greater than zero".into()));
        }
        if self.enable_sweep_task && self.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sweep_interval_secs must be greater than zero".into(),
            ));
        }
        if self.cookie.same_site == SameSite::None && !self.cookie.secure {
            return Err(Error::Config(
                "cookie.same_site = \"none\" requires cookie.secure = true".into(),
            ));
        }
        Ok(())
    }

    /// The sliding TTL.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// The background sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: StoreKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the TTL. Sub-second values round up to the next whole second.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = whole_secs_ceil(ttl);
        self
    }

    /// Set the storage directory for the file backend.
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Enable or disable the background sweeper.
    pub fn with_sweep_task(mut self, enabled: bool) -> Self {
        self.enable_sweep_task = enabled;
        self
    }

    /// Set the sweep interval. Sub-second values round up.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_secs = whole_secs_ceil(interval);
        self
    }

    /// Set cookie attributes.
    pub fn with_cookie(mut self, cookie: CookieSettings) -> Self {
        self.cookie = cookie;
        self
    }
}

fn whole_secs_ceil(d: Duration) -> u64 {
    d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0))
}
