//! Sliding TTL arithmetic.

use std::time::Duration;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Expiry rules shared by every store.
///
/// Two boundaries exist on purpose:
/// - the load path treats a record as live only while `expires_at > now`;
/// - the sweep reclaims a record only once `expires_at < now`.
///
/// A record with `expires_at == now` therefore fails to load but survives a
/// sweep run at that same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    ttl: Duration,
}

impl TtlPolicy {
    /// Create a policy with the given window.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// The configured window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Window length in milliseconds, saturating at `i64::MAX`.
    pub fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Expiry timestamp for a record touched at `now`.
    pub fn next_expiry(&self, now: i64) -> i64 {
        now.saturating_add(self.ttl_ms())
    }

    /// Whether a record may still be loaded at `now`.
    pub fn is_live(&self, expires_at: i64, now: i64) -> bool {
        expires_at > now
    }

    /// Whether the sweep may reclaim a record at `now`.
    pub fn is_reclaimable(&self, expires_at: i64, now: i64) -> bool {
        expires_at < now
    }
}
