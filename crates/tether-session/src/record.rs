//! The persisted session record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session payload: string keys to arbitrary JSON values.
pub type SessionData = serde_json::Map<String, Value>;

/// A session as held by a store.
///
/// Serialized as `{"data": {...}, "expiresAt": <ms since epoch>}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session payload.
    pub data: SessionData,

    /// Absolute expiry in milliseconds since the Unix epoch.
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

impl SessionRecord {
    /// Create a record with the given payload and expiry.
    pub fn new(data: SessionData, expires_at: i64) -> Self {
        Self { data, expires_at }
    }

    /// Decode and validate a stored payload.
    ///
    /// Returns `None` unless the document is an object whose `data` is an
    /// object and whose `expiresAt` is numeric. Fractional timestamps are
    /// truncated.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let expires_at = expires_at_of(&value)?;
        let data = value.get("data")?.as_object()?.clone();
        Some(Self { data, expires_at })
    }

    /// Serialize for storage.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Extract a numeric `expiresAt` from a raw stored document.
///
/// The sweep only needs this field, so it does not require `data` to be
/// well-formed.
pub fn expires_at_of(value: &Value) -> Option<i64> {
    let raw = value.get("expiresAt")?;
    raw.as_i64().or_else(|| raw.as_f64().map(|f| f as i64))
}
