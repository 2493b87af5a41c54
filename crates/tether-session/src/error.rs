//! Error types for session storage operations.

/// Message used for every identifier or record that cannot be loaded.
pub const INVALID_SESSION: &str = "Invalid session";

/// Message used when a record exists but its TTL has lapsed.
pub const SESSION_EXPIRED: &str = "Session expired";

/// Error type for session storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed identifier, absent record, expired record or corrupt payload.
    ///
    /// Callers should treat the request as session-less and may start fresh.
    #[error("{0}")]
    InvalidSession(String),

    /// A write to the backing store failed.
    ///
    /// The triggering operation is aborted; the in-memory working copy keeps
    /// the attempted mutation.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Configuration could not be read or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Generic invalid-session error.
    pub fn invalid() -> Self {
        Error::InvalidSession(INVALID_SESSION.to_string())
    }

    /// Invalid-session error for a record whose TTL has lapsed.
    pub fn expired() -> Self {
        Error::InvalidSession(SESSION_EXPIRED.to_string())
    }

    /// Whether this error means "no usable prior session".
    pub fn is_invalid_session(&self) -> bool {
        matches!(self, Error::InvalidSession(_))
    }

    /// Whether this error is a server-side write failure.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}

/// Result type for session storage operations.
pub type Result<T> = std::result::Result<T, Error>;
