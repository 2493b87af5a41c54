//! The storage contract every backend implements.
//!
//! A [`SessionStore`] owns the durable copy of each record and is shared by
//! all in-flight requests. The per-request half of the contract (the active
//! identifier and the working copy of the data) lives in
//! [`Session`](crate::Session), which delegates here. Stores copy data in
//! and out on every call and never hand out references into their own state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{SessionConfig, StoreKind};
use crate::error::Result;
use crate::file::FileStore;
use crate::id::SessionId;
use crate::memory::MemoryStore;
use crate::record::{SessionData, SessionRecord};
use crate::sweep::SweepReport;

/// Trait for session storage backends.
///
/// No lock is held at identifier granularity across calls: two requests
/// working on the same session may interleave, and the last completed
/// `save` wins.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// The sliding window applied on every successful load or save.
    fn ttl(&self) -> Duration;

    /// Load a live record and slide its expiry forward.
    ///
    /// Fails with [`Error::InvalidSession`](crate::Error::InvalidSession) when
    /// the record is absent, unreadable, or expired. The returned record
    /// carries the new expiry, which has already been persisted.
    async fn load(&self, id: &SessionId) -> Result<SessionRecord>;

    /// Persist `data` under `id` with a fresh expiry, returning that expiry.
    ///
    /// Fails with [`Error::Persistence`](crate::Error::Persistence) if the
    /// write cannot be committed.
    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<i64>;

    /// Remove the record for `id`. Best-effort: I/O failures are logged and
    /// swallowed.
    async fn destroy(&self, id: &SessionId);

    /// Reclaim expired and corrupt records. Never fails.
    async fn sweep(&self) -> SweepReport;
}

/// Build the backend selected by `config`, after validating it.
pub fn open_store(config: &SessionConfig) -> Result<Arc<dyn SessionStore>> {
    config.validate()?;
    let store: Arc<dyn SessionStore> = match config.backend {
        StoreKind::Memory => Arc::new(MemoryStore::new(config.ttl())),
        StoreKind::File => Arc::new(FileStore::new(config.storage_dir.clone(), config.ttl())),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_store_respects_backend() {
        let dir = tempfile::tempdir().unwrap();

        let memory = open_store(&SessionConfig::new().with_backend(StoreKind::Memory)).unwrap();
        assert!(format!("{:?}", memory).starts_with("MemoryStore"));

        let file = open_store(
            &SessionConfig::new()
                .with_backend(StoreKind::File)
                .with_storage_dir(dir.path())
                .with_ttl(Duration::from_secs(90)),
        )
        .unwrap();
        assert!(format!("{:?}", file).starts_with("FileStore"));
        assert_eq!(file.ttl(), Duration::from_secs(90));
    }

    #[test]
    fn test_open_store_rejects_invalid_config() {
        let config = SessionConfig {
            ttl_secs: 0,
            ..SessionConfig::default()
        };
        let err = open_store(&config).unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }

    #[tokio::test]
    async fn test_sub_second_ttl_is_not_dead_on_arrival() {
        let config = SessionConfig::new()
            .with_backend(StoreKind::Memory)
            .with_ttl(Duration::from_millis(500));
        let store = open_store(&config).unwrap();
        assert_eq!(store.ttl(), Duration::from_secs(1));

        let id = SessionId::generate();
        store.save(&id, &SessionData::new()).await.unwrap();
        assert!(store.load(&id).await.is_ok());
    }
}
