//! In-process volatile store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::id::SessionId;
use crate::record::{SessionData, SessionRecord};
use crate::store::SessionStore;
use crate::sweep::SweepReport;
use crate::ttl::{TtlPolicy, now_ms};

/// Volatile session store for a single process.
///
/// Cloning yields another handle onto the same map, so every clone observes
/// the same sessions. Each map operation runs under one mutex; no lock spans
/// more than one call. Records are copied on the way in and on the way out.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    sessions: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
    policy: TtlPolicy,
}

impl MemoryStore {
    /// Create an empty store with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            policy: TtlPolicy::new(ttl),
        }
    }

    /// Number of records held, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Whether a record for `id` is physically present, expired or not.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Copy of the raw record, without expiry checks or sliding.
    pub fn peek(&self, id: &SessionId) -> Option<SessionRecord> {
        self.sessions.lock().get(id).cloned()
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, id: &SessionId, record: SessionRecord) {
        self.sessions.lock().insert(id.clone(), record);
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    fn ttl(&self) -> Duration {
        self.policy.ttl()
    }

    async fn load(&self, id: &SessionId) -> Result<SessionRecord> {
        let now = now_ms();
        let mut sessions = self.sessions.lock();

        let Some(record) = sessions.get_mut(id) else {
            trace!(session_id = %id.short(), "Session not found in memory store");
            return Err(Error::invalid());
        };

        // Expired entries are left for the sweep.
        if !self.policy.is_live(record.expires_at, now) {
            debug!(session_id = %id.short(), expires_at = record.expires_at, "Session expired");
            return Err(Error::expired());
        }

        record.expires_at = self.policy.next_expiry(now);
        Ok(record.clone())
    }

    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<i64> {
        let expires_at = self.policy.next_expiry(now_ms());
        let record = SessionRecord::new(data.clone(), expires_at);

        let mut sessions = self.sessions.lock();
        sessions.insert(id.clone(), record);

        trace!(
            session_id = %id.short(),
            keys = data.len(),
            store_size = sessions.len(),
            "Session saved to memory store"
        );

        Ok(expires_at)
    }

    async fn destroy(&self, id: &SessionId) {
        if self.sessions.lock().remove(id).is_some() {
            debug!(session_id = %id.short(), "Session destroyed");
        }
    }

    async fn sweep(&self) -> SweepReport {
        let now = now_ms();
        let mut report = SweepReport::default();
        let mut sessions = self.sessions.lock();

        report.scanned = sessions.len();
        sessions.retain(|_, record| !self.policy.is_reclaimable(record.expires_at, now));
        report.retained = sessions.len();
        report.removed_expired = report.scanned - report.retained;

        if report.removed() > 0 {
            debug!(count = report.removed(), "Reclaimed expired in-memory sessions");
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new(Duration::from_secs(60))
    }

    fn data(pairs: &[(&str, serde_json::Value)]) -> SessionData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = store();
        let id = SessionId::generate();

        store.save(&id, &data(&[("user", json!(1))])).await.unwrap();

        let record = store.load(&id).await.unwrap();
        assert_eq!(record.data.get("user"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_load_missing_is_invalid() {
        let store = store();
        let err = store.load(&SessionId::generate()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid session");
    }

    #[tokio::test]
    async fn test_load_slides_expiry() {
        let store = store();
        let id = SessionId::generate();
        store.insert_raw(&id, SessionRecord::new(SessionData::new(), now_ms() + 1_000));

        let before = now_ms();
        let record = store.load(&id).await.unwrap();
        assert!(record.expires_at >= before + 60_000);
        assert_eq!(store.peek(&id).unwrap().expires_at, record.expires_at);
    }

    #[tokio::test]
    async fn test_load_expired_keeps_entry() {
        let store = store();
        let id = SessionId::generate();
        store.insert_raw(&id, SessionRecord::new(SessionData::new(), now_ms() - 1_000));

        let err = store.load(&id).await.unwrap_err();
        assert_eq!(err.to_string(), "Session expired");
        // Reclamation is left to the sweep.
        assert!(store.contains(&id));
    }

    #[tokio::test]
    async fn test_clones_share_map() {
        let a = store();
        let b = a.clone();
        let id = SessionId::generate();

        a.save(&id, &SessionData::new()).await.unwrap();
        assert!(b.load(&id).await.is_ok());

        b.destroy(&id).await;
        assert!(a.is_empty());
    }

    #[tokio::test]
    async fn test_loaded_copy_is_detached() {
        let store = store();
        let id = SessionId::generate();
        store.save(&id, &data(&[("k", json!("v"))])).await.unwrap();

        let mut copy = store.load(&id).await.unwrap();
        copy.data.insert("k".into(), json!("mutated"));

        assert_eq!(store.peek(&id).unwrap().data.get("k"), Some(&json!("v")));
    }

    #[tokio::test]
    async fn test_saved_data_is_detached() {
        let store = store();
        let id = SessionId::generate();
        let mut working = data(&[("k", json!(1))]);
        store.save(&id, &working).await.unwrap();

        working.insert("k".into(), json!(2));
        assert_eq!(store.peek(&id).unwrap().data.get("k"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_past_expiry() {
        let store = store();
        let now = now_ms();
        let expired = SessionId::generate();
        let live = SessionId::generate();
        store.insert_raw(&expired, SessionRecord::new(SessionData::new(), now - 1_000));
        store.insert_raw(&live, SessionRecord::new(SessionData::new(), now + 5_000));

        let report = store.sweep().await;
        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed(), 1);
        assert_eq!(report.retained, 1);
        assert!(!store.contains(&expired));
        assert!(store.contains(&live));
    }

    #[tokio::test]
    async fn test_concurrent_saves_last_writer_wins() {
        let store = store();
        let id = SessionId::generate();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store.save(&id, &data(&[("n", json!(i))])).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 1);
        let n = store.peek(&id).unwrap().data.get("n").cloned().unwrap();
        assert!(n.as_i64().unwrap() < 16);
    }
}
