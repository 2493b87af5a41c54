//! Per-request session facade.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::cookie::{CookieSettings, SessionCookie};
use crate::error::Result;
use crate::id::SessionId;
use crate::record::SessionData;
use crate::store::SessionStore;

/// Request-scoped view of one session.
///
/// Holds the active identifier and a private working copy of the data; the
/// durable copy lives in the injected [`SessionStore`]. Create one per
/// request and drop it when the response has been written.
///
/// Writes follow an optimistic-memory, best-effort-disk policy: when a
/// persist fails with [`Error::Persistence`](crate::Error::Persistence), the
/// working copy keeps the attempted mutation and the error is returned.
pub struct Session {
    store: Arc<dyn SessionStore>,
    id: Option<SessionId>,
    data: SessionData,
    expires_at: Option<i64>,
}

impl Session {
    /// Create an inactive session bound to `store`.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            id: None,
            data: SessionData::new(),
            expires_at: None,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// The active identifier, if any.
    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    /// Whether an identifier is active.
    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    /// Expiry of the last successful load or persist, in ms since epoch.
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// Adopt the session named by `candidate`.
    ///
    /// The candidate is format-checked before the store is consulted. On
    /// failure the facade's state is left untouched.
    pub async fn load(&mut self, candidate: &str) -> Result<()> {
        let id = SessionId::parse(candidate)?;
        let record = self.store.load(&id).await?;

        trace!(session_id = %id.short(), keys = record.data.len(), "Session loaded");
        self.id = Some(id);
        self.data = record.data;
        self.expires_at = Some(record.expires_at);
        Ok(())
    }

    /// Begin a fresh session, or return the active identifier unchanged.
    ///
    /// If the first commit fails the facade stays inactive, so a later call
    /// never returns an identifier the store does not hold.
    pub async fn start(&mut self) -> Result<SessionId> {
        if let Some(id) = &self.id {
            return Ok(id.clone());
        }

        let id = SessionId::generate();
        debug!(session_id = %id.short(), "Starting session");
        self.id = Some(id.clone());
        self.data = SessionData::new();
        self.persist_new().await?;
        Ok(id)
    }

    /// Value for `key` in the working copy.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Value for `key`, or `default` when absent.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.data.get(key).cloned().unwrap_or_else(|| default.into())
    }

    /// Value for `key` deserialized as `T`; `None` when absent or mistyped.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Whether `key` is present.
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Copy of the whole working copy. Mutating it never affects the session.
    pub fn all(&self) -> SessionData {
        self.data.clone()
    }

    /// Store `value` under `key` and persist, starting a session if needed.
    ///
    /// A fresh session is committed once, with the value already in place.
    /// If that commit fails the value stays in the working copy but no
    /// identifier is adopted.
    pub async fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        if self.id.is_some() {
            self.data.insert(key.into(), value.into());
            return self.persist().await;
        }

        let id = SessionId::generate();
        debug!(session_id = %id.short(), "Starting session on first write");
        self.id = Some(id);
        self.data = SessionData::new();
        self.data.insert(key.into(), value.into());
        self.persist_new().await
    }

    /// Remove `key` and persist. No-op without an active session.
    pub async fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        if self.id.is_none() {
            return Ok(None);
        }
        let removed = self.data.remove(key);
        self.persist().await?;
        Ok(removed)
    }

    /// Drop every key and persist. No-op without an active session.
    pub async fn clear(&mut self) -> Result<()> {
        if self.id.is_none() {
            return Ok(());
        }
        self.data.clear();
        self.persist().await
    }

    /// Persist the working copy and slide the expiry.
    pub async fn save(&mut self) -> Result<()> {
        self.persist().await
    }

    /// Refresh the TTL. Behaves exactly like [`save`](Self::save).
    pub async fn touch(&mut self) -> Result<()> {
        self.persist().await
    }

    /// Re-read the active session from the store, discarding unsaved changes.
    ///
    /// If the stored record is no longer loadable the facade becomes
    /// inactive and the error is returned.
    pub async fn reload(&mut self) -> Result<()> {
        let Some(id) = &self.id else {
            return Ok(());
        };

        match self.store.load(id).await {
            Ok(record) => {
                self.data = record.data;
                self.expires_at = Some(record.expires_at);
                Ok(())
            }
            Err(e) => {
                if e.is_invalid_session() {
                    self.reset();
                }
                Err(e)
            }
        }
    }

    /// Remove the backing record and clear local state.
    ///
    /// Storage failures are swallowed by the store; local state is always
    /// cleared.
    pub async fn destroy(&mut self) {
        if let Some(id) = self.id.take() {
            self.store.destroy(&id).await;
            debug!(session_id = %id.short(), "Session destroyed by request");
        }
        self.reset();
    }

    /// Rotate the identifier while keeping the data.
    ///
    /// The new record is committed before the old one is removed, so the
    /// session is never without a stored identifier. If the commit fails the
    /// facade keeps its previous identifier and the error is returned. With
    /// no active session this starts one carrying the current working copy.
    pub async fn regenerate(&mut self) -> Result<SessionId> {
        let new_id = SessionId::generate();
        let snapshot = self.data.clone();
        let expires_at = self.store.save(&new_id, &snapshot).await?;

        let old_id = self.id.replace(new_id.clone());
        self.expires_at = Some(expires_at);

        if let Some(old_id) = old_id {
            self.store.destroy(&old_id).await;
            debug!(
                old_session_id = %old_id.short(),
                session_id = %new_id.short(),
                "Session identifier rotated"
            );
        }

        Ok(new_id)
    }

    /// Outbound cookie for the active session, or a removal cookie when
    /// inactive.
    pub fn cookie(&self, settings: &CookieSettings) -> SessionCookie {
        match &self.id {
            Some(id) => SessionCookie::for_session(id, settings, self.store.ttl()),
            None => SessionCookie::expired(settings),
        }
    }

    async fn persist(&mut self) -> Result<()> {
        let Some(id) = &self.id else {
            return Ok(());
        };
        let expires_at = self.store.save(id, &self.data).await?;
        self.expires_at = Some(expires_at);
        Ok(())
    }

    /// First commit of a freshly assigned identifier; drops the identifier
    /// again if nothing was stored.
    async fn persist_new(&mut self) -> Result<()> {
        let result = self.persist().await;
        if let Err(e) = &result {
            if let Some(id) = self.id.take() {
                debug!(session_id = %id.short(), error = %e, "Session start not committed");
            }
            self.expires_at = None;
        }
        result
    }

    fn reset(&mut self) {
        self.id = None;
        self.data = SessionData::new();
        self.expires_at = None;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("keys", &self.data.len())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::file::FileStore;
    use crate::memory::MemoryStore;
    use crate::record::SessionRecord;
    use crate::ttl::now_ms;
    use serde_json::json;

    fn memory() -> (MemoryStore, Session) {
        let store = MemoryStore::new(Duration::from_secs(60));
        let session = Session::new(Arc::new(store.clone()));
        (store, session)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (store, mut session) = memory();

        let first = session.start().await.unwrap();
        let second = session.start().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_set_starts_session_implicitly() {
        let (store, mut session) = memory();
        assert!(session.id().is_none());

        session.set("user", 1).await.unwrap();

        let id = session.id().cloned().unwrap();
        let record = store.peek(&id).unwrap();
        assert_eq!(record.data.get("user"), Some(&json!(1)));
        assert_eq!(Some(record.expires_at), session.expires_at());
    }

    #[tokio::test]
    async fn test_reads_over_working_copy() {
        let (_store, mut session) = memory();
        session.set("name", "ada").await.unwrap();
        session.set("visits", 3).await.unwrap();

        assert_eq!(session.get("name"), Some(&json!("ada")));
        assert_eq!(session.get("missing"), None);
        assert_eq!(session.get_or("missing", "fallback"), json!("fallback"));
        assert_eq!(session.get_as::<u32>("visits"), Some(3));
        assert_eq!(session.get_as::<u32>("name"), None);
        assert!(session.has("name"));
        assert!(!session.has("missing"));
    }

    #[tokio::test]
    async fn test_all_is_a_defensive_copy() {
        let (_store, mut session) = memory();
        session.set("k", "v").await.unwrap();

        let mut copy = session.all();
        copy.insert("k".into(), json!("changed"));
        copy.insert("extra".into(), json!(true));

        assert_eq!(session.get("k"), Some(&json!("v")));
        assert!(!session.has("extra"));
    }

    #[tokio::test]
    async fn test_remove_and_clear_without_session_are_noops() {
        let (store, mut session) = memory();
        assert_eq!(session.remove("k").await.unwrap(), None);
        session.clear().await.unwrap();
        session.save().await.unwrap();
        session.touch().await.unwrap();
        session.reload().await.unwrap();
        assert!(session.id().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_clear_persist() {
        let (store, mut session) = memory();
        session.set("a", 1).await.unwrap();
        session.set("b", 2).await.unwrap();
        let id = session.id().cloned().unwrap();

        assert_eq!(session.remove("a").await.unwrap(), Some(json!(1)));
        assert!(!store.peek(&id).unwrap().data.contains_key("a"));

        session.clear().await.unwrap();
        assert!(store.peek(&id).unwrap().data.is_empty());
        assert!(session.all().is_empty());
    }

    #[tokio::test]
    async fn test_touch_advances_expiry_to_now_plus_ttl() {
        let (store, mut session) = memory();
        let id = session.start().await.unwrap();
        // Pretend the window has almost lapsed.
        store.insert_raw(&id, SessionRecord::new(SessionData::new(), now_ms() + 10));

        let before = now_ms();
        session.touch().await.unwrap();
        let expires_at = session.expires_at().unwrap();
        assert!(expires_at >= before + 60_000);
        assert_eq!(store.peek(&id).unwrap().expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_id() {
        let (_store, mut session) = memory();
        let err = session.load("abc").await.unwrap_err();
        assert!(err.is_invalid_session());
        assert_eq!(err.to_string(), "Invalid session");
        assert!(session.id().is_none());
    }

    #[tokio::test]
    async fn test_load_sees_last_saved_value() {
        let (store, mut writer) = memory();
        writer.set("cart", json!(["apple"])).await.unwrap();
        writer.set("cart", json!(["apple", "pear"])).await.unwrap();
        let id = writer.id().cloned().unwrap();

        let mut reader = Session::new(Arc::new(store));
        reader.load(id.as_str()).await.unwrap();
        assert_eq!(reader.get("cart"), Some(&json!(["apple", "pear"])));
        assert_eq!(reader.id(), Some(&id));
    }

    #[tokio::test]
    async fn test_unsaved_changes_are_isolated_between_facades() {
        let (store, mut a) = memory();
        a.set("k", 1).await.unwrap();
        let id = a.id().cloned().unwrap();

        let mut b = Session::new(Arc::new(store.clone()));
        b.load(id.as_str()).await.unwrap();

        // `b` keeps its own copy until it reloads.
        a.set("k", 2).await.unwrap();
        assert_eq!(b.get("k"), Some(&json!(1)));

        b.reload().await.unwrap();
        assert_eq!(b.get("k"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_reload_picks_up_newer_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), Duration::from_secs(60));
        let mut session = Session::new(Arc::new(store.clone()));
        session.set("k", "saved").await.unwrap();

        let id = session.id().cloned().unwrap();
        let mut other = Session::new(Arc::new(store));
        other.load(id.as_str()).await.unwrap();
        other.set("k", "newer").await.unwrap();

        session.reload().await.unwrap();
        assert_eq!(session.get("k"), Some(&json!("newer")));
    }

    #[tokio::test]
    async fn test_reload_after_external_destroy_deactivates() {
        let (store, mut session) = memory();
        let id = session.start().await.unwrap();
        store.destroy(&id).await;

        let err = session.reload().await.unwrap_err();
        assert!(err.is_invalid_session());
        assert!(session.id().is_none());
    }

    #[tokio::test]
    async fn test_destroy_clears_everything() {
        let (store, mut session) = memory();
        session.set("k", 1).await.unwrap();
        let id = session.id().cloned().unwrap();

        session.destroy().await;
        assert!(session.id().is_none());
        assert!(session.all().is_empty());
        assert!(session.expires_at().is_none());
        assert!(!store.contains(&id));

        // Destroying an inactive session is harmless.
        session.destroy().await;
    }

    #[tokio::test]
    async fn test_regenerate_rotates_id_and_keeps_data() {
        let (store, mut session) = memory();
        session.set("user", 42).await.unwrap();
        let old = session.id().cloned().unwrap();
        let before = session.all();

        let new = session.regenerate().await.unwrap();
        assert_ne!(new, old);
        assert_eq!(session.id(), Some(&new));
        assert_eq!(session.all(), before);

        assert!(!store.contains(&old));
        let mut probe = Session::new(Arc::new(store.clone()));
        assert!(probe.load(old.as_str()).await.unwrap_err().is_invalid_session());
        probe.load(new.as_str()).await.unwrap();
        assert_eq!(probe.all(), before);
    }

    #[tokio::test]
    async fn test_regenerate_failure_keeps_old_identity() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = dir.path().join("sessions");
        let store = FileStore::new(&sessions, Duration::from_secs(60));
        let mut session = Session::new(Arc::new(store.clone()));
        session.set("k", 1).await.unwrap();
        let old = session.id().cloned().unwrap();

        // Make the directory unusable for new writes.
        std::fs::remove_dir_all(&sessions).unwrap();
        std::fs::write(&sessions, b"blocker").unwrap();

        let err = session.regenerate().await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(session.id(), Some(&old));
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_mutation_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"x").unwrap();
        let mut session = Session::new(Arc::new(FileStore::new(&blocker, Duration::from_secs(60))));

        let err = session.set("k", "v").await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(session.get("k"), Some(&json!("v")));
        assert!(session.id().is_none());
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_mutation_on_active_session() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = dir.path().join("sessions");
        let mut session = Session::new(Arc::new(FileStore::new(&sessions, Duration::from_secs(60))));
        let id = session.start().await.unwrap();

        // Replace the directory with a regular file so the next commit fails.
        std::fs::remove_dir_all(&sessions).unwrap();
        std::fs::write(&sessions, b"x").unwrap();

        let err = session.set("k", "v").await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(session.get("k"), Some(&json!("v")));
        assert_eq!(session.id(), Some(&id));
    }

    #[tokio::test]
    async fn test_failed_start_never_hands_out_uncommitted_id() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"x").unwrap();
        let mut session = Session::new(Arc::new(FileStore::new(&blocker, Duration::from_secs(60))));

        assert!(session.start().await.unwrap_err().is_persistence());
        assert!(!session.is_active());
        assert_eq!(session.expires_at(), None);

        // A retry tries to commit again instead of reporting a phantom id.
        assert!(session.start().await.unwrap_err().is_persistence());
        assert!(session.id().is_none());
    }

    #[tokio::test]
    async fn test_cookie_follows_session_state() {
        let (_store, mut session) = memory();
        let settings = CookieSettings::default();

        assert_eq!(session.cookie(&settings).max_age_secs, 0);

        let id = session.start().await.unwrap();
        let cookie = session.cookie(&settings);
        assert_eq!(cookie.value, id.as_str());
        assert_eq!(cookie.max_age_secs, 60);
    }
}
