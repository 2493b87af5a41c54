//! File-backed persistent store.
//!
//! Layout: `{dir}/sess_{id}.json`, one file per session, holding
//! `{"data": {...}, "expiresAt": <ms>}`.
//!
//! Writes go to a uniquely named `sess_{id}.json.{nonce}.tmp` in the same
//! directory, are fsynced, then renamed over the final path. The nonce (16
//! hex chars) keeps concurrent writers to one id apart; tooling that looks
//! for a fixed `sess_{id}.json.tmp` must match `sess_*.tmp` instead, which
//! is also what the sweep treats as a temporary. The rename is
//! the only commit point, so a reader sees either the previous complete file
//! or the new one. Reads fold every failure (missing, unreadable, malformed)
//! into the same invalid-session outcome.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::id::SessionId;
use crate::record::{SessionData, SessionRecord, expires_at_of};
use crate::store::SessionStore;
use crate::sweep::SweepReport;
use crate::ttl::{TtlPolicy, now_ms};

/// Prefix shared by session files and their temporaries.
pub const FILE_PREFIX: &str = "sess_";

/// Extension of committed session files.
pub const FILE_SUFFIX: &str = ".json";

/// Extension of in-flight temporary files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Summary of a stored session, for inspection tooling.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub expires_at: i64,
    pub keys: usize,
    pub expired: bool,
}

/// Persistent session store, one JSON file per session.
///
/// No per-identifier lock is taken: concurrent writers for the same id each
/// write their own temporary and rename it into place, and the last rename
/// wins.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    policy: TtlPolicy,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            policy: TtlPolicy::new(ttl),
        }
    }

    /// Storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the committed file for `id`.
    pub fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}"))
    }

    fn temp_path_for(&self, id: &SessionId) -> PathBuf {
        let mut nonce = [0u8; 8];
        rand::rng().fill_bytes(&mut nonce);
        self.dir.join(format!(
            "{FILE_PREFIX}{id}{FILE_SUFFIX}.{}{TEMP_SUFFIX}",
            hex::encode(nonce)
        ))
    }

    /// Read a record without checking expiry or sliding it.
    pub async fn peek(&self, id: &SessionId) -> Result<SessionRecord> {
        read_record(&self.path_for(id)).await.ok_or_else(Error::invalid)
    }

    /// Summaries of every readable session file, soonest expiry first.
    ///
    /// Corrupt files are skipped; a missing directory yields an empty list.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let now = now_ms();
        let mut summaries = Vec::new();

        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return summaries;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let Some(id) = entry.file_name().to_str().and_then(session_id_from_file_name) else {
                continue;
            };
            if let Some(record) = read_record(&entry.path()).await {
                summaries.push(SessionSummary {
                    id,
                    expires_at: record.expires_at,
                    keys: record.data.len(),
                    expired: !self.policy.is_live(record.expires_at, now),
                });
            }
        }

        summaries.sort_by_key(|s| s.expires_at);
        summaries
    }

    /// Commit `record` for `id` via write-temp, fsync, rename.
    async fn write_record(&self, id: &SessionId, record: &SessionRecord) -> Result<()> {
        let payload = record
            .encode()
            .map_err(|e| Error::Persistence(format!("failed to serialize session: {e}")))?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| persistence_error("create session directory", &self.dir, e))?;

        let final_path = self.path_for(id);
        let temp_path = self.temp_path_for(id);

        if let Err(e) = write_synced(&temp_path, &payload).await {
            remove_quietly(&temp_path).await;
            return Err(persistence_error("write session file", &temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            remove_quietly(&temp_path).await;
            return Err(persistence_error("commit session file", &final_path, e));
        }

        trace!(session_id = %id.short(), bytes = payload.len(), "Session file committed");
        Ok(())
    }

    async fn is_stale_temp(&self, path: &Path) -> bool {
        let Ok(meta) = fs::metadata(path).await else {
            return false;
        };
        meta.modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > self.policy.ttl())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    fn ttl(&self) -> Duration {
        self.policy.ttl()
    }

    async fn load(&self, id: &SessionId) -> Result<SessionRecord> {
        let path = self.path_for(id);
        let Some(mut record) = read_record(&path).await else {
            return Err(Error::invalid());
        };

        let now = now_ms();
        if !self.policy.is_live(record.expires_at, now) {
            debug!(session_id = %id.short(), expires_at = record.expires_at, "Session expired, removing file");
            remove_quietly(&path).await;
            return Err(Error::expired());
        }

        record.expires_at = self.policy.next_expiry(now);
        self.write_record(id, &record).await?;
        Ok(record)
    }

    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<i64> {
        let record = SessionRecord::new(data.clone(), self.policy.next_expiry(now_ms()));
        self.write_record(id, &record).await?;
        Ok(record.expires_at)
    }

    async fn destroy(&self, id: &SessionId) {
        if remove_quietly(&self.path_for(id)).await {
            debug!(session_id = %id.short(), "Session destroyed");
        }
    }

    async fn sweep(&self) -> SweepReport {
        let now = now_ms();
        let mut report = SweepReport::default();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Session directory not listable, nothing to sweep");
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "Sweep stopped listing early");
                    break;
                }
            };

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let path = entry.path();

            if is_temp_file_name(name) {
                if self.is_stale_temp(&path).await && remove_quietly(&path).await {
                    report.stale_temp_removed += 1;
                }
                continue;
            }

            if session_id_from_file_name(name).is_none() {
                continue;
            }

            let verdict = match fs::read(&path).await {
                Ok(bytes) => classify(&bytes, &self.policy, now),
                // Destroyed by a concurrent request since listing.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable session file");
                    Verdict::Corrupt
                }
            };

            report.scanned += 1;
            if verdict == Verdict::Keep {
                report.retained += 1;
                continue;
            }

            if !remove_quietly(&path).await {
                report.failed += 1;
            } else if verdict == Verdict::Expired {
                report.removed_expired += 1;
            } else {
                report.removed_corrupt += 1;
            }
        }

        if report.removed() > 0 || report.failed > 0 {
            info!(
                dir = %self.dir.display(),
                removed_expired = report.removed_expired,
                removed_corrupt = report.removed_corrupt,
                failed = report.failed,
                retained = report.retained,
                "Session sweep complete"
            );
        }

        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Expired,
    Corrupt,
}

fn classify(bytes: &[u8], policy: &TtlPolicy, now: i64) -> Verdict {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) else {
        return Verdict::Corrupt;
    };
    match expires_at_of(&value) {
        None => Verdict::Corrupt,
        Some(expires_at) if policy.is_reclaimable(expires_at, now) => Verdict::Expired,
        Some(_) => Verdict::Keep,
    }
}

async fn read_record(path: &Path) -> Option<SessionRecord> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            trace!(path = %path.display(), error = %e, "Session file not readable");
            return None;
        }
    };
    let record = SessionRecord::decode(&bytes);
    if record.is_none() {
        debug!(path = %path.display(), "Session file failed validation");
    }
    record
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Delete `path`, ignoring failure.
///
/// Returns whether the file is gone afterwards (already-absent counts).
/// Errors are logged and never propagated: callers use this where cleanup is
/// best-effort and the outcome of the surrounding operation must not depend
/// on it.
pub(crate) async fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove session file");
            false
        }
    }
}

fn persistence_error(action: &str, path: &Path, e: io::Error) -> Error {
    Error::Persistence(format!("failed to {action} '{}': {e}", path.display()))
}

/// Parse `sess_<id>.json` into the identifier it names.
pub fn session_id_from_file_name(name: &str) -> Option<SessionId> {
    let id = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    SessionId::parse(id).ok()
}

fn is_temp_file_name(name: &str) -> bool {
    name.starts_with(FILE_PREFIX) && name.ends_with(TEMP_SUFFIX)
}
