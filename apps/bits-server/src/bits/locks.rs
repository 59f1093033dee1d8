//! Per-session and per-file exclusion
//!
//! Every session has a gate: fragment writes hold it shared, session
//! teardown holds it exclusively, so a directory is never removed under a
//! running write. Inside a session every file has its own mutex covering the
//! size check and the append; writes to different files never contend.
//!
//! Entries are created lazily and dropped when the session is destroyed or
//! when a sweep finds the session directory gone. The registry only caches
//! what the file system already says; losing it loses nothing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Cached facts about one partial file
#[derive(Debug, Default)]
pub struct FileState {
    /// Total length declared by the first accepted fragment
    pub declared_total: Option<u64>,
}

#[derive(Default)]
struct SessionEntry {
    gate: Arc<RwLock<()>>,
    files: Mutex<HashMap<String, Arc<AsyncMutex<FileState>>>>,
}

impl SessionEntry {
    fn file(&self, filename: &str) -> Arc<AsyncMutex<FileState>> {
        self.files
            .lock()
            .entry(filename.to_string())
            .or_default()
            .clone()
    }
}

/// Registry of session gates and file locks keyed by session id
#[derive(Default)]
pub struct LockRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionEntry>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, session_id: &str) -> Arc<SessionEntry> {
        self.sessions
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Hold the session gate shared, as fragment writes do
    pub async fn share(&self, session_id: &str) -> SharedSession {
        let entry = self.entry(session_id);
        let guard = entry.gate.clone().read_owned().await;
        SharedSession {
            entry,
            _guard: guard,
        }
    }

    /// Hold the session gate exclusively, waiting for running writes
    pub async fn exclusive(&self, session_id: &str) -> OwnedRwLockWriteGuard<()> {
        let entry = self.entry(session_id);
        entry.gate.clone().write_owned().await
    }

    /// Forget a session's locks and cached file state
    pub fn remove(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }

    /// Ids of every session with a registry entry
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

/// Shared hold on a session gate
pub struct SharedSession {
    entry: Arc<SessionEntry>,
    _guard: OwnedRwLockReadGuard<()>,
}

impl SharedSession {
    /// Lock one file of the session for a check-and-append
    pub async fn lock_file(&self, filename: &str) -> OwnedMutexGuard<FileState> {
        self.entry.file(filename).lock_owned().await
    }
}
