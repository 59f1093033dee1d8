//! Session Store
//!
//! A session is live exactly while its directory exists under the temp
//! root. Nothing else is authoritative: after a restart the sessions whose
//! directories survived are still usable. The lock registry kept alongside
//! is a cache over that fact.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::OwnedRwLockWriteGuard;
use uuid::Uuid;

use crate::error::{BitsError, Result};

use super::locks::{LockRegistry, SharedSession};

// ============================================================================
// Session Id
// ============================================================================

/// 128-bit random session identifier, rendered 8-4-4-4-12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Draw a fresh id from the OS random source
    ///
    /// Only the variant bits are fixed; the version nibble stays random.
    pub fn generate() -> std::result::Result<Self, rand::Error> {
        let mut bytes = [0u8; 16];
        OsRng.try_fill_bytes(&mut bytes)?;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Ok(Self(Uuid::from_bytes(bytes)))
    }

    /// Accept only the canonical hyphenated form
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != 36 {
            return None;
        }
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ============================================================================
// Session Store
// ============================================================================

/// Result of a successful create-session
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub id: SessionId,
    pub protocol: String,
    pub path: PathBuf,
}

/// Directory-backed session store
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    /// Root under which session directories live
    temp_dir: PathBuf,

    /// Protocol identifier clients must advertise
    protocol: String,

    locks: LockRegistry,
}

impl SessionStore {
    pub fn new(temp_dir: impl Into<PathBuf>, protocol: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                temp_dir: temp_dir.into(),
                protocol: protocol.into(),
                locks: LockRegistry::new(),
            }),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.inner.temp_dir
    }

    pub fn protocol(&self) -> &str {
        &self.inner.protocol
    }

    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.inner.temp_dir.join(id.to_string())
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Create a session if the client advertises our protocol
    ///
    /// `supported` is the space-separated `BITS-Supported-Protocols` value.
    pub async fn create(&self, supported: &str) -> Result<CreatedSession> {
        let offered: Vec<&str> = supported.split_whitespace().collect();
        if !offered.contains(&self.protocol()) {
            return Err(BitsError::ProtocolMismatch(
                offered.into_iter().map(str::to_string).collect(),
            ));
        }

        let id = SessionId::generate()?;
        let path = self.session_dir(&id);
        tokio::fs::create_dir_all(&path).await?;

        tracing::info!(session_id = %id, path = %path.display(), "Created upload session");

        Ok(CreatedSession {
            id,
            protocol: self.protocol().to_string(),
            path,
        })
    }

    /// Whether the session directory exists; malformed ids are never live
    pub async fn exists(&self, session_id: &str) -> bool {
        match SessionId::parse(session_id) {
            Some(id) => self.is_live(&id).await,
            None => false,
        }
    }

    pub(crate) async fn is_live(&self, id: &SessionId) -> bool {
        tokio::fs::metadata(self.session_dir(id))
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Remove the session directory and everything in it
    ///
    /// Waits for in-flight fragment writes of the session to finish.
    pub async fn destroy(&self, id: &SessionId) -> Result<()> {
        self.lock_exclusive(id).await.destroy().await
    }

    // ========================================================================
    // Locking
    // ========================================================================

    /// Shared hold used by fragment writes
    pub(crate) async fn lock_shared(&self, id: &SessionId) -> SharedSession {
        self.inner.locks.share(&id.to_string()).await
    }

    /// Exclusive hold used by close and cancel
    pub async fn lock_exclusive(&self, id: &SessionId) -> ExclusiveSession {
        let guard = self.inner.locks.exclusive(&id.to_string()).await;
        ExclusiveSession {
            store: self.clone(),
            id: *id,
            _guard: guard,
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Drop registry entries whose session directory is gone
    ///
    /// Returns the number of entries removed.
    pub async fn prune(&self) -> usize {
        let mut removed = 0;
        for key in self.inner.locks.session_ids() {
            let live = match SessionId::parse(&key) {
                Some(id) => self.is_live(&id).await,
                None => false,
            };
            if !live {
                self.inner.locks.remove(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(count = removed, "Pruned stale session locks");
        }

        removed
    }

    /// Number of sessions with cached lock state
    pub fn cached_sessions(&self) -> usize {
        self.inner.locks.len()
    }

    /// Start background pruning of the lock registry
    pub fn start_prune_task(self, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;
                self.prune().await;
            }
        })
    }
}

/// Exclusive hold on a session; no fragment of it is being written
pub struct ExclusiveSession {
    store: SessionStore,
    id: SessionId,
    _guard: OwnedRwLockWriteGuard<()>,
}

impl ExclusiveSession {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn path(&self) -> PathBuf {
        self.store.session_dir(&self.id)
    }

    pub async fn is_live(&self) -> bool {
        self.store.is_live(&self.id).await
    }

    /// Remove the directory tree and forget the session's locks
    pub async fn destroy(self) -> Result<()> {
        let result = tokio::fs::remove_dir_all(self.path()).await;
        self.store.inner.locks.remove(&self.id.to_string());
        result?;

        tracing::debug!(session_id = %self.id, "Removed session directory");
        Ok(())
    }
}
