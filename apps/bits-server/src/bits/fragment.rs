//! Fragment Reconciler
//!
//! Rebuilds a file from byte ranges that may be resent, overlap, or arrive
//! after a reconnect. The size of the partial file on disk is the only
//! progress marker: bytes `[0, size)` are final, and a fragment is accepted
//! only if it touches that frontier. Of an accepted fragment only the part
//! past the frontier is appended, so replaying data never writes it twice.
//!
//! The body is read only once the headers are known to be consistent, and
//! never past the declared length. The size check and the append then run
//! under the per-file lock, with the session gate held shared so teardown
//! cannot interleave.

use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{BitsError, Result};

use super::events::{BitsEvent, Notifier};
use super::filter::FilenameFilter;
use super::range::{parse_decimal, ContentRange};
use super::session::{SessionId, SessionStore};

// ============================================================================
// Types
// ============================================================================

/// One fragment packet, headers still undecoded and the body unread
pub struct FragmentRequest<'a> {
    pub session_id: &'a str,
    /// Decoded final path segment of the request target
    pub filename: &'a str,
    pub content_range: Option<&'a str>,
    pub content_length: Option<&'a str>,
    pub payload: Body,
}

/// Outcome of an accepted fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentAck {
    /// Bytes of the file on disk after the write
    pub received: u64,
    /// Bytes this fragment added
    pub appended: u64,
    /// Whether the final byte of the file has now arrived
    pub complete: bool,
}

// ============================================================================
// Reconciler
// ============================================================================

#[derive(Clone)]
pub struct Reconciler {
    store: SessionStore,
    filter: Arc<FilenameFilter>,
    /// Largest accepted declared total, 0 = unlimited
    max_size: u64,
    notifier: Notifier,
}

impl Reconciler {
    pub fn new(store: SessionStore, filter: Arc<FilenameFilter>, max_size: u64, notifier: Notifier) -> Self {
        Self {
            store,
            filter,
            max_size,
            notifier,
        }
    }

    pub async fn apply(&self, request: FragmentRequest<'_>) -> Result<FragmentAck> {
        let FragmentRequest {
            session_id,
            filename,
            content_range,
            content_length,
            payload,
        } = request;

        let not_found = || BitsError::SessionNotFound(session_id.to_string());
        let id = SessionId::parse(session_id).ok_or_else(not_found)?;
        if !self.store.is_live(&id).await {
            return Err(not_found());
        }

        if !is_safe_filename(filename) || !self.filter.is_permitted(filename) {
            return Err(BitsError::FilenameRejected(filename.to_string()));
        }

        let range = ContentRange::parse(content_range.unwrap_or_default())?;
        if self.max_size > 0 && range.total > self.max_size {
            return Err(BitsError::FileTooLarge {
                size: range.total,
                max: self.max_size,
            });
        }

        let declared = parse_content_length(content_length)?;
        match range.len() {
            Some(len) if len == declared => {}
            other => {
                return Err(BitsError::RangeLengthMismatch {
                    range_len: other.unwrap_or(0),
                    declared,
                })
            }
        }
        if range.end >= range.total {
            return Err(BitsError::RangeBeyondTotal {
                end: range.end,
                total: range.total,
            });
        }

        // headers are consistent, so the read is bounded by the range
        let payload = read_payload(payload, declared).await?;

        let session = self.store.lock_shared(&id).await;
        // the session may have been torn down while we waited
        if !self.store.is_live(&id).await {
            return Err(not_found());
        }

        let mut file_state = session.lock_file(filename).await;
        if let Some(expected) = file_state.declared_total {
            if expected != range.total {
                return Err(BitsError::TotalMismatch {
                    declared: range.total,
                    expected,
                });
            }
        }

        let path = self.store.session_dir(&id).join(filename);
        let current = current_size(&path).await?;
        if current > range.total {
            return Err(BitsError::TotalBelowReceived {
                total: range.total,
                received: current,
            });
        }
        if range.end < current {
            return Err(BitsError::AlreadyReceived { received: current });
        }
        if range.start > current {
            return Err(BitsError::RangeGap { received: current });
        }

        // start <= current <= end, so the skipped prefix lies inside the payload
        let skip = (current - range.start) as usize;
        let appended = append(&path, current, &payload[skip..]).await?;
        file_state.declared_total = Some(range.total);
        let received = current + appended;

        tracing::debug!(
            session_id = %id,
            file_name = %filename,
            appended = appended,
            skipped = skip,
            received = received,
            total = range.total,
            "Appended fragment"
        );

        let complete = range.is_last();
        if complete {
            tracing::info!(
                session_id = %id,
                file_name = %filename,
                size = received,
                "File upload complete"
            );
            self.notifier
                .notify(BitsEvent::FileReceived {
                    session_id: id.to_string(),
                    path,
                })
                .await;
        }

        Ok(FragmentAck {
            received,
            appended,
            complete,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Final segment of a request path, percent-decoded
pub fn filename_from_path(path: &str) -> String {
    let segment = path.rsplit('/').next().unwrap_or_default();
    urlencoding::decode(segment)
        .map(|name| name.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Names that stay inside the session directory
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn parse_content_length(value: Option<&str>) -> Result<u64> {
    let value = value.unwrap_or_default();
    parse_decimal(value.trim()).ok_or_else(|| BitsError::InvalidContentLength(value.to_string()))
}

/// Read exactly `declared` bytes; a longer body fails without buffering it
async fn read_payload(body: Body, declared: u64) -> Result<Bytes> {
    let limit = usize::try_from(declared).unwrap_or(usize::MAX);
    let payload = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| BitsError::PayloadUnreadable {
            declared,
            reason: e.to_string(),
        })?;

    let received = payload.len() as u64;
    if received != declared {
        return Err(BitsError::PayloadLengthMismatch { declared, received });
    }
    Ok(payload)
}

async fn current_size(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(BitsError::Io(io::Error::other(format!(
            "{} is not a regular file",
            path.display()
        )))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Append `data` and confirm the file grew by exactly that much
async fn append(path: &Path, current: u64, data: &[u8]) -> Result<u64> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.flush().await?;

    let written = file.metadata().await?.len().saturating_sub(current);
    let expected = data.len() as u64;
    if written != expected {
        return Err(BitsError::ShortWrite { expected, written });
    }

    Ok(written)
}

// ============================================================================
// Tests
// ============================================================================
