//! Lifecycle events handed to the embedding application
//!
//! The listener is called synchronously on the request path; the response
//! is held until it returns. Its errors are logged and never change the
//! protocol response.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Observable lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitsEvent {
    /// A session directory was created
    SessionCreated { session_id: String, path: PathBuf },
    /// The last byte of a file arrived; `path` is the file inside the session
    FileReceived { session_id: String, path: PathBuf },
    /// The client closed the session; `path` is the session directory,
    /// which is removed once the listener returns
    SessionClosed { session_id: String, path: PathBuf },
    /// The client cancelled the session; the directory is already gone
    SessionCanceled { session_id: String, path: PathBuf },
}

impl BitsEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::FileReceived { session_id, .. }
            | Self::SessionClosed { session_id, .. }
            | Self::SessionCanceled { session_id, .. } => session_id,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::SessionCreated { path, .. }
            | Self::FileReceived { path, .. }
            | Self::SessionClosed { path, .. }
            | Self::SessionCanceled { path, .. } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session-created",
            Self::FileReceived { .. } => "file-received",
            Self::SessionClosed { .. } => "session-closed",
            Self::SessionCanceled { .. } => "session-canceled",
        }
    }
}

/// Receiver of lifecycle events
///
/// Implementations may block (e.g. to move a completed file); they run on
/// the blocking thread pool.
pub trait EventListener: Send + Sync + 'static {
    fn on_event(&self, event: &BitsEvent) -> anyhow::Result<()>;
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl EventListener for NoopListener {
    fn on_event(&self, _event: &BitsEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Listener that keeps every event it sees
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingListener {
    events: parking_lot::Mutex<Vec<BitsEvent>>,
}

#[cfg(test)]
impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BitsEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<BitsEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[cfg(test)]
impl EventListener for RecordingListener {
    fn on_event(&self, event: &BitsEvent) -> anyhow::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Delivers events to the listener off the async workers
#[derive(Clone)]
pub struct Notifier {
    listener: Arc<dyn EventListener>,
}

impl Notifier {
    pub fn new(listener: Arc<dyn EventListener>) -> Self {
        Self { listener }
    }

    /// Run the listener to completion; failures are only logged
    pub async fn notify(&self, event: BitsEvent) {
        let listener = self.listener.clone();
        let name = event.name();
        let session_id = event.session_id().to_string();

        let outcome = tokio::task::spawn_blocking(move || listener.on_event(&event)).await;
        match outcome {
            Ok(Ok(())) => {
                tracing::trace!(session_id = %session_id, event = name, "Listener notified");
            }
            Ok(Err(e)) => {
                tracing::warn!(session_id = %session_id, event = name, error = %e, "Event listener failed");
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, event = name, error = %e, "Event listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingListener;

    impl EventListener for FailingListener {
        fn on_event(&self, _event: &BitsEvent) -> anyhow::Result<()> {
            anyhow::bail!("disk on fire")
        }
    }

    #[tokio::test]
    async fn test_notifier_delivers_event() {
        let recorder = Arc::new(RecordingListener::new());
        let notifier = Notifier::new(recorder.clone());
        let event = BitsEvent::SessionCanceled {
            session_id: "s1".into(),
            path: PathBuf::from("/tmp/s1"),
        };

        notifier.notify(event.clone()).await;
        assert_eq!(recorder.events(), vec![event]);
    }

    #[tokio::test]
    async fn test_notifier_swallows_listener_errors() {
        let notifier = Notifier::new(Arc::new(FailingListener));
        notifier
            .notify(BitsEvent::SessionCreated {
                session_id: "s1".into(),
                path: PathBuf::from("/tmp/s1"),
            })
            .await;
    }

    #[test]
    fn test_recording_listener_keeps_order() {
        let listener = RecordingListener::new();
        let created = BitsEvent::SessionCreated {
            session_id: "s1".into(),
            path: PathBuf::from("/tmp/s1"),
        };
        let closed = BitsEvent::SessionClosed {
            session_id: "s1".into(),
            path: PathBuf::from("/tmp/s1"),
        };

        listener.on_event(&created).unwrap();
        listener.on_event(&closed).unwrap();

        assert_eq!(listener.events(), vec![created.clone(), closed.clone()]);
        assert_eq!(listener.take().len(), 2);
        assert!(listener.events().is_empty());
    }

    #[test]
    fn test_event_accessors() {
        let event = BitsEvent::FileReceived {
            session_id: "abc".into(),
            path: PathBuf::from("/tmp/abc/file.bin"),
        };
        assert_eq!(event.session_id(), "abc");
        assert_eq!(event.path(), Path::new("/tmp/abc/file.bin"));
        assert_eq!(event.name(), "file-received");
    }
}
