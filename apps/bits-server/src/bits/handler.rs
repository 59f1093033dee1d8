//! Packet Dispatcher
//!
//! One transition per request. No state is held here between requests:
//! sessions live in the store, which lives on disk.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method};

use crate::config::BitsConfig;
use crate::error::{BitsError, ConfigError, Result};

use super::events::{BitsEvent, EventListener, Notifier};
use super::filter::FilenameFilter;
use super::fragment::{filename_from_path, FragmentRequest, Reconciler};
use super::response::BitsResponse;
use super::session::{SessionId, SessionStore};
use super::types::{headers, PacketType};

/// Transport-independent view of an inbound request
///
/// The body stays unread until a fragment's headers have been validated.
pub struct BitsRequest {
    pub method: Method,
    /// Request path; its final segment names the file for fragments
    pub path: String,
    pub headers: HeaderMap,
    pub body: Body,
}

fn header<'a>(map: &'a HeaderMap, name: &str) -> Option<&'a str> {
    map.get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

/// Session id header, if present and non-empty
fn session_id(map: &HeaderMap) -> Option<&str> {
    header(map, headers::SESSION_ID).filter(|id| !id.is_empty())
}

#[derive(Clone)]
pub struct BitsHandler {
    inner: Arc<BitsHandlerInner>,
}

struct BitsHandlerInner {
    config: BitsConfig,
    store: SessionStore,
    reconciler: Reconciler,
    notifier: Notifier,
}

impl BitsHandler {
    /// Build a handler, compiling the filename patterns and preparing the
    /// temp directory. Bad patterns fail here, never per request.
    pub fn new(config: BitsConfig, listener: Arc<dyn EventListener>) -> std::result::Result<Self, ConfigError> {
        let config = config.resolve();
        let filter = FilenameFilter::new(&config.allowed, &config.disallowed)?;
        std::fs::create_dir_all(&config.temp_dir)?;

        let store = SessionStore::new(config.temp_dir.clone(), config.protocol.clone());
        let notifier = Notifier::new(listener);
        let reconciler = Reconciler::new(store.clone(), Arc::new(filter), config.max_size, notifier.clone());

        tracing::debug!(
            temp_dir = %config.temp_dir.display(),
            method = %config.allowed_method,
            protocol = %config.protocol,
            max_size = config.max_size,
            "BITS handler ready"
        );

        Ok(Self {
            inner: Arc::new(BitsHandlerInner {
                config,
                store,
                reconciler,
                notifier,
            }),
        })
    }

    /// Effective configuration, defaults applied
    pub fn config(&self) -> &BitsConfig {
        &self.inner.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.store
    }

    /// Handle one request to completion; failures become wire responses
    pub async fn handle(&self, request: BitsRequest) -> BitsResponse {
        let BitsRequest {
            method,
            path,
            headers: map,
            body,
        } = request;

        if method.as_str() != self.config().allowed_method {
            tracing::warn!(method = %method, "Rejected request method");
            return BitsResponse::method_not_allowed(&self.config().allowed_method);
        }

        let raw_type = header(&map, headers::PACKET_TYPE).unwrap_or_default();
        let Some(packet) = PacketType::parse(raw_type) else {
            let err = BitsError::UnknownPacketType(raw_type.to_string());
            tracing::warn!(packet_type = %raw_type, "Unknown packet type");
            return BitsResponse::error(None, &err);
        };

        let outcome = match packet {
            PacketType::Ping => Ok(BitsResponse::ack()),
            PacketType::CreateSession => self.create_session(&map).await,
            PacketType::CancelSession => self.cancel_session(&map).await,
            PacketType::CloseSession => self.close_session(&map).await,
            PacketType::Fragment => self.fragment(&map, &path, body).await,
        };

        outcome.unwrap_or_else(|err| {
            // no session exists yet while creating one
            let session = match packet {
                PacketType::CreateSession => None,
                _ => session_id(&map),
            };

            if err.is_server_error() {
                tracing::error!(
                    packet_type = %packet,
                    session_id = session.unwrap_or_default(),
                    error = %err,
                    "BITS request failed"
                );
            } else {
                tracing::warn!(
                    packet_type = %packet,
                    session_id = session.unwrap_or_default(),
                    error = %err,
                    "BITS request rejected"
                );
            }

            BitsResponse::error(session, &err)
        })
    }

    // ========================================================================
    // Packets
    // ========================================================================

    async fn create_session(&self, map: &HeaderMap) -> Result<BitsResponse> {
        let supported = header(map, headers::SUPPORTED_PROTOCOLS).unwrap_or_default();
        let created = self.inner.store.create(supported).await?;

        self.inner
            .notifier
            .notify(BitsEvent::SessionCreated {
                session_id: created.id.to_string(),
                path: created.path.clone(),
            })
            .await;

        Ok(BitsResponse::created(&created))
    }

    async fn cancel_session(&self, map: &HeaderMap) -> Result<BitsResponse> {
        let raw = session_id(map).ok_or(BitsError::MissingSessionId)?;
        let id = self.live_session(raw).await?;

        let session = self.inner.store.lock_exclusive(&id).await;
        if !session.is_live().await {
            return Err(BitsError::SessionNotFound(raw.to_string()));
        }
        let path = session.path();
        session.destroy().await?;

        tracing::info!(session_id = %id, "Session canceled");
        self.inner
            .notifier
            .notify(BitsEvent::SessionCanceled {
                session_id: id.to_string(),
                path,
            })
            .await;

        Ok(BitsResponse::ack_session(raw))
    }

    async fn close_session(&self, map: &HeaderMap) -> Result<BitsResponse> {
        let raw = session_id(map).ok_or(BitsError::MissingSessionId)?;
        let id = self.live_session(raw).await?;

        let session = self.inner.store.lock_exclusive(&id).await;
        if !session.is_live().await {
            return Err(BitsError::SessionNotFound(raw.to_string()));
        }

        // the listener sees the directory before it goes
        self.inner
            .notifier
            .notify(BitsEvent::SessionClosed {
                session_id: id.to_string(),
                path: session.path(),
            })
            .await;

        match session.destroy().await {
            Ok(()) => {}
            // the listener may have taken the directory itself
            Err(BitsError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        tracing::info!(session_id = %id, "Session closed");
        Ok(BitsResponse::ack_session(raw))
    }

    async fn fragment(&self, map: &HeaderMap, path: &str, body: Body) -> Result<BitsResponse> {
        let session = session_id(map).unwrap_or_default();
        let filename = filename_from_path(path);

        let ack = self
            .inner
            .reconciler
            .apply(FragmentRequest {
                session_id: session,
                filename: &filename,
                content_range: header(map, headers::CONTENT_RANGE),
                content_length: header(map, headers::CONTENT_LENGTH),
                payload: body,
            })
            .await?;

        Ok(BitsResponse::received(session, ack.received))
    }

    /// Parse an id and confirm its directory exists
    async fn live_session(&self, raw: &str) -> Result<SessionId> {
        let not_found = || BitsError::SessionNotFound(raw.to_string());
        let id = SessionId::parse(raw).ok_or_else(not_found)?;
        if !self.inner.store.is_live(&id).await {
            return Err(not_found());
        }
        Ok(id)
    }
}
