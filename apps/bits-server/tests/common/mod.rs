#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use bits_server::bits::{headers, BitsEvent, DEFAULT_METHOD, DEFAULT_PROTOCOL};
use bits_server::{routes, AppState, BitsConfig, BitsHandler, Config, EventListener, ServerConfig};
use parking_lot::Mutex;
use tempfile::TempDir;
use tower::ServiceExt;

/// Listener that keeps every event it sees
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<BitsEvent>>,
}

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

impl EventListener for RecordingListener {
    fn on_event(&self, event: &BitsEvent) -> anyhow::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

pub struct TestServer {
    pub app: Router,
    pub handler: BitsHandler,
    pub recorder: Arc<RecordingListener>,
    pub dir: TempDir,
}

impl TestServer {
    pub fn temp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.temp_dir().join(session_id)
    }
}

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Server on `/` with a recording listener
pub fn create_test_server(config: BitsConfig) -> TestServer {
    create_test_server_at(config, "/")
}

pub fn create_test_server_at(config: BitsConfig, uri: &str) -> TestServer {
    let dir = setup_temp_dir();
    let recorder = Arc::new(RecordingListener::new());
    let config = BitsConfig {
        temp_dir: dir.path().join("tmp"),
        ..config
    };
    let (app, handler) = create_test_app(config, recorder.clone(), uri);

    TestServer {
        app,
        handler,
        recorder,
        dir,
    }
}

pub fn create_test_app(config: BitsConfig, listener: Arc<dyn EventListener>, uri: &str) -> (Router, BitsHandler) {
    let handler = BitsHandler::new(config, listener).expect("Failed to build handler");
    let config = Config {
        server: ServerConfig {
            uri: uri.to_string(),
            ..Default::default()
        },
        bits: handler.config().clone(),
    };
    let state = AppState::new(config, handler.clone());
    (routes::app(state), handler)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("Request failed")
}

pub fn header(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .map(|value| value.to_str().expect("non-ascii header").to_string())
}

pub fn packet(uri: &str, packet_type: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(DEFAULT_METHOD)
        .uri(uri)
        .header(headers::PACKET_TYPE, packet_type)
}

pub fn create_request(uri: &str, protocols: &str) -> Request<Body> {
    packet(uri, "Create-Session")
        .header(headers::SUPPORTED_PROTOCOLS, protocols)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn session_request(uri: &str, packet_type: &str, session_id: &str) -> Request<Body> {
    packet(uri, packet_type)
        .header(headers::SESSION_ID, session_id)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn fragment_request(uri: &str, session_id: &str, start: u64, end: u64, total: u64, data: &[u8]) -> Request<Body> {
    packet(uri, "Fragment")
        .header(headers::SESSION_ID, session_id)
        .header(headers::CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
        .header(headers::CONTENT_LENGTH, data.len().to_string())
        .body(Body::from(data.to_vec()))
        .expect("Failed to build request")
}

/// Open a session and return its id
pub async fn open_session(app: &Router, uri: &str) -> String {
    let response = send(app, create_request(uri, DEFAULT_PROTOCOL)).await;
    assert_eq!(response.status(), 200);
    header(&response, headers::SESSION_ID).expect("Missing session id")
}

pub fn create_test_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn read_file(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap_or_default()
}
