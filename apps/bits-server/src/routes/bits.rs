//! BITS Routes
//!
//! BITS clients send every packet with the same custom method to the URL
//! of the file being uploaded, so the whole tree is one fallback handler
//! and the dispatcher does the method check itself. Paths outside the
//! configured upload URI are not ours.
//!
//! The body is passed on unread. The dispatcher rejects wrong methods and
//! bad packets first, and a fragment reads at most its declared length.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};

use crate::bits::BitsRequest;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new().fallback(handle_packet).with_state(state)
}

async fn handle_packet(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let path = uri.path();
    if !under_prefix(&state.config().server.uri, path) {
        tracing::warn!(path = %path, "Request outside upload URI");
        return StatusCode::NOT_FOUND.into_response();
    }

    let request = BitsRequest {
        method,
        path: path.to_string(),
        headers,
        body,
    };

    state.handler().handle(request).await.into_response()
}

/// Whether `path` is the upload URI or lies below it
fn under_prefix(uri: &str, path: &str) -> bool {
    let prefix = uri.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
