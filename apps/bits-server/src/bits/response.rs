//! Wire responses
//!
//! Every BITS response is a status plus a few headers; the body is always
//! empty. Failures carry `BITS-Error-Code` and `BITS-Error-Context`, and the
//! session id whenever the request named one.

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::BitsError;

use super::session::CreatedSession;
use super::types::{headers, ACK};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitsResponse {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
}

impl BitsResponse {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Plain acknowledgement
    pub fn ack() -> Self {
        Self::new(StatusCode::OK).with(headers::PACKET_TYPE, ACK)
    }

    /// Acknowledgement naming the session
    pub fn ack_session(session_id: &str) -> Self {
        Self::ack().with(headers::SESSION_ID, session_id)
    }

    /// Reply to a successful create-session
    pub fn created(session: &CreatedSession) -> Self {
        Self::ack()
            .with(headers::PROTOCOL, session.protocol.as_str())
            .with(headers::SESSION_ID, session.id.to_string())
            .with(headers::ACCEPT_ENCODING, "Identity")
    }

    /// Reply to an accepted fragment
    pub fn received(session_id: &str, received: u64) -> Self {
        Self::ack_session(session_id).with(headers::RECEIVED_CONTENT_RANGE, received.to_string())
    }

    pub fn error(session_id: Option<&str>, err: &BitsError) -> Self {
        let mut response = Self::new(err.status_code()).with(headers::PACKET_TYPE, ACK);
        if let Some(id) = session_id {
            response = response.with(headers::SESSION_ID, id);
        }
        response = response
            .with(headers::ERROR_CODE, format!("{:x}", err.code()))
            .with(headers::ERROR_CONTEXT, err.context().to_hex());
        if let Some(received) = err.received() {
            response = response.with(headers::RECEIVED_CONTENT_RANGE, received.to_string());
        }
        response
    }

    /// Request used a method other than the configured one
    pub fn method_not_allowed(allowed: &str) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED).with("Allow", allowed)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// First value of a header, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }
}

impl IntoResponse for BitsResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self.status;

        let map = response.headers_mut();
        for (name, value) in self.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => {
                    tracing::warn!(header = name, value = %value, "Dropping unrepresentable response header");
                }
            }
        }
        map.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));

        response
    }
}
