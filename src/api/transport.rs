//! HTTP transport for replay attempts.
//!
//! A transport re-issues one `ReplayRequest` and reports either the
//! response or a failure. HTTP status codes are data on the response, not
//! errors: only failures to complete the exchange (connect, timeout) are
//! errors, and those carry an explicit `retryable` flag that decides
//! whether the request belongs in the queue.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RequeueError;
use crate::sync::entry::{Method, ReplayRequest};

/// The outcome of a completed request exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body: parsed JSON when possible, otherwise the raw text
    /// as a JSON string.
    pub body: serde_json::Value,
}

impl ReplayResponse {
    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failure category of a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The server could not be reached.
    Connect,
    /// The exchange did not complete in time.
    Timeout,
    /// The request could not be built or sent.
    Request,
}

impl TransportErrorKind {
    /// The string representation used in event payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Request => "request",
        }
    }
}

/// A failed request exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Whether retrying later can reasonably succeed. Connectivity
    /// failures are retryable; malformed requests are not.
    pub retryable: bool,
}

impl TransportError {
    /// A connectivity failure, retryable.
    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Connect,
            message: message.into(),
            retryable: true,
        }
    }

    /// A timeout, retryable.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    /// A request that cannot succeed by waiting, not retryable.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Request,
            message: message.into(),
            retryable: false,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for TransportError {}

/// The seam between the queue core and the external HTTP API.
pub trait ReplayTransport: Send + Sync {
    /// Re-issue one request and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` when the exchange could not complete;
    /// rejected statuses are returned as a `ReplayResponse`.
    fn send(&self, request: &ReplayRequest) -> Result<ReplayResponse, TransportError>;
}

/// Blocking HTTP client implementation.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, RequeueError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequeueError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl ReplayTransport for HttpTransport {
    fn send(&self, request: &ReplayRequest) -> Result<ReplayResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.target);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(e.to_string())
            } else if e.is_connect() {
                TransportError::connect(e.to_string())
            } else if e.is_builder() || e.is_request() {
                TransportError::rejected(e.to_string())
            } else {
                TransportError::connect(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| TransportError::connect(e.to_string()))?;

        // Prefer JSON; fall back to the raw text
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::Value::String(text));

        Ok(ReplayResponse { status, body })
    }
}
