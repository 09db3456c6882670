//! Error types shared across subsystems.
//!
//! # Taxonomy
//! - No route match is not an error: the request is served locally.
//! - `ProxyError::Upstream` means the target could not be reached (502).
//! - `ProxyError::HandshakeRefused` means the target answered a WebSocket
//!   handshake without upgrading; its reply goes back to the client as-is.
//! - `ProxyError::Rewrite` means a rewrite produced a path we refuse to
//!   forward (500).
//! - Construction errors (`RouteError`, `DefineError`) abort start-up.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised while compiling proxy rules.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("rule prefix must not be empty")]
    EmptyPrefix,

    #[error("rule prefix {0:?} must start with '/'")]
    PrefixWithoutSlash(String),

    #[error("invalid target URL {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported target scheme {0:?} (only http is supported)")]
    UnsupportedScheme(String),

    #[error("target URL {0:?} has no host")]
    MissingHost(String),

    #[error("invalid rewrite pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// A rewrite produced a path that cannot be forwarded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("rewritten path {0:?} is not a valid URI path")]
    InvalidPath(String),
}

/// Errors raised while building the define table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefineError {
    #[error("define key {0:?} is not an identifier or dotted identifier chain")]
    InvalidKey(String),
}

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Define(#[from] DefineError),
}

/// Per-request failures surfaced to the client.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("upstream {target} unreachable: {reason}")]
    Upstream { target: String, reason: String },

    #[error("upstream {target} refused the WebSocket handshake with {}", .response.status())]
    HandshakeRefused { target: String, response: Box<Response> },

    #[error("invalid upstream URI {0:?}")]
    InvalidUpstreamUri(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Rewrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::InvalidUpstreamUri(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::HandshakeRefused { response, .. } => response.status(),
        }
    }

    /// `kind` label of `dev_proxy_errors_total`.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Rewrite(_) => "rewrite_error",
            ProxyError::InvalidUpstreamUri(_) => "invalid_uri",
            ProxyError::Upstream { .. } => "upstream_error",
            ProxyError::HandshakeRefused { .. } => "handshake_refused",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        if let ProxyError::HandshakeRefused { response, .. } = self {
            return *response;
        }
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
