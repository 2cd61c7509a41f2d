use std::error::Error;
use std::fmt;

use warp::reject::Reject;

use crate::constants::{
    ERROR_BAD_UPSTREAM_PAYLOAD, ERROR_CIRCUIT_OPEN, ERROR_SHUTTING_DOWN, ERROR_UPSTREAM_TIMEOUT,
    ERROR_UPSTREAM_UNAVAILABLE,
};
use crate::translate::OutboundError;

/// Failure of the pure schema translator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed upstream payload: {0}")]
    MalformedUpstream(String),
}

/// Lifecycle-level errors of the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no free port in range {start}-{end}")]
    PortExhausted { start: u16, end: u16 },

    #[error("failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },

    #[error("gateway is already running on port {0}")]
    AlreadyRunning(u16),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("health check failed: {0}")]
    HealthCheck(String),

    #[error("restart failed after {attempts} attempts: {last_error}")]
    RestartExhausted { attempts: u32, last_error: String },
}

impl GatewayError {
    /// Whether this error leaves the gateway in a non-running state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Configuration(_)
                | GatewayError::PortExhausted { .. }
                | GatewayError::Bind { .. }
                | GatewayError::RestartExhausted { .. }
        )
    }
}

/// Error rendered to HTTP callers as an outbound error envelope.
#[derive(Debug, Clone)]
pub struct ProxyError {
    pub message: String,
    pub status_code: u16,
    pub error_type: String,
    pub code: String,
    kind: ProxyErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProxyErrorKind {
    BadRequest,
    BadGateway,
    UpstreamUnavailable,
    UpstreamTimeout,
    UpstreamTransport,
    CircuitOpen,
    ShuttingDown,
    Upstream,
    Internal,
}

impl ProxyError {
    fn with_kind(message: &str, status_code: u16, error_type: &str, kind: ProxyErrorKind) -> Self {
        Self {
            message: message.to_string(),
            status_code,
            error_type: error_type.to_string(),
            code: error_type.to_string(),
            kind,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::with_kind(message, 400, "invalid_request_error", ProxyErrorKind::BadRequest)
    }

    pub fn internal_server_error(message: &str) -> Self {
        Self::with_kind(message, 500, "server_error", ProxyErrorKind::Internal)
    }

    pub fn bad_upstream_payload(detail: &str) -> Self {
        log::warn!("{}: {}", ERROR_BAD_UPSTREAM_PAYLOAD, detail);
        Self::with_kind(
            ERROR_BAD_UPSTREAM_PAYLOAD,
            502,
            "conversion_error",
            ProxyErrorKind::BadGateway,
        )
    }

    pub fn upstream_unavailable() -> Self {
        Self::with_kind(
            ERROR_UPSTREAM_UNAVAILABLE,
            503,
            "connection_error",
            ProxyErrorKind::UpstreamUnavailable,
        )
    }

    /// Name resolution failures are reported like connection errors but are
    /// not worth retrying.
    pub fn upstream_unresolvable() -> Self {
        Self::with_kind(
            ERROR_UPSTREAM_UNAVAILABLE,
            503,
            "connection_error",
            ProxyErrorKind::UpstreamTransport,
        )
    }

    pub fn upstream_timeout() -> Self {
        Self::with_kind(
            ERROR_UPSTREAM_TIMEOUT,
            504,
            "timeout_error",
            ProxyErrorKind::UpstreamTimeout,
        )
    }

    pub fn upstream_failed(message: &str) -> Self {
        Self::with_kind(message, 502, "api_error", ProxyErrorKind::UpstreamTransport)
    }

    pub fn circuit_open() -> Self {
        Self::with_kind(
            ERROR_CIRCUIT_OPEN,
            503,
            "circuit_breaker_error",
            ProxyErrorKind::CircuitOpen,
        )
    }

    pub fn shutting_down() -> Self {
        Self::with_kind(
            ERROR_SHUTTING_DOWN,
            503,
            "server_error",
            ProxyErrorKind::ShuttingDown,
        )
    }

    /// Error object returned by upstream, already translated.
    pub fn from_upstream(error: OutboundError, status_code: u16) -> Self {
        Self {
            message: error.error.message,
            status_code,
            error_type: error.error.error_type,
            code: error.error.code,
            kind: ProxyErrorKind::Upstream,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ProxyErrorKind::UpstreamUnavailable
                | ProxyErrorKind::UpstreamTimeout
                | ProxyErrorKind::UpstreamTransport
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ProxyErrorKind::UpstreamUnavailable | ProxyErrorKind::UpstreamTimeout => true,
            ProxyErrorKind::Upstream => self.status_code == 429 || self.status_code >= 500,
            _ => false,
        }
    }

    pub fn to_envelope(&self) -> OutboundError {
        OutboundError::new(&self.message, &self.error_type, &self.code)
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyError {}: {}", self.status_code, self.message)
    }
}

impl Error for ProxyError {}

impl Reject for ProxyError {}

impl From<TranslationError> for ProxyError {
    fn from(err: TranslationError) -> Self {
        match err {
            TranslationError::InvalidRequest(message) => ProxyError::bad_request(&message),
            TranslationError::MalformedUpstream(detail) => ProxyError::bad_upstream_payload(&detail),
        }
    }
}
