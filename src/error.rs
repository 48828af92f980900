//! Error types.
//!
//! [`ConfigError`] is fatal at startup. [`LlmError`] is scoped to one request:
//! it is shown to the user inline and the conversation carries on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PROJECT_ID not found in environment or .env file")]
    MissingProjectId,
    #[error("Invalid Vertex AI endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Error connecting to Google Cloud: {0}")]
    Client(String),
}

/// Failure of one remote chat call.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::MalformedResponse, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unknown, message)
    }
}

/// Classification of remote failures. Used for logging only; nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Timeouts, refused connections
    Network,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError,
    /// HTTP 401 / 403
    Auth,
    /// HTTP 400
    InvalidRequest,
    /// 2xx body without usable text
    MalformedResponse,
    Unknown,
}

impl LlmErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 | 403 => Self::Auth,
            429 => Self::RateLimit,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}
