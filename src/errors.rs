//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Enqueue request is missing required fields or carries malformed values.
    Validation(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Session status change not permitted by the lifecycle state machine.
    InvalidTransition(String),
    /// Collaborator service unreachable or answered with a non-2xx status.
    ///
    /// The message is the server-provided `{error}` text when one was sent.
    Upstream(String),
    /// Collaborator service answered 2xx with a payload we cannot use.
    Malformed(String),
    /// Draft persistence failure.
    Persistence(String),
    /// HTTP surface failure (bind, serve).
    Http(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// The bare message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Config(msg)
            | Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::InvalidTransition(msg)
            | Self::Upstream(msg)
            | Self::Malformed(msg)
            | Self::Persistence(msg)
            | Self::Http(msg)
            | Self::Io(msg) => msg,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::Upstream(msg) => write!(f, "upstream: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed: {msg}"),
            Self::Persistence(msg) => write!(f, "persistence: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
