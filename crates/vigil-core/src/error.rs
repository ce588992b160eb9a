// ── Core error types ──
//
// Two families live here. `FetchError` is what a fetch capability
// reports for a single poll; the coordinator classifies and absorbs it.
// `CoreError` is what callers of the core API see: configuration
// problems and session setup failures. The `From<vigil_api::Error>`
// impls translate transport-layer errors into both.

use thiserror::Error;

use crate::state::FailureClass;

// ── Fetch errors ─────────────────────────────────────────────────────

/// Failure reported by a [`FetchCapability`](crate::FetchCapability).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Credentials were rejected; user action is required.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The remote side did not answer in time.
    #[error("timed out: {message}")]
    Timeout { message: String },

    /// The remote side could not be reached.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Anything the vendor client could not classify further.
    #[error("{message}")]
    Unknown { message: String },
}

impl FetchError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Map the error onto the coordinator's failure taxonomy.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Authentication { .. } => FailureClass::Authentication,
            Self::Timeout { .. } => FailureClass::Timeout,
            Self::Connection { .. } => FailureClass::Transient,
            Self::Unknown { .. } => FailureClass::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Authentication { message }
            | Self::Timeout { message }
            | Self::Connection { message }
            | Self::Unknown { message } => message,
        }
    }
}

impl From<vigil_api::Error> for FetchError {
    fn from(err: vigil_api::Error) -> Self {
        let message = err.to_string();
        match err {
            vigil_api::Error::Authentication { .. } | vigil_api::Error::SessionExpired => {
                Self::Authentication { message }
            }
            vigil_api::Error::Timeout { .. } => Self::Timeout { message },
            vigil_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    Self::Timeout { message }
                } else if e.is_connect() || e.is_request() {
                    Self::Connection { message }
                } else {
                    Self::Unknown { message }
                }
            }
            vigil_api::Error::Api {
                status: 502 | 503, ..
            } => Self::Connection { message },
            vigil_api::Error::Api { .. }
            | vigil_api::Error::InvalidUrl(_)
            | vigil_api::Error::Tls(_)
            | vigil_api::Error::Deserialization { .. } => Self::Unknown { message },
        }
    }
}

// ── Core errors ──────────────────────────────────────────────────────

/// Unified error type for the core crate's public operations.
///
/// Never produced by a poll cycle: fetch failures are absorbed by the
/// coordinator and surface only as state transitions.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ── Session setup ────────────────────────────────────────────────
    #[error("Cannot connect to panel at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Panel connection timed out: {message}")]
    Timeout { message: String },

    #[error("Panel API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Coordinator is already running")]
    AlreadyRunning,
}

impl From<vigil_api::Error> for CoreError {
    fn from(err: vigil_api::Error) -> Self {
        match err {
            vigil_api::Error::Authentication { message } => Self::AuthenticationFailed { message },
            vigil_api::Error::SessionExpired => Self::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            vigil_api::Error::Timeout { status } => Self::Timeout {
                message: format!("HTTP {status}"),
            },
            vigil_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    Self::Timeout {
                        message: e.to_string(),
                    }
                } else if e.is_connect() {
                    Self::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    Self::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            vigil_api::Error::InvalidUrl(e) => Self::InvalidConfig {
                message: format!("Invalid URL: {e}"),
            },
            vigil_api::Error::Tls(msg) => Self::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            vigil_api::Error::Api { status, message } => Self::Api {
                message,
                status: Some(status),
            },
            vigil_api::Error::Deserialization { message, body: _ } => Self::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
        }
    }
}

impl CoreError {
    /// Failure class of a setup error, for callers that report setup and
    /// poll failures the same way.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::AuthenticationFailed { .. } => FailureClass::Authentication,
            Self::Timeout { .. } => FailureClass::Timeout,
            Self::ConnectionFailed { .. } => FailureClass::Transient,
            Self::InvalidConfig { .. } | Self::Api { .. } | Self::AlreadyRunning => {
                FailureClass::Unknown
            }
        }
    }
}
