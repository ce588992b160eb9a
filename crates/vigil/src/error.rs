//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable
//! help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use vigil_config::ConfigError;
use vigil_core::{CoreError, FailureClass};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to panel at {url}")]
    #[diagnostic(
        code(vigil::connection_failed),
        help(
            "Check that the panel service is reachable.\n\
             Reason: {reason}\n\
             For self-signed certificates try: vigil check --insecure"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out: {message}")]
    #[diagnostic(
        code(vigil::timeout),
        help("Increase the timeout with --timeout or check panel responsiveness.")
    )]
    Timeout { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed for profile '{profile}'")]
    #[diagnostic(
        code(vigil::auth_failed),
        help(
            "{message}\n\
             Update the stored password with: vigil config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(vigil::no_credentials),
        help(
            "Set a username with --username or in the profile, and a password via\n\
             VIGIL_PASSWORD, `vigil config set-password`, or password_env."
        )
    )]
    NoCredentials { profile: String },

    // ── Panel ────────────────────────────────────────────────────────
    #[error("Panel API error: {message}")]
    #[diagnostic(code(vigil::api_error))]
    Api { message: String },

    #[error("Panel unavailable ({class}): {message}")]
    #[diagnostic(code(vigil::unavailable))]
    Unavailable { class: FailureClass, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vigil::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vigil::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vigil config init --panel <URL> --username <NAME>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No panel configured")]
    #[diagnostic(
        code(vigil::no_config),
        help(
            "Create a profile with: vigil config init --panel <URL> --username <NAME>\n\
             Or pass --panel and --username directly.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Profile '{name}' already exists")]
    #[diagnostic(code(vigil::profile_exists), help("Use --force to overwrite it."))]
    ProfileExists { name: String },

    #[error(transparent)]
    #[diagnostic(code(vigil::config))]
    Config(Box<figment::Error>),

    #[error("Keyring error: {0}")]
    #[diagnostic(code(vigil::keyring))]
    Keyring(String),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(vigil::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize config: {0}")]
    #[diagnostic(code(vigil::toml))]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Unavailable { class, .. } => class_exit_code(*class),
            Self::Validation { .. } | Self::ProfileExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

/// Exit code for a failure class.
pub fn class_exit_code(class: FailureClass) -> i32 {
    match class {
        FailureClass::Authentication => exit_code::AUTH,
        FailureClass::Transient => exit_code::CONNECTION,
        FailureClass::Timeout => exit_code::TIMEOUT,
        FailureClass::Unknown => exit_code::GENERAL,
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => Self::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Timeout { message } => Self::Timeout { message },

            CoreError::InvalidConfig { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Api { message, status } => Self::Api {
                message: match status {
                    Some(status) => format!("HTTP {status}: {message}"),
                    None => message,
                },
            },

            CoreError::AlreadyRunning => Self::Api {
                message: "coordinator is already running".into(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { name, available } => Self::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            ConfigError::Keyring(e) => Self::Keyring(e.to_string()),
            ConfigError::Serialization(e) => Self::Toml(e),
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}
