//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use freedompro_config::ConfigError;
use freedompro_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the Freedompro cloud at {url}")]
    #[diagnostic(
        code(freedompro::connection_failed),
        help("Check network access and the configured base_url.")
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request to the Freedompro cloud timed out")]
    #[diagnostic(
        code(freedompro::timeout),
        help("Raise cloud.timeout in the config file or retry later.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(freedompro::auth_failed),
        help("Verify the API key in your Freedompro account settings.")
    )]
    AuthFailed { message: String },

    #[error("No API key configured")]
    #[diagnostic(
        code(freedompro::no_credentials),
        help(
            "Set FREEDOMPRO_API_KEY, pass --api-key, or add api_key to\n\
             {path}"
        )
    )]
    NoCredentials { path: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Accessory '{identifier}' not found")]
    #[diagnostic(
        code(freedompro::not_found),
        help("Run: freedompro-bridge devices to list composite ids (deviceUid*accessoryUid)")
    )]
    NotFound { identifier: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error{}: {message}", .status.map_or_else(String::new, |s| format!(" (HTTP {s})")))]
    #[diagnostic(code(freedompro::api_error))]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    #[error("Accessory host error: {message}")]
    #[diagnostic(code(freedompro::host))]
    Host { message: String },

    // ── Validation / configuration ───────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(freedompro::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(freedompro::config),
        help("Check the config file syntax, or recreate it with: freedompro-bridge config init --force")
    )]
    Config(Box<ConfigError>),

    #[error("Internal error: {0}")]
    #[diagnostic(code(freedompro::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(freedompro::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials => CliError::NoCredentials {
                path: freedompro_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::AccessoryNotFound { identifier } => CliError::NotFound { identifier },
            CoreError::Api { message, status } => CliError::ApiError { message, status },
            CoreError::Host { message } => CliError::Host { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::AlreadyStarted => CliError::Internal("bridge already started".into()),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
