// ── Core error types ──
//
// Bridge-level errors. Consumers never see raw HTTP status handling or
// JSON parse failures directly: `From<freedompro_api::Error>` translates
// transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the Freedompro cloud at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request to the Freedompro cloud timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Accessory not found: {identifier}")]
    AccessoryNotFound { identifier: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Host errors ──────────────────────────────────────────────────
    #[error("Accessory host error: {message}")]
    Host { message: String },

    // ── Lifecycle / configuration ────────────────────────────────────
    #[error("Bridge already started")]
    AlreadyStarted,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if the cloud rejected the configured token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<freedompro_api::Error> for CoreError {
    fn from(err: freedompro_api::Error) -> Self {
        use freedompro_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ApiError::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            ApiError::Stream(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("event stream: {reason}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_translates() {
        let err: CoreError = freedompro_api::Error::Authentication {
            message: "token rejected (HTTP 401)".into(),
        }
        .into();
        assert!(err.is_auth_failure());
    }

    #[test]
    fn api_status_is_kept() {
        let err: CoreError = freedompro_api::Error::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    }
}
