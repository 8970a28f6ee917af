// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the event stream share TLS, user agent and the bearer
// header through this module. The stream client carries no total timeout:
// reqwest applies `timeout` to the whole body, which would recycle an
// idle-but-open event feed.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

const USER_AGENT: &str = concat!("freedompro-bridge/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the bundled webpki roots.
    #[default]
    System,
    /// Add a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Total timeout for REST calls.
    pub timeout: Duration,
    /// Connect timeout, applied to both REST calls and the event stream.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build the REST client. Every request carries `Authorization: Bearer`.
    pub fn build_client(&self, api_key: &SecretString) -> Result<reqwest::Client, Error> {
        self.builder(api_key)?
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Build the long-lived event stream client (no total timeout).
    pub fn build_stream_client(&self, api_key: &SecretString) -> Result<reqwest::Client, Error> {
        self.builder(api_key)?
            .build()
            .map_err(|e| Error::Tls(format!("failed to build stream client: {e}")))
    }

    fn builder(&self, api_key: &SecretString) -> Result<reqwest::ClientBuilder, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .default_headers(bearer_headers(api_key)?);

        if let TlsMode::CustomCa(path) = &self.tls {
            let cert_pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&cert_pem)
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(builder)
    }
}

fn bearer_headers(api_key: &SecretString) -> Result<HeaderMap, Error> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
        .map_err(|e| Error::Authentication {
            message: format!("invalid API key header value: {e}"),
        })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_sensitive() {
        let key = SecretString::from("abc123".to_string());
        let headers = bearer_headers(&key).expect("valid header");
        let value = headers.get(AUTHORIZATION).expect("authorization header");
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().expect("ascii"), "Bearer abc123");
    }

    #[test]
    fn newline_in_key_is_rejected() {
        let key = SecretString::from("bad\nkey".to_string());
        assert!(matches!(
            bearer_headers(&key),
            Err(Error::Authentication { .. })
        ));
    }
}
