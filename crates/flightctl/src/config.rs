//! Connection settings for the Flight Control API.

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How to reach and authenticate against the API.
///
/// # Example
///
/// ```
/// use flightctl::AuthConfig;
///
/// let auth = AuthConfig::new("https://api.flightctl.example.com/")
///     .token("secret")
///     .validate_certs(false);
/// assert_eq!(auth.base_url().unwrap(), "https://api.flightctl.example.com");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// API endpoint, e.g. `https://api.flightctl.example.com`.
    pub host: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Verify the server certificate.
    pub validate_certs: bool,
    /// PEM file with the CA certificate that signed the server certificate.
    pub ca_path: Option<PathBuf>,
    /// Overall timeout for a single request.
    pub request_timeout: Duration,
}

impl AuthConfig {
    /// Create settings for a host with defaults for everything else.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: None,
            validate_certs: true,
            ca_path: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the bearer token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Enable or disable certificate verification.
    pub fn validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = validate;
        self
    }

    /// Trust a custom CA certificate.
    pub fn ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    /// Set the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Normalized API base URL without a trailing slash.
    pub fn base_url(&self) -> Result<String> {
        let host = self.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(Error::Config("flightctl_host is not set".to_string()));
        }
        if !(host.starts_with("https://") || host.starts_with("http://")) {
            return Err(Error::Config(format!(
                "flightctl_host must start with http:// or https://, got '{}'",
                host
            )));
        }
        Ok(host.to_string())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("validate_certs", &self.validate_certs)
            .field("ca_path", &self.ca_path)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
