//! Error types for Flight Control API operations.
//!
//! Errors are categorized so callers can decide whether an operation is worth
//! retrying and how to present the failure to the user.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for Flight Control API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors and server faults (transient, retryable).
    Network,
    /// Missing or rejected credentials.
    Auth,
    /// Resource does not exist.
    NotFound,
    /// Resource was modified concurrently or already exists.
    Conflict,
    /// The server rejected the request body.
    Validation,
    /// Response or input could not be decoded.
    Format,
    /// Client configuration is unusable.
    Config,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network or server issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Resource conflict",
            Self::Validation => "Request rejected by the API",
            Self::Format => "Invalid document format",
            Self::Config => "Invalid client configuration",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the Flight Control API is reachable and try again",
            Self::Auth => "Check flightctl_token and that it has not expired",
            Self::NotFound => "Verify the resource kind, name and fleet",
            Self::Conflict => "Re-run to pick up the latest version of the resource",
            Self::Validation => "Fix the resource definition according to the API message",
            Self::Format => "Check that the document is valid JSON or YAML",
            Self::Config => "Check flightctl_host, flightctl_ca_path and related options",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the Flight Control API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure before an HTTP status was received.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Request URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// The API answered with a non-success status.
    #[error("API returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or the status reason.
        message: String,
    },

    /// The requested resource does not exist.
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// Invalid response body from the API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// A patch could not be applied to a document.
    #[error("patch failed: {0}")]
    Patch(String),

    /// Client configuration problem.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error while reading local files (CA bundle, config).
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an HTTP status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, if the error came from an API response.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport { .. } => ErrorCategory::Network,
            Error::Status { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                404 => ErrorCategory::NotFound,
                409 => ErrorCategory::Conflict,
                400 | 422 => ErrorCategory::Validation,
                500..=599 => ErrorCategory::Network,
                _ => ErrorCategory::Other,
            },
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Patch(_) => ErrorCategory::Format,
            Error::Config(_) => ErrorCategory::Config,
            Error::Io { .. } => ErrorCategory::Config,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the API reported a conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Status {
                status: code,
                message: format!("HTTP {}", code),
            },
            other => Self::Transport {
                url: String::new(),
                message: other.to_string(),
            },
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
