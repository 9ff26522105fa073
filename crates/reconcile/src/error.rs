//! Reconciliation errors

use std::fmt;

/// Step of a reconciliation, named in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Resolving identity and parsing the definition (no network)
    Resolve,
    /// Existence check
    Get,
    Create,
    Patch,
    Delete,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Get => "get",
            Self::Create => "create",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a reconciliation failed
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Inputs cannot be turned into a request. Raised before any network call.
    #[error("resolve: {0}")]
    Configuration(String),

    /// The API call for `step` failed.
    #[error("{step}: {source}")]
    Client {
        step: Step,
        #[source]
        source: flightctl::Error,
    },

    /// The API reported a conflict for `step`.
    #[error("{step}: conflict: {source}")]
    Conflict {
        step: Step,
        #[source]
        source: flightctl::Error,
    },
}

impl ReconcileError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap an API error, keeping conflicts distinct
    pub fn client(step: Step, source: flightctl::Error) -> Self {
        if source.is_conflict() {
            Self::Conflict { step, source }
        } else {
            Self::Client { step, source }
        }
    }

    /// The step that failed
    pub fn step(&self) -> Step {
        match self {
            Self::Configuration(_) => Step::Resolve,
            Self::Client { step, .. } | Self::Conflict { step, .. } => *step,
        }
    }

    /// Category of the underlying API error; `None` for configuration errors
    pub fn category(&self) -> Option<flightctl::ErrorCategory> {
        match self {
            Self::Configuration(_) => None,
            Self::Client { source, .. } | Self::Conflict { source, .. } => Some(source.category()),
        }
    }

    /// Whether re-running the same invocation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration(_) => false,
            Self::Client { source, .. } => source.is_retryable(),
            Self::Conflict { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message_names_step() {
        let err = ReconcileError::config("kind is required");
        assert_eq!(err.to_string(), "resolve: kind is required");
        assert_eq!(err.step(), Step::Resolve);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_client_error_routes_conflicts() {
        let err = ReconcileError::client(Step::Patch, flightctl::Error::status(409, "stale"));
        assert!(matches!(err, ReconcileError::Conflict { step: Step::Patch, .. }));
        assert!(err.to_string().starts_with("patch: conflict:"));
        assert!(err.is_retryable());

        let err = ReconcileError::client(Step::Get, flightctl::Error::status(401, "expired"));
        assert!(matches!(err, ReconcileError::Client { step: Step::Get, .. }));
        assert_eq!(err.category(), Some(flightctl::ErrorCategory::Auth));
        assert!(err.to_string().starts_with("get: "));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_network_failures_are_retryable() {
        let err = ReconcileError::client(Step::Delete, flightctl::Error::status(503, "down"));
        assert!(err.is_retryable());
        assert_eq!(err.step(), Step::Delete);
    }
}
