//! Module result objects
//!
//! Success and failure are each a single JSON object on stdout, the shape
//! module frameworks read back.

use reconcile::{Action, Outcome};
use serde::Serialize;
use serde_json::{Value, json};

/// Prefix of every failure message
const FAILURE_PREFIX: &str = "Failed to run module";

#[derive(Debug, Serialize)]
pub struct ModuleResult {
    pub changed: bool,
    pub action: Action,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
}

/// Resource before and after the action; `{}` for a side that does not exist
#[derive(Debug, Serialize)]
pub struct Diff {
    pub before: Value,
    pub after: Value,
}

impl ModuleResult {
    pub fn from_outcome(outcome: &Outcome, with_diff: bool) -> Self {
        let diff = with_diff.then(|| Diff {
            before: outcome.before.clone().unwrap_or_else(|| json!({})),
            after: outcome.result(),
        });

        Self {
            changed: outcome.changed(),
            action: outcome.action,
            result: outcome.result(),
            diff,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModuleFailure {
    pub failed: bool,
    pub changed: bool,
    pub msg: String,
}

impl ModuleFailure {
    /// `message` is expected to start with the failing step
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: format!("{}: {}", FAILURE_PREFIX, message),
        }
    }
}
