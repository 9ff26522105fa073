//! Core types for desired-state reconciliation

use crate::identity::EffectiveIdentity;
use flightctl::Patch;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Target lifecycle condition of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// Resource exists and matches the definition
    #[default]
    Present,
    /// Resource does not exist
    Absent,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesiredState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(format!(
                "invalid state '{}': expected 'present' or 'absent'",
                other
            )),
        }
    }
}

/// The single action a reconciliation took (or would take in check mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Resource was created
    Created,
    /// Resource was patched
    Patched,
    /// Resource was deleted
    Deleted,
    /// Already converged, nothing sent
    Unchanged,
}

impl Action {
    /// Check if the action represents a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Patched => "patched",
            Self::Deleted => "deleted",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The resource the action applied to
    pub identity: EffectiveIdentity,
    pub action: Action,
    /// Resource as returned by the server; `None` after a deletion or when
    /// an absent resource stayed absent
    pub resource: Option<Value>,
    /// Resource before the action, if it existed
    pub before: Option<Value>,
    /// Operations sent (or that would be sent) for a patch
    pub patch: Patch,
    /// Whether the action was only computed, not performed
    pub check_mode: bool,
}

impl Outcome {
    pub(crate) fn new(
        identity: EffectiveIdentity,
        action: Action,
        before: Option<Value>,
        resource: Option<Value>,
    ) -> Self {
        Self {
            identity,
            action,
            resource,
            before,
            patch: Patch(Vec::new()),
            check_mode: false,
        }
    }

    pub(crate) fn with_patch(mut self, patch: Patch) -> Self {
        self.patch = patch;
        self
    }

    pub(crate) fn in_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Whether the resource changed (or would change)
    pub fn changed(&self) -> bool {
        self.action.is_change()
    }

    /// The module `result` value: the resource, or `{}` when there is none
    pub fn result(&self) -> Value {
        self.resource.clone().unwrap_or_else(|| json!({}))
    }
}

/// Settings that apply to every reconciliation a [`Reconciler`](crate::Reconciler) runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Compute the action but do not send mutations
    pub check_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desired_state_parse() {
        assert_eq!("present".parse::<DesiredState>(), Ok(DesiredState::Present));
        assert_eq!(" Absent ".parse::<DesiredState>(), Ok(DesiredState::Absent));
        assert!("gone".parse::<DesiredState>().is_err());
        assert_eq!(DesiredState::default(), DesiredState::Present);
    }

    #[test]
    fn test_desired_state_serde() {
        let state: DesiredState = serde_json::from_value(json!("absent")).unwrap();
        assert_eq!(state, DesiredState::Absent);
        assert_eq!(serde_json::to_value(DesiredState::Present).unwrap(), json!("present"));
    }

    #[test]
    fn test_action_is_change() {
        assert!(Action::Created.is_change());
        assert!(Action::Patched.is_change());
        assert!(Action::Deleted.is_change());
        assert!(!Action::Unchanged.is_change());
    }

    #[test]
    fn test_outcome_result_is_empty_without_resource() {
        let identity = crate::identity::resolve(
            &crate::ResourceIdentity::new().kind("Device").name("d1"),
            None,
        )
        .unwrap();
        let outcome = Outcome::new(identity, Action::Deleted, Some(json!({"kind": "Device"})), None);
        assert!(outcome.changed());
        assert_eq!(outcome.result(), json!({}));
    }
}
