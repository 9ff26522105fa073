//! Desired-state reconciliation
//!
//! One call to [`Reconciler::reconcile`] resolves the identity, fetches the
//! current resource and then issues at most one of create, patch or delete.

use crate::error::{ReconcileError, Step};
use crate::identity::{DefinitionInput, EffectiveIdentity, ResourceIdentity, resolve};
use crate::types::{Action, DesiredState, Outcome, ReconcileOptions};
use flightctl::{ErrorCategory, ResourceApi, patch};
use serde_json::Value;

/// Drives a resource towards its desired state through a [`ResourceApi`]
pub struct Reconciler {
    api: Box<dyn ResourceApi>,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(api: Box<dyn ResourceApi>, options: ReconcileOptions) -> Self {
        Self { api, options }
    }

    /// Reconcile one resource
    ///
    /// Inputs are validated before the first API call, so a configuration
    /// error never touches the server. The existence check always runs
    /// first and is followed by at most one mutation.
    pub fn reconcile(
        &self,
        identity: &ResourceIdentity,
        definition: Option<&DefinitionInput>,
        state: DesiredState,
    ) -> Result<Outcome, ReconcileError> {
        let definition = definition.map(DefinitionInput::parse).transpose()?;
        let effective = resolve(identity, definition.as_ref())?;

        let desired = match (state, &definition) {
            (DesiredState::Absent, _) => None,
            (DesiredState::Present, Some(def)) => Some(def.to_document(&effective)),
            (DesiredState::Present, None) if !effective.kind.requires_definition => {
                Some(effective.minimal_document())
            }
            (DesiredState::Present, None) => {
                return Err(ReconcileError::config(format!(
                    "resource_definition is required to create or update {} resources",
                    effective.kind
                )));
            }
        };

        log::debug!(
            "Reconciling {} ({}) to {}",
            effective.target(),
            effective.api_version,
            state
        );

        let current = self
            .api
            .get(effective.target())
            .map_err(|e| ReconcileError::client(Step::Get, e))?;

        let outcome = match desired {
            None => self.ensure_absent(&effective, current)?,
            Some(desired) => self.ensure_present(&effective, current, desired)?,
        };

        log::info!(
            "{} {}{}",
            effective.target(),
            outcome.action,
            if outcome.check_mode { " (check mode)" } else { "" }
        );
        Ok(outcome)
    }

    fn ensure_absent(
        &self,
        identity: &EffectiveIdentity,
        current: Option<Value>,
    ) -> Result<Outcome, ReconcileError> {
        let Some(current) = current else {
            return Ok(self.outcome(identity, Action::Unchanged, None, None));
        };

        if self.options.check_mode {
            log::info!("Check mode: skipping delete of {}", identity.target());
        } else {
            match self.api.delete(identity.target()) {
                Ok(()) => {}
                // Removed by someone else since the existence check
                Err(e) if e.category() == ErrorCategory::NotFound => {
                    log::warn!("{} was already gone when deleting", identity.target());
                }
                Err(e) => return Err(ReconcileError::client(Step::Delete, e)),
            }
        }

        Ok(self.outcome(identity, Action::Deleted, Some(current), None))
    }

    fn ensure_present(
        &self,
        identity: &EffectiveIdentity,
        current: Option<Value>,
        desired: Value,
    ) -> Result<Outcome, ReconcileError> {
        let Some(current) = current else {
            let body = patch::strip_nulls(&desired);
            let created = if self.options.check_mode {
                log::info!("Check mode: skipping create of {}", identity.target());
                body
            } else {
                self.api
                    .create(identity.target(), &body)
                    .map_err(|e| ReconcileError::client(Step::Create, e))?
            };
            return Ok(self.outcome(identity, Action::Created, None, Some(created)));
        };

        let ops = patch::diff(&current, &desired)
            .map_err(|e| ReconcileError::client(Step::Patch, e))?;
        if patch::is_empty(&ops) {
            log::debug!("{} already matches its definition", identity.target());
            let before = Some(current.clone());
            return Ok(self.outcome(identity, Action::Unchanged, before, Some(current)));
        }
        log::debug!("{} needs {} patch operation(s)", identity.target(), ops.0.len());

        let patched = if self.options.check_mode {
            log::info!("Check mode: skipping patch of {}", identity.target());
            patch::apply(&current, &ops).map_err(|e| ReconcileError::client(Step::Patch, e))?
        } else {
            self.api
                .patch(identity.target(), &ops)
                .map_err(|e| ReconcileError::client(Step::Patch, e))?
        };

        Ok(self
            .outcome(identity, Action::Patched, Some(current), Some(patched))
            .with_patch(ops))
    }

    fn outcome(
        &self,
        identity: &EffectiveIdentity,
        action: Action,
        before: Option<Value>,
        resource: Option<Value>,
    ) -> Outcome {
        Outcome::new(identity.clone(), action, before, resource)
            .in_check_mode(self.options.check_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightctl::{KindInfo, MockApi, Operation, Target};
    use serde_json::json;

    fn reconciler(mock: &MockApi) -> Reconciler {
        Reconciler::new(Box::new(mock.clone()), ReconcileOptions::default())
    }

    fn check_mode_reconciler(mock: &MockApi) -> Reconciler {
        Reconciler::new(
            Box::new(mock.clone()),
            ReconcileOptions { check_mode: true },
        )
    }

    fn kind(name: &str) -> &'static KindInfo {
        KindInfo::lookup(name).unwrap()
    }

    fn fleet_definition() -> DefinitionInput {
        DefinitionInput::Document(json!({
            "apiVersion": "flightctl.io/v1alpha1",
            "kind": "Fleet",
            "metadata": {"name": "edge", "labels": {"env": "prod"}},
            "spec": {"selector": {"matchLabels": {"env": "prod"}}},
        }))
    }

    fn device(name: &str) -> ResourceIdentity {
        ResourceIdentity::new().kind("Device").name(name)
    }

    #[test]
    fn test_present_on_missing_creates_once() {
        let mock = MockApi::new();
        let outcome = reconciler(&mock)
            .reconcile(&ResourceIdentity::new(), Some(&fleet_definition()), DesiredState::Present)
            .unwrap();

        assert_eq!(outcome.action, Action::Created);
        assert!(outcome.changed());
        assert_eq!(mock.calls().get, 1);
        assert_eq!(mock.calls().create, 1);
        assert_eq!(mock.calls().mutations(), 1);

        let DefinitionInput::Document(expected) = fleet_definition() else {
            unreachable!()
        };
        assert_eq!(mock.created_bodies(), vec![expected]);
        assert_eq!(outcome.resource.unwrap()["metadata"]["resourceVersion"], "1");
    }

    #[test]
    fn test_present_is_idempotent() {
        let mock = MockApi::new();
        let reconciler = reconciler(&mock);

        let first = reconciler
            .reconcile(&ResourceIdentity::new(), Some(&fleet_definition()), DesiredState::Present)
            .unwrap();
        let second = reconciler
            .reconcile(&ResourceIdentity::new(), Some(&fleet_definition()), DesiredState::Present)
            .unwrap();

        assert_eq!(first.action, Action::Created);
        assert_eq!(second.action, Action::Unchanged);
        assert!(!second.changed());
        assert_eq!(first.result(), second.result());
        assert_eq!(mock.calls().mutations(), 1);
        assert_eq!(mock.calls().get, 2);
    }

    #[test]
    fn test_converged_resource_is_not_patched() {
        let mock = MockApi::new();
        mock.insert(
            Target::new(kind("Fleet"), "edge"),
            json!({
                "apiVersion": "flightctl.io/v1alpha1",
                "kind": "Fleet",
                "metadata": {
                    "name": "edge",
                    "labels": {"env": "prod", "added-by": "controller"},
                    "resourceVersion": "42",
                    "generation": 3,
                },
                "spec": {"selector": {"matchLabels": {"env": "prod"}}},
                "status": {"conditions": []},
            }),
        );

        let outcome = reconciler(&mock)
            .reconcile(&ResourceIdentity::new(), Some(&fleet_definition()), DesiredState::Present)
            .unwrap();

        assert_eq!(outcome.action, Action::Unchanged);
        assert_eq!(mock.calls().patch, 0);
        assert_eq!(mock.calls().mutations(), 0);
        assert_eq!(outcome.result()["metadata"]["resourceVersion"], "42");
    }

    #[test]
    fn test_drifted_resource_is_patched() {
        let mock = MockApi::new();
        mock.insert(
            Target::new(kind("Fleet"), "edge"),
            json!({
                "kind": "Fleet",
                "metadata": {"name": "edge", "labels": {"env": "dev"}, "resourceVersion": "5"},
                "spec": {"selector": {"matchLabels": {"env": "prod"}}},
                "status": {},
            }),
        );

        let outcome = reconciler(&mock)
            .reconcile(&ResourceIdentity::new(), Some(&fleet_definition()), DesiredState::Present)
            .unwrap();

        assert_eq!(outcome.action, Action::Patched);
        assert_eq!(mock.calls().patch, 1);
        assert_eq!(
            serde_json::to_value(&mock.sent_patches()[0]).unwrap(),
            json!([{"op": "replace", "path": "/metadata/labels/env", "value": "prod"}])
        );
        assert_eq!(outcome.before.unwrap()["metadata"]["labels"]["env"], "dev");
        assert_eq!(outcome.resource.unwrap()["metadata"]["labels"]["env"], "prod");
    }

    #[test]
    fn test_create_body_drops_null_labels() {
        let mock = MockApi::new();
        let definition = DefinitionInput::Document(json!({
            "kind": "Device",
            "metadata": {"name": "dev1", "labels": {"site": "a", "stale": null}},
        }));

        reconciler(&mock)
            .reconcile(&ResourceIdentity::new(), Some(&definition), DesiredState::Present)
            .unwrap();
        assert_eq!(mock.created_bodies()[0]["metadata"]["labels"], json!({"site": "a"}));
    }

    #[test]
    fn test_definition_with_nulls_converges() {
        let mock = MockApi::new();
        let definition = DefinitionInput::Document(json!({
            "kind": "Device",
            "metadata": {"name": "dev1", "labels": {"site": "a", "gone": null}},
            "spec": {"config": [{"name": "a", "inline": null}]},
        }));
        let reconciler = reconciler(&mock);

        let actions: Vec<Action> = (0..3)
            .map(|_| {
                reconciler
                    .reconcile(&ResourceIdentity::new(), Some(&definition), DesiredState::Present)
                    .unwrap()
                    .action
            })
            .collect();

        assert_eq!(actions, vec![Action::Created, Action::Unchanged, Action::Unchanged]);
        assert_eq!(mock.calls().mutations(), 1);
    }

    #[test]
    fn test_null_label_is_removed_once() {
        let mock = MockApi::new();
        mock.insert(
            Target::new(kind("Device"), "dev1"),
            json!({"kind": "Device", "metadata": {"name": "dev1", "labels": {"site": "a", "gone": "x"}}}),
        );
        let definition = DefinitionInput::Document(json!({
            "kind": "Device",
            "metadata": {"name": "dev1", "labels": {"gone": null}},
        }));
        let reconciler = reconciler(&mock);

        let first = reconciler
            .reconcile(&ResourceIdentity::new(), Some(&definition), DesiredState::Present)
            .unwrap();
        assert_eq!(first.action, Action::Patched);
        assert_eq!(
            serde_json::to_value(&first.patch).unwrap(),
            json!([{"op": "remove", "path": "/metadata/labels/gone"}])
        );

        let second = reconciler
            .reconcile(&ResourceIdentity::new(), Some(&definition), DesiredState::Present)
            .unwrap();
        assert_eq!(second.action, Action::Unchanged);
        assert_eq!(second.result()["metadata"]["labels"], json!({"site": "a"}));
        assert_eq!(mock.calls().mutations(), 1);
    }

    #[test]
    fn test_null_label_on_unlabelled_resource_is_noop() {
        let mock = MockApi::new();
        mock.insert(
            Target::new(kind("Device"), "dev1"),
            json!({"kind": "Device", "metadata": {"name": "dev1"}, "status": {}}),
        );
        let definition = DefinitionInput::Document(json!({
            "kind": "Device",
            "metadata": {"name": "dev1", "labels": {"gone": null}},
        }));

        let outcome = reconciler(&mock)
            .reconcile(&ResourceIdentity::new(), Some(&definition), DesiredState::Present)
            .unwrap();
        assert_eq!(outcome.action, Action::Unchanged);
        assert_eq!(mock.calls().patch, 0);
    }

    #[test]
    fn test_simple_kind_created_from_identity() {
        let mock = MockApi::new();
        let outcome = reconciler(&mock)
            .reconcile(&device("dev1"), None, DesiredState::Present)
            .unwrap();

        assert_eq!(outcome.action, Action::Created);
        assert_eq!(
            mock.created_bodies(),
            vec![json!({
                "apiVersion": "flightctl.io/v1alpha1",
                "kind": "Device",
                "metadata": {"name": "dev1"},
            })]
        );

        // Identity-only present on an existing device is a no-op
        let outcome = reconciler(&mock)
            .reconcile(&device("dev1"), None, DesiredState::Present)
            .unwrap();
        assert_eq!(outcome.action, Action::Unchanged);
        assert_eq!(mock.calls().mutations(), 1);
    }

    #[test]
    fn test_non_simple_kind_requires_definition() {
        let mock = MockApi::new();
        let identity = ResourceIdentity::new().kind("Fleet").name("edge");

        let err = reconciler(&mock)
            .reconcile(&identity, None, DesiredState::Present)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Configuration(_)));
        assert!(err.to_string().contains("resource_definition is required"));
        assert_eq!(mock.calls().total(), 0);

        // Deleting needs only the identity
        let outcome = reconciler(&mock)
            .reconcile(&identity, None, DesiredState::Absent)
            .unwrap();
        assert_eq!(outcome.action, Action::Unchanged);
    }

    #[test]
    fn test_absent_on_absent_is_noop() {
        let mock = MockApi::new();
        let outcome = reconciler(&mock)
            .reconcile(&device("dev1"), None, DesiredState::Absent)
            .unwrap();

        assert_eq!(outcome.action, Action::Unchanged);
        assert!(!outcome.changed());
        assert_eq!(outcome.result(), json!({}));
        assert_eq!(mock.calls().delete, 0);
        assert_eq!(mock.calls().get, 1);
    }

    #[test]
    fn test_absent_deletes_existing() {
        let mock = MockApi::new();
        mock.insert(Target::new(kind("Device"), "dev1"), json!({"kind": "Device"}));

        let outcome = reconciler(&mock)
            .reconcile(&device("dev1"), None, DesiredState::Absent)
            .unwrap();

        assert_eq!(outcome.action, Action::Deleted);
        assert_eq!(outcome.result(), json!({}));
        assert_eq!(outcome.before, Some(json!({"kind": "Device"})));
        assert_eq!(mock.calls().delete, 1);
        assert!(mock.stored(Target::new(kind("Device"), "dev1")).is_none());
    }

    #[test]
    fn test_delete_race_is_not_an_error() {
        let mock = MockApi::new();
        mock.insert(Target::new(kind("Device"), "dev1"), json!({"kind": "Device"}));
        mock.fail_on(Operation::Delete, 404, "not found");

        let outcome = reconciler(&mock)
            .reconcile(&device("dev1"), None, DesiredState::Absent)
            .unwrap();
        assert_eq!(outcome.action, Action::Deleted);
    }

    #[test]
    fn test_definition_kind_overrides_identity() {
        let mock = MockApi::new();
        let identity = ResourceIdentity::new().kind("Device").name("dev1");

        let outcome = reconciler(&mock)
            .reconcile(&identity, Some(&fleet_definition()), DesiredState::Present)
            .unwrap();

        assert_eq!(outcome.identity.kind.kind, "Fleet");
        assert_eq!(outcome.resource.unwrap()["kind"], "Fleet");
        assert!(mock.stored(Target::new(kind("Fleet"), "edge")).is_some());
        assert!(mock.stored(Target::new(kind("Device"), "dev1")).is_none());
    }

    #[test]
    fn test_identity_name_fills_definition() {
        let mock = MockApi::new();
        let identity = ResourceIdentity::new().name("edge");
        let definition = DefinitionInput::Text(
            "kind: Fleet\nspec:\n  selector:\n    matchLabels:\n      env: prod\n".to_string(),
        );

        let outcome = reconciler(&mock)
            .reconcile(&identity, Some(&definition), DesiredState::Present)
            .unwrap();

        assert_eq!(outcome.action, Action::Created);
        let body = &mock.created_bodies()[0];
        assert_eq!(body["metadata"]["name"], "edge");
        assert_eq!(body["apiVersion"], "flightctl.io/v1alpha1");
    }

    #[test]
    fn test_missing_kind_fails_before_network() {
        let mock = MockApi::new();
        let err = reconciler(&mock)
            .reconcile(&ResourceIdentity::new().name("x"), None, DesiredState::Present)
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Configuration(_)));
        assert_eq!(err.step(), Step::Resolve);
        assert_eq!(mock.calls().total(), 0);
    }

    #[test]
    fn test_malformed_definition_fails_before_network() {
        let mock = MockApi::new();
        let definition = DefinitionInput::Text("kind: Fleet\nmetadata: [".to_string());

        let err = reconciler(&mock)
            .reconcile(&ResourceIdentity::new(), Some(&definition), DesiredState::Present)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Configuration(_)));
        assert_eq!(mock.calls().total(), 0);
    }

    #[test]
    fn test_fleet_scoped_kind() {
        let mock = MockApi::new();
        let definition = DefinitionInput::Document(json!({
            "kind": "TemplateVersion",
            "metadata": {"name": "v1"},
            "spec": {"fleet": "edge"},
        }));

        let err = reconciler(&mock)
            .reconcile(&ResourceIdentity::new(), Some(&definition), DesiredState::Present)
            .unwrap_err();
        assert!(err.to_string().contains("fleet_name"));
        assert_eq!(mock.calls().total(), 0);

        let identity = ResourceIdentity::new().fleet_name("edge");
        reconciler(&mock)
            .reconcile(&identity, Some(&definition), DesiredState::Present)
            .unwrap();
        let scoped = Target::new(kind("TemplateVersion"), "v1").in_fleet(Some("edge"));
        assert!(mock.stored(scoped).is_some());
    }

    #[test]
    fn test_check_mode_issues_no_mutations() {
        let mock = MockApi::new();
        let reconciler = check_mode_reconciler(&mock);

        // Would create
        let outcome = reconciler
            .reconcile(&ResourceIdentity::new(), Some(&fleet_definition()), DesiredState::Present)
            .unwrap();
        assert_eq!(outcome.action, Action::Created);
        assert!(outcome.check_mode);
        assert_eq!(outcome.result()["metadata"]["name"], "edge");

        // Would patch
        mock.insert(
            Target::new(kind("Fleet"), "edge"),
            json!({"kind": "Fleet", "metadata": {"name": "edge"}, "status": {}}),
        );
        let outcome = reconciler
            .reconcile(&ResourceIdentity::new(), Some(&fleet_definition()), DesiredState::Present)
            .unwrap();
        assert_eq!(outcome.action, Action::Patched);
        assert_eq!(outcome.result()["metadata"]["labels"]["env"], "prod");
        assert!(!flightctl::patch::is_empty(&outcome.patch));

        // Would delete
        let identity = ResourceIdentity::new().kind("Fleet").name("edge");
        let outcome = reconciler
            .reconcile(&identity, None, DesiredState::Absent)
            .unwrap();
        assert_eq!(outcome.action, Action::Deleted);
        assert_eq!(outcome.result(), json!({}));

        assert_eq!(mock.calls().mutations(), 0);
        assert_eq!(mock.calls().get, 3);
        assert!(mock.stored(Target::new(kind("Fleet"), "edge")).is_some());
    }

    #[test]
    fn test_client_errors_name_the_step() {
        let mock = MockApi::new();
        mock.fail_on(Operation::Get, 401, "token expired");
        let err = reconciler(&mock)
            .reconcile(&device("dev1"), None, DesiredState::Present)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Client { step: Step::Get, .. }));
        assert!(!err.is_retryable());

        let mock = MockApi::new();
        mock.fail_on(Operation::Create, 422, "spec.os is invalid");
        let err = reconciler(&mock)
            .reconcile(&device("dev1"), None, DesiredState::Present)
            .unwrap_err();
        assert_eq!(err.step(), Step::Create);
        assert!(err.to_string().contains("spec.os is invalid"));
    }

    #[test]
    fn test_conflict_is_distinct() {
        let mock = MockApi::new();
        mock.insert(
            Target::new(kind("Fleet"), "edge"),
            json!({"kind": "Fleet", "metadata": {"name": "edge"}}),
        );
        mock.fail_on(Operation::Patch, 409, "resourceVersion mismatch");

        let err = reconciler(&mock)
            .reconcile(&ResourceIdentity::new(), Some(&fleet_definition()), DesiredState::Present)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Conflict { step: Step::Patch, .. }));
        assert!(err.is_retryable());
    }
}
