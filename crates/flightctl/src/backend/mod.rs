//! Resource API trait and implementations.
//!
//! [`ResourceApi`] is the seam between the reconciler and the Flight Control
//! service. [`http::HttpApi`] talks to a real server; [`MockApi`] keeps
//! resources in memory and counts calls, for tests.
//!
//! # Testing
//!
//! ```
//! use flightctl::backend::{MockApi, ResourceApi};
//! use flightctl::{KindInfo, Target};
//! use serde_json::json;
//!
//! let mock = MockApi::new();
//! let device = KindInfo::lookup("Device").unwrap();
//!
//! let body = json!({"kind": "Device", "metadata": {"name": "d1"}});
//! mock.create(Target::new(device, "d1"), &body).unwrap();
//! assert!(mock.get(Target::new(device, "d1")).unwrap().is_some());
//! assert_eq!(mock.calls().create, 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::patch;
use crate::types::Target;
use json_patch::Patch;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Operations the reconciler needs from the Flight Control API.
pub trait ResourceApi: Send + Sync {
    /// Fetch a resource. Returns `None` when it does not exist.
    fn get(&self, target: Target<'_>) -> Result<Option<Value>>;

    /// Create a resource from a full document.
    fn create(&self, target: Target<'_>, body: &Value) -> Result<Value>;

    /// Apply a JSON Patch to an existing resource.
    fn patch(&self, target: Target<'_>, patch: &Patch) -> Result<Value>;

    /// Delete a resource.
    fn delete(&self, target: Target<'_>) -> Result<()>;
}

/// API operation, used to inject failures into [`MockApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Create,
    Patch,
    Delete,
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub create: usize,
    pub patch: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Calls that change server state.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.create + self.patch + self.delete
    }

    /// All calls.
    #[must_use]
    pub fn total(&self) -> usize {
        self.get + self.mutations()
    }
}

type StoreKey = (&'static str, Option<String>, String);

#[derive(Debug, Default)]
struct MockState {
    resources: HashMap<StoreKey, Value>,
    calls: CallCounts,
    created: Vec<Value>,
    patches: Vec<Patch>,
    failures: HashMap<Operation, (u16, String)>,
    next_version: u64,
}

/// In-memory API for tests.
///
/// Behaves like the server for the parts the reconciler relies on: `create`
/// stamps `metadata.resourceVersion` and an empty `status`, `patch` applies
/// the JSON Patch, and missing resources produce 404s. Clones share state,
/// so a test can keep a handle while the reconciler owns another.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource without counting a call.
    pub fn insert(&self, target: Target<'_>, resource: Value) {
        let mut state = self.state.lock().unwrap();
        state.resources.insert(key(target), resource);
    }

    /// Current stored copy of a resource, without counting a call.
    #[must_use]
    pub fn stored(&self, target: Target<'_>) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.resources.get(&key(target)).cloned()
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    /// Bodies passed to `create`, in order.
    #[must_use]
    pub fn created_bodies(&self) -> Vec<Value> {
        self.state.lock().unwrap().created.clone()
    }

    /// Patches passed to `patch`, in order.
    #[must_use]
    pub fn sent_patches(&self) -> Vec<Patch> {
        self.state.lock().unwrap().patches.clone()
    }

    /// Make every call of `operation` fail with an HTTP status.
    pub fn fail_on(&self, operation: Operation, status: u16, message: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.failures.insert(operation, (status, message.into()));
    }

    fn check_failure(state: &MockState, operation: Operation) -> Result<()> {
        match state.failures.get(&operation) {
            Some((status, message)) => Err(Error::status(*status, message.clone())),
            None => Ok(()),
        }
    }
}

impl ResourceApi for MockApi {
    fn get(&self, target: Target<'_>) -> Result<Option<Value>> {
        let mut state = self.state.lock().unwrap();
        state.calls.get += 1;
        Self::check_failure(&state, Operation::Get)?;
        Ok(state.resources.get(&key(target)).cloned())
    }

    fn create(&self, target: Target<'_>, body: &Value) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.create += 1;
        Self::check_failure(&state, Operation::Create)?;
        state.created.push(body.clone());

        let key = key(target);
        if state.resources.contains_key(&key) {
            return Err(Error::status(409, format!("{} already exists", target)));
        }

        state.next_version += 1;
        let mut stored = body.clone();
        stored["metadata"]["resourceVersion"] = json!(state.next_version.to_string());
        if stored.get("status").is_none() {
            stored["status"] = json!({});
        }
        state.resources.insert(key, stored.clone());
        Ok(stored)
    }

    fn patch(&self, target: Target<'_>, patch: &Patch) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.patch += 1;
        Self::check_failure(&state, Operation::Patch)?;
        state.patches.push(patch.clone());

        let key = key(target);
        let current = state.resources.get(&key).ok_or_else(|| Error::NotFound {
            kind: target.kind.kind.to_string(),
            name: target.name.to_string(),
        })?;

        let mut patched =
            patch::apply(current, patch).map_err(|e| Error::status(422, e.to_string()))?;
        state.next_version += 1;
        patched["metadata"]["resourceVersion"] = json!(state.next_version.to_string());
        state.resources.insert(key, patched.clone());
        Ok(patched)
    }

    fn delete(&self, target: Target<'_>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.delete += 1;
        Self::check_failure(&state, Operation::Delete)?;

        match state.resources.remove(&key(target)) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                kind: target.kind.kind.to_string(),
                name: target.name.to_string(),
            }),
        }
    }
}

fn key(target: Target<'_>) -> StoreKey {
    let fleet = if target.kind.fleet_scoped {
        target.fleet.map(str::to_string)
    } else {
        None
    };
    (target.kind.kind, fleet, target.name.to_string())
}
