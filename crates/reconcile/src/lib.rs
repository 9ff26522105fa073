//! # reconcile
//!
//! Desired-state reconciliation for Flight Control resources.
//!
//! Given a resource identity, an optional definition and a desired state,
//! [`Reconciler`] decides on exactly one action (create, patch, delete or
//! nothing) and carries it out through a [`flightctl::ResourceApi`].
//!
//! ## Example
//!
//! ```
//! use flightctl::MockApi;
//! use reconcile::{Action, DesiredState, ReconcileOptions, Reconciler, ResourceIdentity};
//!
//! let reconciler = Reconciler::new(Box::new(MockApi::new()), ReconcileOptions::default());
//! let identity = ResourceIdentity::new().kind("Device").name("dev1");
//!
//! let outcome = reconciler.reconcile(&identity, None, DesiredState::Present)?;
//! assert_eq!(outcome.action, Action::Created);
//!
//! let outcome = reconciler.reconcile(&identity, None, DesiredState::Present)?;
//! assert_eq!(outcome.action, Action::Unchanged);
//! # Ok::<(), reconcile::ReconcileError>(())
//! ```

pub mod error;
pub mod identity;
pub mod reconciler;
pub mod types;

pub use error::{ReconcileError, Step};
pub use identity::{
    DefinitionInput, EffectiveIdentity, Metadata, ResourceDefinition, ResourceIdentity, resolve,
};
pub use reconciler::Reconciler;
pub use types::{Action, DesiredState, Outcome, ReconcileOptions};
