//! # flightctl
//!
//! Blocking client for the Flight Control REST API.
//!
//! This crate provides:
//! - [`ResourceApi`]: the `get`/`create`/`patch`/`delete` operations a
//!   reconciler needs, keyed by kind, name and (for scoped kinds) fleet
//! - [`HttpApi`]: the REST implementation, built on `ureq`
//! - [`MockApi`]: an in-memory implementation that counts calls
//! - [`patch`]: JSON Patch computation that only touches declared fields
//! - [`KindInfo`]: the table of manageable resource kinds
//!
//! ## Example
//!
//! ```no_run
//! use flightctl::{AuthConfig, HttpApi, KindInfo, ResourceApi, Target};
//! use serde_json::json;
//!
//! let api = HttpApi::new(&AuthConfig::new("https://api.flightctl.example.com").token("t"))?;
//! let device = KindInfo::lookup("Device").unwrap();
//! let target = Target::new(device, "dev1");
//!
//! if api.get(target)?.is_none() {
//!     api.create(target, &json!({
//!         "apiVersion": "flightctl.io/v1alpha1",
//!         "kind": "Device",
//!         "metadata": {"name": "dev1"},
//!     }))?;
//! }
//! # Ok::<(), flightctl::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod patch;
pub mod types;

pub use backend::http::HttpApi;
pub use backend::{CallCounts, MockApi, Operation, ResourceApi};
pub use config::AuthConfig;
pub use error::{Error, ErrorCategory, Result};
pub use json_patch::Patch;
pub use types::{API_GROUP, DEFAULT_API_VERSION, KINDS, KindInfo, Target};
