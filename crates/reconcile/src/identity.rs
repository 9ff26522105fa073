//! Resource identity and definition parsing
//!
//! A resource can be addressed two ways: by standalone identity options
//! (`kind`, `name`, `api_version`, `fleet_name`) or by a full definition
//! document. When both are given the definition wins, field by field.

use crate::error::ReconcileError;
use flightctl::{API_GROUP, DEFAULT_API_VERSION, KindInfo, Target};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Standalone identity options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub api_version: String,
    pub fleet_name: Option<String>,
}

impl Default for ResourceIdentity {
    fn default() -> Self {
        Self {
            kind: None,
            name: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            fleet_name: None,
        }
    }
}

impl ResourceIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn fleet_name(mut self, fleet: impl Into<String>) -> Self {
        self.fleet_name = Some(fleet.into());
        self
    }
}

/// A definition as the caller supplied it
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionInput {
    /// Already-structured mapping
    Document(Value),
    /// Serialized YAML or JSON text
    Text(String),
}

impl DefinitionInput {
    /// Parse into a typed definition, failing fast on shape mismatches
    pub fn parse(&self) -> Result<ResourceDefinition, ReconcileError> {
        let value = match self {
            Self::Document(Value::String(text)) | Self::Text(text) => parse_text(text)?,
            Self::Document(value) => value.clone(),
        };
        ResourceDefinition::from_value(value)
    }
}

fn parse_text(text: &str) -> Result<Value, ReconcileError> {
    if text.trim().is_empty() {
        return Err(ReconcileError::config("resource_definition is empty"));
    }
    // YAML is a superset of JSON, so one parser covers both
    serde_yaml::from_str(text)
        .map_err(|e| ReconcileError::config(format!("resource_definition is not valid YAML: {}", e)))
}

/// `metadata` of a definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Label values; `None` (null) asks for the label to be removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, Option<String>>>,
    /// Annotations, owner and anything else, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A full resource document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl ResourceDefinition {
    /// Convert a loosely-typed mapping
    pub fn from_value(value: Value) -> Result<Self, ReconcileError> {
        if !value.is_object() {
            return Err(ReconcileError::config(format!(
                "resource_definition must be a mapping, got {}",
                value_type(&value)
            )));
        }
        serde_json::from_value(value)
            .map_err(|e| ReconcileError::config(format!("invalid resource_definition: {}", e)))
    }

    /// Full request body with the effective identity filled in
    pub fn to_document(&self, identity: &EffectiveIdentity) -> Value {
        let mut doc = self.clone();
        doc.api_version = Some(identity.api_version.clone());
        doc.kind = Some(identity.kind.kind.to_string());
        doc.metadata.name = Some(identity.name.clone());
        // Serializing plain data into a Value cannot fail
        serde_json::to_value(doc).unwrap_or_else(|_| identity.minimal_document())
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Identity after the override rule has been applied and validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveIdentity {
    pub kind: &'static KindInfo,
    pub name: String,
    pub api_version: String,
    pub fleet_name: Option<String>,
}

impl EffectiveIdentity {
    /// Address for API calls
    pub fn target(&self) -> Target<'_> {
        Target::new(self.kind, &self.name).in_fleet(self.fleet_name.as_deref())
    }

    /// Body used to create a simple kind from identity alone
    pub fn minimal_document(&self) -> Value {
        json!({
            "apiVersion": self.api_version,
            "kind": self.kind.kind,
            "metadata": {"name": self.name},
        })
    }
}

/// Apply the override rule and validate the result
///
/// `apiVersion`, `kind` and `metadata.name` from the definition take
/// precedence over the identity options.
pub fn resolve(
    identity: &ResourceIdentity,
    definition: Option<&ResourceDefinition>,
) -> Result<EffectiveIdentity, ReconcileError> {
    let from_definition = |field: fn(&ResourceDefinition) -> Option<&String>| {
        definition.and_then(field).filter(|v| !v.trim().is_empty())
    };

    let kind_name = from_definition(|d| d.kind.as_ref())
        .or(identity.kind.as_ref().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            ReconcileError::config("kind is required: set kind or resource_definition.kind")
        })?;

    if let (Some(def_kind), Some(opt_kind)) = (from_definition(|d| d.kind.as_ref()), &identity.kind)
        && !def_kind.eq_ignore_ascii_case(opt_kind)
    {
        log::debug!(
            "resource_definition kind '{}' overrides kind '{}'",
            def_kind,
            opt_kind
        );
    }

    let kind = KindInfo::lookup(kind_name).ok_or_else(|| {
        ReconcileError::config(format!(
            "unsupported kind '{}': expected one of {}",
            kind_name,
            KindInfo::names().join(", ")
        ))
    })?;

    let api_version = from_definition(|d| d.api_version.as_ref())
        .unwrap_or(&identity.api_version)
        .trim()
        .to_string();
    validate_api_version(&api_version)?;

    let name = from_definition(|d| d.metadata.name.as_ref())
        .or(identity.name.as_ref().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            ReconcileError::config(format!(
                "name is required for {}: set name or resource_definition.metadata.name",
                kind
            ))
        })?
        .trim()
        .to_string();

    let fleet_name = identity
        .fleet_name
        .as_ref()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    if kind.fleet_scoped && fleet_name.is_none() {
        return Err(ReconcileError::config(format!(
            "fleet_name is required for {} resources",
            kind
        )));
    }
    if !kind.fleet_scoped && fleet_name.is_some() {
        log::warn!("fleet_name is ignored for {} resources", kind);
    }

    Ok(EffectiveIdentity {
        kind,
        name,
        api_version,
        fleet_name,
    })
}

fn validate_api_version(api_version: &str) -> Result<(), ReconcileError> {
    match api_version.split_once('/') {
        Some((group, version)) if group == API_GROUP && !version.is_empty() => Ok(()),
        _ => Err(ReconcileError::config(format!(
            "invalid api_version '{}': expected {}/<version>",
            api_version, API_GROUP
        ))),
    }
}
