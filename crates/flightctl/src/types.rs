//! Core types for addressing Flight Control resources.
//!
//! The kind table is the single place that knows how each resource kind maps
//! onto the REST API and which kinds can be created from an identity alone.

use std::fmt;

/// API version used when neither the caller nor a definition names one.
pub const DEFAULT_API_VERSION: &str = "flightctl.io/v1alpha1";

/// API group every Flight Control `apiVersion` belongs to.
pub const API_GROUP: &str = "flightctl.io";

/// Static description of a resource kind.
///
/// # Example
///
/// ```
/// use flightctl::KindInfo;
///
/// let device = KindInfo::lookup("device").unwrap();
/// assert_eq!(device.kind, "Device");
/// assert!(!device.requires_definition);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindInfo {
    /// Canonical kind name as it appears in documents.
    pub kind: &'static str,
    /// Collection segment in API paths.
    pub plural: &'static str,
    /// Whether `present` needs a full resource definition.
    pub requires_definition: bool,
    /// Whether the resource lives under `/fleets/{fleet}`.
    pub fleet_scoped: bool,
}

/// Every kind this client knows how to manage.
pub const KINDS: &[KindInfo] = &[
    KindInfo {
        kind: "Device",
        plural: "devices",
        requires_definition: false,
        fleet_scoped: false,
    },
    KindInfo {
        kind: "Fleet",
        plural: "fleets",
        requires_definition: true,
        fleet_scoped: false,
    },
    KindInfo {
        kind: "Repository",
        plural: "repositories",
        requires_definition: true,
        fleet_scoped: false,
    },
    KindInfo {
        kind: "ResourceSync",
        plural: "resourcesyncs",
        requires_definition: true,
        fleet_scoped: false,
    },
    KindInfo {
        kind: "EnrollmentRequest",
        plural: "enrollmentrequests",
        requires_definition: true,
        fleet_scoped: false,
    },
    KindInfo {
        kind: "CertificateSigningRequest",
        plural: "certificatesigningrequests",
        requires_definition: true,
        fleet_scoped: false,
    },
    KindInfo {
        kind: "TemplateVersion",
        plural: "templateversions",
        requires_definition: true,
        fleet_scoped: true,
    },
];

impl KindInfo {
    /// Look up a kind by name, ignoring ASCII case.
    #[must_use]
    pub fn lookup(kind: &str) -> Option<&'static KindInfo> {
        let kind = kind.trim();
        KINDS.iter().find(|k| k.kind.eq_ignore_ascii_case(kind))
    }

    /// Names of all known kinds, for error messages.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        KINDS.iter().map(|k| k.kind).collect()
    }
}

impl fmt::Display for KindInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// Address of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    /// Resource kind.
    pub kind: &'static KindInfo,
    /// Resource name (`metadata.name`).
    pub name: &'a str,
    /// Owning fleet, for fleet-scoped kinds.
    pub fleet: Option<&'a str>,
}

impl<'a> Target<'a> {
    /// Create a target without fleet scoping.
    #[must_use]
    pub fn new(kind: &'static KindInfo, name: &'a str) -> Self {
        Self {
            kind,
            name,
            fleet: None,
        }
    }

    /// Scope the target to a fleet.
    #[must_use]
    pub fn in_fleet(mut self, fleet: Option<&'a str>) -> Self {
        self.fleet = fleet;
        self
    }
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fleet {
            Some(fleet) if self.kind.fleet_scoped => {
                write!(f, "{}/{}/{}", self.kind.kind, fleet, self.name)
            }
            _ => write!(f, "{}/{}", self.kind.kind, self.name),
        }
    }
}
