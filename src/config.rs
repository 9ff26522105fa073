//! Module arguments and connection settings
//!
//! Arguments come either from command-line flags or from an Ansible-style
//! args file. Connection settings are merged with this precedence:
//! explicit option > environment > config file > default.

use crate::cli::Cli;
use anyhow::{Context, Result, bail};
use flightctl::AuthConfig;
use reconcile::{DefinitionInput, DesiredState, ReconcileOptions, ResourceIdentity};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Keys injected by the module framework all start with this
const FRAMEWORK_PREFIX: &str = "_ansible_";

/// Framework keys this module understands
const FRAMEWORK_KEYS: &[&str] = &["_ansible_check_mode", "_ansible_diff"];

/// Get the default config file path
pub fn default_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("flightctl").join("resource.toml"))
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or_else(|_| shellexpand::tilde(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Module Arguments
// ============================================================================

/// Everything a single invocation accepts, keyed by module option name
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleParams {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub api_version: Option<String>,
    pub fleet_name: Option<String>,
    /// Mapping, or YAML/JSON text
    pub resource_definition: Option<Value>,
    pub state: Option<DesiredState>,

    pub flightctl_host: Option<String>,
    pub flightctl_token: Option<String>,
    pub flightctl_validate_certs: Option<bool>,
    pub flightctl_ca_path: Option<String>,
    pub flightctl_request_timeout: Option<u64>,
    pub flightctl_config_file: Option<String>,

    #[serde(rename = "_ansible_check_mode", default)]
    pub check_mode: bool,
    #[serde(rename = "_ansible_diff", default)]
    pub diff: bool,
}

impl ModuleParams {
    /// Load an args file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read args file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid args file {}", path.display()))
    }

    /// Parse args-file JSON, dropping framework keys this module ignores
    pub fn from_json(content: &str) -> Result<Self> {
        let mut args: Map<String, Value> =
            serde_json::from_str(content).context("Args file must be a JSON object")?;
        args.retain(|key, _| {
            !key.starts_with(FRAMEWORK_PREFIX) || FRAMEWORK_KEYS.contains(&key.as_str())
        });
        // Unset options arrive as null
        args.retain(|_, value| !value.is_null());
        serde_json::from_value(Value::Object(args)).context("Unsupported module arguments")
    }

    /// Build arguments from command-line flags
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let resource_definition = cli
            .definition
            .as_deref()
            .map(read_definition)
            .transpose()?
            .map(Value::String);

        Ok(Self {
            kind: cli.kind.clone(),
            name: cli.name.clone(),
            api_version: cli.api_version.clone(),
            fleet_name: cli.fleet_name.clone(),
            resource_definition,
            state: cli.state.map(DesiredState::from),
            check_mode: cli.check,
            diff: cli.diff,
            ..Self::default()
        }
        .with_connection_flags(cli))
    }

    /// Fill connection settings the arguments leave unset from flags or
    /// their environment variables
    pub fn with_connection_flags(mut self, cli: &Cli) -> Self {
        fill(&mut self.flightctl_host, cli.host.clone());
        fill(&mut self.flightctl_token, cli.token.clone());
        fill(&mut self.flightctl_validate_certs, cli.validate_certs);
        fill(
            &mut self.flightctl_ca_path,
            cli.ca_path.as_ref().map(|p| p.display().to_string()),
        );
        fill(&mut self.flightctl_request_timeout, cli.request_timeout);
        fill(
            &mut self.flightctl_config_file,
            cli.config_file.as_ref().map(|p| p.display().to_string()),
        );
        self.check_mode |= cli.check;
        self.diff |= cli.diff;
        self
    }

    /// Resolve into everything needed to run the reconciler
    pub fn into_invocation(self) -> Result<Invocation> {
        let file = match &self.flightctl_config_file {
            Some(path) => FileConfig::load(&expand_path(path))?,
            None => match default_config_file().filter(|p| p.is_file()) {
                Some(path) => FileConfig::load(&path)?,
                None => FileConfig::default(),
            },
        };
        let auth = self.auth_config(file)?;

        let mut identity = ResourceIdentity::new();
        identity.kind = self.kind;
        identity.name = self.name;
        identity.fleet_name = self.fleet_name;
        if let Some(api_version) = self.api_version {
            identity.api_version = api_version;
        }

        Ok(Invocation {
            identity,
            definition: self.resource_definition.map(DefinitionInput::Document),
            state: self.state.unwrap_or_default(),
            auth,
            options: ReconcileOptions {
                check_mode: self.check_mode,
            },
            diff: self.diff,
        })
    }

    fn auth_config(&self, file: FileConfig) -> Result<AuthConfig> {
        let Some(host) = self.flightctl_host.clone().or(file.host) else {
            bail!(
                "flightctl_host is required: set flightctl_host, FLIGHTCTL_HOST or host in the config file"
            );
        };

        let mut auth = AuthConfig::new(host);
        if let Some(token) = self.flightctl_token.clone().or(file.token) {
            auth = auth.token(token);
        }
        if let Some(validate) = self.flightctl_validate_certs.or(file.validate_certs) {
            auth = auth.validate_certs(validate);
        }
        if let Some(ca_path) = self.flightctl_ca_path.as_ref().or(file.ca_path.as_ref()) {
            auth = auth.ca_path(expand_path(ca_path));
        }
        if let Some(secs) = self.flightctl_request_timeout.or(file.request_timeout) {
            if secs == 0 {
                bail!("flightctl_request_timeout must be at least 1 second");
            }
            auth = auth.request_timeout(Duration::from_secs(secs));
        }
        Ok(auth)
    }
}

fn fill<T>(slot: &mut Option<T>, fallback: Option<T>) {
    if slot.is_none() {
        *slot = fallback;
    }
}

/// Read a `--definition` value: `-` is stdin, an existing file is read,
/// anything that looks like a document is taken as inline YAML or JSON
fn read_definition(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Could not read definition from stdin")?;
        return Ok(text);
    }

    let path = expand_path(source);
    if path.is_file() {
        return fs::read_to_string(&path)
            .with_context(|| format!("Could not read definition {}", path.display()));
    }
    // A single line with no mapping syntax can only be a path
    if !source.contains(['\n', ':', '{']) {
        bail!("definition file not found: {}", path.display());
    }
    Ok(source.to_string())
}

// ============================================================================
// Config File
// ============================================================================

/// Connection defaults from a TOML file
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub token: Option<String>,
    pub validate_certs: Option<bool>,
    pub ca_path: Option<String>,
    pub request_timeout: Option<u64>,
}

impl FileConfig {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// A fully resolved invocation
#[derive(Debug)]
pub struct Invocation {
    pub identity: ResourceIdentity,
    pub definition: Option<DefinitionInput>,
    pub state: DesiredState,
    pub auth: AuthConfig,
    pub options: ReconcileOptions,
    pub diff: bool,
}

// ============================================================================
// Tests
// ============================================================================
