use clap::{Parser, ValueEnum};
use clap_complete::Shell;
use reconcile::DesiredState;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flightctl-resource")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Create, update or delete a Flight Control resource to match a definition",
    long_about = None
)]
pub struct Cli {
    /// JSON file with module arguments (Ansible binary-module style)
    #[arg(long, value_name = "PATH")]
    pub args_file: Option<PathBuf>,

    /// Resource kind, e.g. Device or Fleet
    #[arg(long, conflicts_with = "args_file")]
    pub kind: Option<String>,

    /// Resource name (metadata.name)
    #[arg(long, conflicts_with = "args_file")]
    pub name: Option<String>,

    /// API version of the resource
    #[arg(long, value_name = "VERSION", conflicts_with = "args_file")]
    pub api_version: Option<String>,

    /// Owning fleet, for fleet-scoped kinds such as TemplateVersion
    #[arg(long, value_name = "FLEET", conflicts_with = "args_file")]
    pub fleet_name: Option<String>,

    /// Resource definition: a file path, `-` for stdin, or inline YAML/JSON
    #[arg(short, long, value_name = "DEFINITION", conflicts_with = "args_file")]
    pub definition: Option<String>,

    /// Desired state of the resource
    #[arg(long, value_enum, conflicts_with = "args_file")]
    pub state: Option<StateArg>,

    /// Flight Control API endpoint
    #[arg(long, env = "FLIGHTCTL_HOST", value_name = "URL")]
    pub host: Option<String>,

    /// Bearer token for the API
    #[arg(long, env = "FLIGHTCTL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Verify the server TLS certificate
    #[arg(
        long,
        env = "FLIGHTCTL_VALIDATE_CERTS",
        value_name = "BOOL",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub validate_certs: Option<bool>,

    /// CA certificate (PEM) used to verify the server
    #[arg(long, env = "FLIGHTCTL_CA_PATH", value_name = "PATH")]
    pub ca_path: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// TOML file with default connection settings
    #[arg(long, env = "FLIGHTCTL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Report what would change without changing anything
    #[arg(long)]
    pub check: bool,

    /// Include the resource before and after in the output
    #[arg(long)]
    pub diff: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Verbosity level (logs go to stderr)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Print shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    Present,
    Absent,
}

impl From<StateArg> for DesiredState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Present => Self::Present,
            StateArg::Absent => Self::Absent,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object, as module frameworks expect
    Json,
    /// Colored summary for interactive use
    Text,
}
