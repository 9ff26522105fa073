mod cli;
mod config;
mod output;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, OutputFormat};
use config::{Invocation, ModuleParams};
use flightctl::HttpApi;
use output::{ModuleFailure, ModuleResult};
use reconcile::{Outcome, ReconcileError, Reconciler};
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "flightctl-resource", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    // Initialize logging based on verbosity; stdout is reserved for the result
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();

    let format = cli.format;
    let (with_diff, result) = match load(&cli) {
        Ok(invocation) => (invocation.diff, run(invocation)),
        Err(e) => (false, Err(e)),
    };

    match (result, format) {
        (Ok(outcome), OutputFormat::Json) => {
            print_json(&ModuleResult::from_outcome(&outcome, with_diff));
            ExitCode::SUCCESS
        }
        (Ok(outcome), OutputFormat::Text) => {
            ui::print_outcome(&outcome, with_diff);
            ExitCode::SUCCESS
        }
        (Err(e), format) => {
            let failure = ModuleFailure::new(failure_message(&e));
            match format {
                OutputFormat::Json => print_json(&failure),
                OutputFormat::Text => {
                    ui::error(&failure.msg);
                    if let Some(category) = e
                        .downcast_ref::<ReconcileError>()
                        .and_then(ReconcileError::category)
                    {
                        ui::dim(category.advice());
                    }
                }
            }
            ExitCode::FAILURE
        }
    }
}

/// Gather module arguments from the args file or flags
fn load(cli: &Cli) -> Result<Invocation> {
    let params = match &cli.args_file {
        Some(path) => ModuleParams::load(path)?.with_connection_flags(cli),
        None => ModuleParams::from_cli(cli)?,
    };
    params.into_invocation()
}

fn run(invocation: Invocation) -> Result<Outcome> {
    let api = HttpApi::new(&invocation.auth).map_err(|e| {
        ReconcileError::config(format!("could not set up the API client: {}", e))
    })?;

    let reconciler = Reconciler::new(Box::new(api), invocation.options);
    let outcome = reconciler.reconcile(
        &invocation.identity,
        invocation.definition.as_ref(),
        invocation.state,
    )?;
    Ok(outcome)
}

/// `<step>: <message>`; anything that is not a reconcile error failed while
/// resolving the inputs
fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ReconcileError>() {
        Some(reconcile_err) => reconcile_err.to_string(),
        None => format!("resolve: {:#}", err),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => println!(
            "{}",
            serde_json::json!({
                "failed": true,
                "changed": false,
                "msg": format!("Failed to serialize module result: {}", e),
            })
        ),
    }
}
