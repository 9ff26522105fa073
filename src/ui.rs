use colored::Colorize;
use reconcile::{Action, Outcome};
use serde_json::Value;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Outcome Rendering
// ============================================================================

/// One-line summary of an outcome, e.g. "Fleet/edge patched (check mode)"
pub fn summary(outcome: &Outcome) -> String {
    let verb = match (outcome.action, outcome.check_mode) {
        (Action::Unchanged, _) => "unchanged".to_string(),
        (action, true) => format!("would be {}", action),
        (action, false) => action.to_string(),
    };
    format!("{} {}", outcome.identity.target(), verb)
}

/// Print a human-readable report of an outcome
pub fn print_outcome(outcome: &Outcome, with_diff: bool) {
    let line = summary(outcome);
    match outcome.action {
        Action::Unchanged => info(&line),
        _ if outcome.check_mode => warn(&line),
        _ => success(&line),
    }

    kv("api version", &outcome.identity.api_version);
    if let Some(version) = outcome
        .resource
        .as_ref()
        .and_then(|r| r["metadata"]["resourceVersion"].as_str())
    {
        kv("resource version", version);
    }

    if with_diff {
        for line in patch_lines(outcome) {
            dim(&line);
        }
    }
}

/// One line per patch operation in the outcome
fn patch_lines(outcome: &Outcome) -> Vec<String> {
    match serde_json::to_value(&outcome.patch) {
        Ok(Value::Array(ops)) => ops.iter().map(describe_op).collect(),
        _ => Vec::new(),
    }
}

fn describe_op(op: &Value) -> String {
    let name = op["op"].as_str().unwrap_or("?");
    let path = op["path"].as_str().unwrap_or("");
    match op.get("value") {
        Some(value) => format!("{} {} = {}", name, path, value),
        None => format!("{} {}", name, path),
    }
}
