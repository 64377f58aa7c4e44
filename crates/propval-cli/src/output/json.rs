use colored::Colorize;
use serde_json::Value;

/// Pretty-print the result envelope as JSON to stdout.
pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("{}: JSON serialization failed: {e}", "error".red().bold()),
    }
}
