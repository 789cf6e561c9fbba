//! Colored status output
//!
//! Uses owo-colors for terminal colors; progress bars live in `progress`.

use owo_colors::OwoColorize;

/// Print an action header (blue, bold)
/// Example: "==> Fetching 'model.bin'"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print a detail line (dimmed)
/// Example: "     downloading to /models/checkpoints/model.bin"
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print a skip message (dimmed)
/// Example: "==> file exists, skipping download"
pub fn skip(message: &str) {
    println!("{} {}", "==>".dimmed(), message.dimmed());
}
