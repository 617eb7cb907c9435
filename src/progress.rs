//! Progress indicators for long-running stages.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Start a spinner with a message, ticking on its own
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Remove the spinner line
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

/// Replace the spinner with a success line
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("  {} {}", "✓".green(), msg);
}

/// Replace the spinner with a warning line
pub fn finish_warn(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("  {} {}", "⚠".yellow(), msg);
}

/// Replace the spinner with an error line
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    eprintln!("  {} {}", "✗".red(), msg);
}
