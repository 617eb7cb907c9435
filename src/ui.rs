//! Human-facing output. Logging goes through `log`; this is what the
//! operator reads.

use colored::{ColoredString, Colorize};

use stagekit::StageStatus;

pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Warnings go to stderr so they survive `stackup deploy > log`
pub fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Bold title with an underline sized to it
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// `[2/6] apply-network` style stage header
pub fn step(position: usize, total: usize, msg: &str) {
    println!(
        "{} {}",
        format!("[{position}/{total}]").blue().bold(),
        msg
    );
}

/// Single-glyph marker for a stage status
pub fn status_marker(status: StageStatus) -> ColoredString {
    match status {
        StageStatus::Succeeded => "✓".green(),
        StageStatus::Failed => "✗".red(),
        StageStatus::Skipped => "↷".yellow(),
        StageStatus::Running => "…".cyan(),
        StageStatus::Pending => "·".dimmed(),
    }
}

/// Format a duration in seconds as `1h 2m 3s`, dropping leading zero units
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
