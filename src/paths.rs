//! Path resolution for stackup
//!
//! # Environment Variables
//!
//! - `STACKUP_SETTINGS` - Settings file to use instead of `./stackup.toml`
//!   (read by clap through `--settings`)
//! - `STACKUP_STATE_DIR` - Override the state directory
//!
//! State (the generated inventory and the last run report) lives next to the
//! settings file in `.stackup/` unless overridden.

use std::path::{Path, PathBuf};

/// Environment variable for the settings file
pub const ENV_SETTINGS: &str = "STACKUP_SETTINGS";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "STACKUP_STATE_DIR";

/// Settings file looked up in the current directory
pub const DEFAULT_SETTINGS_FILE: &str = "stackup.toml";

const STATE_DIR_NAME: &str = ".stackup";

/// Settings file path: explicit flag/env value, else `./stackup.toml`
pub fn settings_file(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => expand(&path.to_string_lossy()),
        None => PathBuf::from(DEFAULT_SETTINGS_FILE),
    }
}

/// Directory a settings file's relative paths resolve against
pub fn project_dir(settings_file: &Path) -> PathBuf {
    match settings_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// State directory for a project rooted at `project_dir`
///
/// Priority:
/// 1. `STACKUP_STATE_DIR` env var
/// 2. `<project_dir>/.stackup`
pub fn state_dir(project_dir: &Path) -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return path;
    }
    project_dir.join(STATE_DIR_NAME)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Expand `raw` and anchor it at `base` when it is relative
pub fn resolve(base: &Path, raw: &str) -> PathBuf {
    let path = expand(raw);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
