//! Pre-flight checks run before any stage or engine call

use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::controller::Request;
use crate::settings::{LoadedSettings, ProbeMethod};
use crate::{paths, ui};

/// A problem that blocks a run, with a way out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub category: &'static str,
    pub summary: String,
    pub detail: Option<String>,
    pub fix: Option<String>,
    pub fix_cmd: Option<String>,
}

impl Issue {
    fn new(category: &'static str, summary: impl Into<String>) -> Self {
        Self {
            category,
            summary: summary.into(),
            detail: None,
            fix: None,
            fix_cmd: None,
        }
    }

    fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    fn fix_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.fix_cmd = Some(cmd.into());
        self
    }
}

/// Where the settings came from, or why they could not be loaded
pub enum SettingsState {
    Loaded(LoadedSettings),
    Missing(PathBuf),
    Invalid { path: PathBuf, error: String },
}

impl SettingsState {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::Missing(path.to_path_buf());
        }
        match LoadedSettings::from_file(path) {
            Ok(loaded) => Self::Loaded(loaded),
            Err(e) => Self::Invalid {
                path: path.to_path_buf(),
                error: format!("{e:#}"),
            },
        }
    }
}

/// Host lookups, swappable in tests
#[derive(Clone, Copy)]
pub struct Host {
    pub has_tool: fn(&Path) -> bool,
    pub env: fn(&str) -> Option<String>,
}

impl Host {
    pub fn system() -> Self {
        Self {
            has_tool: |binary| enginekit::locate(binary).is_some(),
            env: |key| std::env::var(key).ok(),
        }
    }
}

/// Evaluate every pre-flight check for `request`.
///
/// Configuration tools and files are only required when the request will
/// reach the configuration stage, so `redeploy --skip-deploy` needs neither.
pub fn check(request: &Request, state: &SettingsState, host: Host) -> Vec<Issue> {
    let mode = request.mode;
    let configures = mode.configures_target() && !request.skip_deploy;
    let mut issues = Vec::new();

    let loaded = match state {
        SettingsState::Loaded(loaded) => loaded,
        SettingsState::Missing(path) => {
            if mode.is_mutating() {
                issues.push(
                    Issue::new("settings", format!("Settings file not found: {}", path.display()))
                        .detail(format!("{mode} changes remote state and needs project settings"))
                        .fix(format!(
                            "Create {} or point --settings / {} at one",
                            paths::DEFAULT_SETTINGS_FILE,
                            paths::ENV_SETTINGS
                        )),
                );
            } else {
                // plan-only runs fall back to defaults, which still need the engine
                let defaults = LoadedSettings::defaults(paths::project_dir(path));
                check_tools(configures, &defaults, host, &mut issues);
            }
            return issues;
        }
        SettingsState::Invalid { path, error } => {
            issues.push(
                Issue::new("settings", format!("Invalid settings in {}", path.display()))
                    .detail(error.clone())
                    .fix("Correct the settings file and re-run"),
            );
            return issues;
        }
    };

    check_tools(configures, loaded, host, &mut issues);
    check_credentials(loaded, host, &mut issues);
    check_files(configures, loaded, &mut issues);
    issues
}

fn check_tools(configures: bool, loaded: &LoadedSettings, host: Host, issues: &mut Vec<Issue>) {
    let settings = &loaded.settings;
    let mut tools = vec![(
        settings.infrastructure.binary.as_str(),
        "infrastructure engine",
        "https://developer.hashicorp.com/terraform/install",
    )];
    if configures {
        tools.push((
            settings.configuration.binary.as_str(),
            "configuration engine",
            "pipx install ansible-core",
        ));
        if settings.readiness.method == ProbeMethod::Ssh {
            tools.push(("ssh", "readiness probe", "install an OpenSSH client"));
        }
    }

    for (raw, role, install) in tools {
        let binary = loaded.binary(raw);
        if !(host.has_tool)(&binary) {
            issues.push(
                Issue::new("tools", format!("{} not found", binary.display()))
                    .detail(format!("Needed as the {role}"))
                    .fix(format!("Install it: {install}")),
            );
        }
    }
}

fn check_credentials(loaded: &LoadedSettings, host: Host, issues: &mut Vec<Issue>) {
    let creds = &loaded.settings.credentials;
    if !creds.is_configured() {
        log::warn!("[credentials] lists no sources; engine credentials are not verified");
        return;
    }

    let from_env = creds
        .env
        .iter()
        .any(|key| (host.env)(key).is_some_and(|v| !v.trim().is_empty()));
    let from_file = creds
        .files
        .iter()
        .any(|raw| loaded.resolve(raw).is_file());

    if !from_env && !from_file {
        let mut sources: Vec<String> = creds.env.iter().map(|k| format!("${k}")).collect();
        sources.extend(creds.files.iter().cloned());
        issues.push(
            Issue::new("credentials", "No engine credentials could be resolved")
                .detail(format!("Looked for: {}", sources.join(", ")))
                .fix("Export one of the variables or create one of the files, then re-run"),
        );
    }
}

fn check_files(configures: bool, loaded: &LoadedSettings, issues: &mut Vec<Issue>) {
    let working_dir = loaded.working_dir();
    if !working_dir.is_dir() {
        issues.push(
            Issue::new(
                "files",
                format!("Infrastructure directory not found: {}", working_dir.display()),
            )
            .fix("Set infrastructure.working_dir to the directory holding the Terraform configuration"),
        );
    }

    if configures {
        let playbook = loaded.playbook();
        if !playbook.is_file() {
            issues.push(
                Issue::new("files", format!("Playbook not found: {}", playbook.display()))
                    .fix("Set configuration.playbook to an existing playbook"),
            );
        }

        let key = paths::expand(&loaded.settings.access.ssh_public_key);
        if !key.is_file() {
            issues.push(
                Issue::new("files", format!("SSH public key not found: {}", key.display()))
                    .fix("Generate a key pair or set access.ssh_public_key")
                    .fix_cmd(format!(
                        "ssh-keygen -t ed25519 -f {}",
                        strip_pub(&key).display()
                    )),
            );
        }
    }
}

fn strip_pub(key: &Path) -> PathBuf {
    match key.to_str().and_then(|s| s.strip_suffix(".pub")) {
        Some(private) => PathBuf::from(private),
        None => key.to_path_buf(),
    }
}

/// Print issues the same way `doctor` does
pub fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }
}
