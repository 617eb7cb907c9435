//! Project settings (`stackup.toml`)
//!
//! Loaded once per invocation and passed by reference. Relative paths inside
//! the file resolve against the directory that holds it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;
use stagekit::{Layer, OutputKeys, RetryPolicy};

/// File name of the generated infrastructure variables
pub const VAR_FILE: &str = "stackup.auto.tfvars.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project: Project,
    #[serde(default)]
    pub instance: Instance,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub alerts: Alerts,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub infrastructure: Infrastructure,
    #[serde(default)]
    pub outputs: OutputKeys,
    #[serde(default)]
    pub configuration: Configuration,
    #[serde(default)]
    pub readiness: Readiness,
    #[serde(default)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default = "default_project_name")]
    pub name: String,
    #[serde(default)]
    pub region: String,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            region: String::new(),
        }
    }
}

fn default_project_name() -> String {
    "stackup".to_string()
}

/// Target sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_disk_gb")]
    pub disk_gb: u32,
    #[serde(default = "default_image")]
    pub image: String,
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            size: default_size(),
            disk_gb: default_disk_gb(),
            image: default_image(),
        }
    }
}

fn default_size() -> String {
    "small".to_string()
}

fn default_disk_gb() -> u32 {
    32
}

fn default_image() -> String {
    "ubuntu-24.04".to_string()
}

/// Who may reach the target, and with which key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Access {
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    #[serde(default)]
    pub allowed_cidrs: Vec<String>,
    #[serde(default = "default_public_key")]
    pub ssh_public_key: String,
    #[serde(default = "default_private_key")]
    pub ssh_private_key: String,
}

impl Default for Access {
    fn default() -> Self {
        Self {
            admin_user: default_admin_user(),
            allowed_cidrs: Vec::new(),
            ssh_public_key: default_public_key(),
            ssh_private_key: default_private_key(),
        }
    }
}

fn default_admin_user() -> String {
    "ops".to_string()
}

fn default_public_key() -> String {
    "~/.ssh/id_ed25519.pub".to_string()
}

fn default_private_key() -> String {
    "~/.ssh/id_ed25519".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Alerts {
    #[serde(default)]
    pub email: Option<String>,
}

/// Toggles for optional collaborator resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub audit_log: bool,
    #[serde(default)]
    pub budget: bool,
    #[serde(default)]
    pub dns: bool,
    #[serde(default)]
    pub encryption: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    #[serde(default = "default_monthly_limit")]
    pub monthly_limit: f64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            monthly_limit: default_monthly_limit(),
        }
    }
}

fn default_monthly_limit() -> f64 {
    50.0
}

/// The infrastructure engine and its resource layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Infrastructure {
    #[serde(default = "default_terraform")]
    pub binary: String,
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    /// Applied one at a time, in this order, by layered deploys
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl Default for Infrastructure {
    fn default() -> Self {
        Self {
            binary: default_terraform(),
            working_dir: default_working_dir(),
            layers: Vec::new(),
        }
    }
}

fn default_terraform() -> String {
    "terraform".to_string()
}

fn default_working_dir() -> String {
    "infra".to_string()
}

/// The configuration engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default = "default_ansible")]
    pub binary: String,
    #[serde(default = "default_playbook")]
    pub playbook: String,
    /// Where the generated inventory goes; defaults to the state directory
    #[serde(default)]
    pub inventory: Option<String>,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_ssh_retries")]
    pub ssh_retries: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            binary: default_ansible(),
            playbook: default_playbook(),
            inventory: None,
            group: default_group(),
            extra_args: Vec::new(),
            ssh_retries: default_ssh_retries(),
        }
    }
}

fn default_ansible() -> String {
    "ansible-playbook".to_string()
}

fn default_playbook() -> String {
    "ansible/site.yml".to_string()
}

fn default_group() -> String {
    "app".to_string()
}

fn default_ssh_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    #[default]
    Ssh,
    Tcp,
}

/// Readiness wait budget and probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub method: ProbeMethod,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            max_attempts: default_max_attempts(),
            method: ProbeMethod::default(),
            port: default_port(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Readiness {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.interval_seconds, self.max_attempts)
    }
}

fn default_interval() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    30
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    5
}

/// Where engine credentials may come from; any one source is enough.
///
/// Without a `[credentials]` section the common cloud provider sources are
/// checked. Two empty lists turn the check off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            env: [
                "ARM_CLIENT_ID",
                "ARM_USE_MSI",
                "AWS_ACCESS_KEY_ID",
                "AWS_PROFILE",
                "GOOGLE_APPLICATION_CREDENTIALS",
            ]
            .map(String::from)
            .to_vec(),
            files: [
                "~/.azure/azureProfile.json",
                "~/.aws/credentials",
                "~/.config/gcloud/application_default_credentials.json",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl Credentials {
    pub fn is_configured(&self) -> bool {
        !self.env.is_empty() || !self.files.is_empty()
    }
}

/// Variables handed to the infrastructure engine
#[derive(Debug, Serialize)]
struct EngineVariables<'a> {
    project_name: &'a str,
    region: &'a str,
    instance_size: &'a str,
    disk_gb: u32,
    image: &'a str,
    admin_username: &'a str,
    allowed_cidrs: &'a [String],
    ssh_public_key_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    alert_email: Option<&'a str>,
    enable_audit_log: bool,
    enable_budget: bool,
    enable_dns: bool,
    enable_encryption: bool,
    budget_monthly_limit: f64,
}

impl Settings {
    /// Load and validate settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.name.trim().is_empty() {
            anyhow::bail!("project.name cannot be empty");
        }
        if self.project.region.trim().is_empty() {
            anyhow::bail!("project.region cannot be empty");
        }
        if self.access.admin_user.trim().is_empty() {
            anyhow::bail!("access.admin_user cannot be empty");
        }
        if self.readiness.max_attempts == 0 {
            anyhow::bail!("readiness.max_attempts must be at least 1");
        }
        if self.readiness.interval_seconds == 0 {
            anyhow::bail!("readiness.interval_seconds must be at least 1");
        }
        if self.features.budget && self.budget.monthly_limit <= 0.0 {
            anyhow::bail!("budget.monthly_limit must be positive when the budget feature is on");
        }

        let mut seen = HashSet::new();
        for layer in &self.infrastructure.layers {
            if layer.name.trim().is_empty() {
                anyhow::bail!("Layer name cannot be empty");
            }
            if !seen.insert(layer.name.as_str()) {
                anyhow::bail!("Duplicate layer: {}", layer.name);
            }
            if layer.targets.is_empty() {
                anyhow::bail!("Layer '{}' has no targets", layer.name);
            }
        }

        for (key, value) in [
            ("outputs.host", &self.outputs.host),
            ("outputs.principal", &self.outputs.principal),
            ("outputs.credential", &self.outputs.credential),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{key} cannot be empty");
            }
        }

        Ok(())
    }

    /// Render the engine variables as pretty JSON
    pub fn engine_variables(&self) -> Result<String> {
        let vars = EngineVariables {
            project_name: &self.project.name,
            region: &self.project.region,
            instance_size: &self.instance.size,
            disk_gb: self.instance.disk_gb,
            image: &self.instance.image,
            admin_username: &self.access.admin_user,
            allowed_cidrs: &self.access.allowed_cidrs,
            ssh_public_key_path: paths::expand(&self.access.ssh_public_key)
                .display()
                .to_string(),
            alert_email: self.alerts.email.as_deref(),
            enable_audit_log: self.features.audit_log,
            enable_budget: self.features.budget,
            enable_dns: self.features.dns,
            enable_encryption: self.features.encryption,
            budget_monthly_limit: self.budget.monthly_limit,
        };
        serde_json::to_string_pretty(&vars).context("Failed to serialize engine variables")
    }

    /// Write the engine variables into `working_dir`, replacing any old copy
    pub fn write_engine_variables(&self, working_dir: &Path) -> Result<PathBuf> {
        let path = working_dir.join(VAR_FILE);
        let content = self.engine_variables()?;
        fs::write(&path, content + "\n")
            .with_context(|| format!("Could not write {}", path.display()))?;
        log::debug!("wrote engine variables to {}", path.display());
        Ok(path)
    }
}

/// Settings plus the directory their relative paths resolve against
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    /// The file they came from; `None` when running on defaults
    pub source: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl LoadedSettings {
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self {
            settings: Settings::load(path)?,
            source: Some(path.to_path_buf()),
            base_dir: paths::project_dir(path),
        })
    }

    /// Built-in defaults rooted at `base_dir`, for plan-only runs
    pub fn defaults(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings: Settings::default(),
            source: None,
            base_dir: base_dir.into(),
        }
    }

    pub fn resolve(&self, raw: &str) -> PathBuf {
        paths::resolve(&self.base_dir, raw)
    }

    /// Engine binary: bare names stay bare for a PATH lookup
    pub fn binary(&self, raw: &str) -> PathBuf {
        if raw.contains('/') {
            self.resolve(raw)
        } else {
            PathBuf::from(raw)
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        self.resolve(&self.settings.infrastructure.working_dir)
    }

    pub fn playbook(&self) -> PathBuf {
        self.resolve(&self.settings.configuration.playbook)
    }

    pub fn inventory_path(&self, state_dir: &Path) -> PathBuf {
        match &self.settings.configuration.inventory {
            Some(raw) => self.resolve(raw),
            None => state_dir.join("inventory.ini"),
        }
    }
}
