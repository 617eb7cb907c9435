//! Terraform as the infrastructure engine.
//!
//! Every call runs inside the configured working directory. `init` runs once
//! per process before the first plan/apply/destroy; Terraform itself keeps
//! the resource state, so every call here is safe to repeat.

use std::cell::Cell;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use stagekit::{EngineError, InfrastructureEngine, Outputs, PlanSummary};

use crate::command::Invocation;

static PLAN_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"Plan: (\d+) to add, (\d+) to change, (\d+) to destroy").ok()
});

/// Terraform CLI adapter
#[derive(Debug)]
pub struct Terraform {
    binary: PathBuf,
    working_dir: PathBuf,
    var_file: Option<PathBuf>,
    stream: bool,
    initialized: Cell<bool>,
}

impl Terraform {
    pub fn new(binary: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.into(),
            var_file: None,
            stream: false,
            initialized: Cell::new(false),
        }
    }

    /// Pass `-var-file=<path>` to every plan/apply/destroy
    pub fn with_var_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.var_file = Some(path.into());
        self
    }

    /// Show apply/destroy output live instead of capturing it
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    fn command(&self, subcommand: &str) -> Invocation {
        Invocation::new(&self.binary)
            .arg(subcommand)
            .args(["-input=false", "-no-color"])
            .current_dir(&self.working_dir)
    }

    fn with_inputs(&self, mut invocation: Invocation, targets: &[String]) -> Invocation {
        if let Some(var_file) = &self.var_file {
            invocation = invocation.arg(format!("-var-file={}", var_file.display()));
        }
        invocation.args(targets.iter().map(|t| format!("-target={t}")))
    }

    fn ensure_initialized(&self) -> Result<(), EngineError> {
        if self.initialized.get() {
            return Ok(());
        }
        log::info!("initializing terraform in {}", self.working_dir.display());
        self.command("init").checked()?;
        self.initialized.set(true);
        Ok(())
    }

    pub fn plan_invocation(&self, targets: &[String]) -> Invocation {
        self.with_inputs(self.command("plan"), targets)
    }

    pub fn apply_invocation(&self, targets: &[String]) -> Invocation {
        self.with_inputs(self.command("apply").arg("-auto-approve"), targets)
            .stream(self.stream)
    }

    pub fn destroy_invocation(&self) -> Invocation {
        self.with_inputs(self.command("destroy").arg("-auto-approve"), &[])
            .stream(self.stream)
    }

    /// Current root module outputs
    pub fn outputs(&self) -> Result<Outputs, EngineError> {
        let json = Invocation::new(&self.binary)
            .args(["output", "-json"])
            .current_dir(&self.working_dir)
            .checked()?;
        parse_outputs(&json)
    }
}

impl InfrastructureEngine for Terraform {
    fn plan(&self, targets: &[String]) -> Result<PlanSummary, EngineError> {
        self.ensure_initialized()?;
        let stdout = self.plan_invocation(targets).checked()?;
        let summary = parse_plan_summary(&stdout).unwrap_or_else(|| {
            log::warn!("could not find a plan summary in terraform output");
            PlanSummary::default()
        });
        log::info!("plan: {summary}");
        Ok(summary)
    }

    fn apply(&self, targets: &[String]) -> Result<Outputs, EngineError> {
        self.ensure_initialized()?;
        self.apply_invocation(targets).checked()?;
        self.outputs()
    }

    fn destroy(&self) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        self.destroy_invocation().checked()?;
        Ok(())
    }
}

/// Parse the summary line of `terraform plan`
pub fn parse_plan_summary(stdout: &str) -> Option<PlanSummary> {
    if stdout.contains("No changes.") {
        return Some(PlanSummary::default());
    }

    let captures = PLAN_LINE.as_ref()?.captures(stdout)?;
    let count = |i: usize| captures.get(i).and_then(|m| m.as_str().parse().ok());
    Some(PlanSummary {
        add: count(1)?,
        change: count(2)?,
        destroy: count(3)?,
    })
}

/// Parse `terraform output -json` into flat string outputs.
///
/// Strings are taken as-is, numbers and booleans are formatted, anything
/// structured is kept as compact JSON. Outputs marked sensitive are dropped
/// so they never reach the run report or the terminal.
pub fn parse_outputs(json: &str) -> Result<Outputs, EngineError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| EngineError::Other(format!("invalid terraform output JSON: {e}")))?;

    let Value::Object(entries) = root else {
        return Err(EngineError::Other(
            "terraform output JSON is not an object".to_string(),
        ));
    };

    Ok(entries
        .into_iter()
        .filter_map(|(name, entry)| {
            if entry.get("sensitive").and_then(Value::as_bool) == Some(true) {
                log::debug!("dropping sensitive output '{name}'");
                return None;
            }
            let value = match entry.get("value")? {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            Some((name, value))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terraform() -> Terraform {
        Terraform::new("terraform", "/srv/infra").with_var_file("/srv/infra/stackup.auto.tfvars.json")
    }

    #[test]
    fn test_parse_plan_summary() {
        let out = "Terraform will perform the following actions:\n\nPlan: 3 to add, 1 to change, 0 to destroy.\n";
        assert_eq!(
            parse_plan_summary(out),
            Some(PlanSummary {
                add: 3,
                change: 1,
                destroy: 0
            })
        );
    }

    #[test]
    fn test_parse_no_changes() {
        let out = "No changes. Your infrastructure matches the configuration.";
        let summary = parse_plan_summary(out).unwrap();
        assert!(!summary.has_changes());
    }

    #[test]
    fn test_parse_plan_without_summary() {
        assert_eq!(parse_plan_summary("Refreshing state..."), None);
    }

    #[test]
    fn test_parse_outputs_flattens_values() {
        let json = r#"{
            "instance_public_ip": {"sensitive": false, "type": "string", "value": "203.0.113.10"},
            "admin_username": {"sensitive": false, "type": "string", "value": "ops"},
            "disk_gb": {"sensitive": false, "type": "number", "value": 64},
            "allowed_cidrs": {"sensitive": false, "type": ["list", "string"], "value": ["10.0.0.0/8"]},
            "unset": {"sensitive": false, "type": "string", "value": null}
        }"#;
        let outputs = parse_outputs(json).unwrap();
        assert_eq!(outputs["instance_public_ip"], "203.0.113.10");
        assert_eq!(outputs["admin_username"], "ops");
        assert_eq!(outputs["disk_gb"], "64");
        assert_eq!(outputs["allowed_cidrs"], r#"["10.0.0.0/8"]"#);
        assert!(!outputs.contains_key("unset"));
    }

    #[test]
    fn test_parse_outputs_drops_sensitive_values() {
        let json = r#"{
            "instance_public_ip": {"sensitive": false, "type": "string", "value": "203.0.113.10"},
            "db_admin_password": {"sensitive": true, "type": "string", "value": "hunter2"},
            "storage_keys": {"sensitive": true, "type": ["list", "string"], "value": ["k1", "k2"]}
        }"#;
        let outputs = parse_outputs(json).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs["instance_public_ip"], "203.0.113.10");
        assert!(!outputs.values().any(|v| v.contains("hunter2")));
    }

    #[test]
    fn test_parse_outputs_empty_state() {
        assert!(parse_outputs("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_outputs_rejects_garbage() {
        assert!(parse_outputs("not json").is_err());
        assert!(parse_outputs("[]").is_err());
    }

    #[test]
    fn test_plan_is_never_auto_approved() {
        let args = terraform().plan_invocation(&[]).arg_list();
        assert_eq!(
            args,
            [
                "plan",
                "-input=false",
                "-no-color",
                "-var-file=/srv/infra/stackup.auto.tfvars.json"
            ]
        );
    }

    #[test]
    fn test_apply_targets_layers() {
        let targets = vec!["module.network".to_string(), "module.dns".to_string()];
        let args = terraform().apply_invocation(&targets).arg_list();
        assert_eq!(args[0], "apply");
        assert!(args.contains(&"-auto-approve".to_string()));
        assert!(args.ends_with(&[
            "-target=module.network".to_string(),
            "-target=module.dns".to_string()
        ]));
    }

    #[test]
    fn test_destroy_has_no_targets() {
        let args = terraform().destroy_invocation().arg_list();
        assert_eq!(args[0], "destroy");
        assert!(!args.iter().any(|a| a.starts_with("-target")));
    }
}
