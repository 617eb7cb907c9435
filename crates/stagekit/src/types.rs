//! Core types for staged provisioning

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named outputs exposed by the infrastructure engine after an apply
pub type Outputs = BTreeMap<String, String>;

/// What a single invocation is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Apply everything unattended in one pass per phase
    FullApply,
    /// Apply layer by layer, confirming between stages
    LayeredApply,
    /// Same stage list as layered apply, but plan-only
    DryRun,
    /// Tear down every declared resource
    Destroy,
    /// Destroy, then apply again
    Redeploy,
}

impl Mode {
    /// Whether this mode can change remote state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::DryRun)
    }

    /// Whether this mode reaches a live target (readiness + configuration)
    pub fn configures_target(&self) -> bool {
        matches!(self, Self::FullApply | Self::LayeredApply | Self::Redeploy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FullApply => "full-apply",
            Self::LayeredApply => "layered-apply",
            Self::DryRun => "dry-run",
            Self::Destroy => "destroy",
            Self::Redeploy => "redeploy",
        }
    }

    pub fn all() -> &'static [Mode] {
        &[
            Self::FullApply,
            Self::LayeredApply,
            Self::DryRun,
            Self::Destroy,
            Self::Redeploy,
        ]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of work a stage performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Compute the infrastructure diff without mutating anything
    InfrastructurePlan,
    /// Converge (part of) the declared resource graph
    InfrastructureApply,
    /// Tear down the declared resource graph
    InfrastructureDestroy,
    /// Poll the provisioned target until it answers
    ReadinessWait,
    /// Materialize inventory and run configuration management
    ConfigurationApply,
}

impl StageKind {
    /// Whether a stage of this kind changes remote state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::InfrastructureApply | Self::InfrastructureDestroy | Self::ConfigurationApply
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InfrastructurePlan => "infrastructure-plan",
            Self::InfrastructureApply => "infrastructure-apply",
            Self::InfrastructureDestroy => "infrastructure-destroy",
            Self::ReadinessWait => "readiness-wait",
            Self::ConfigurationApply => "configuration-apply",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of a stage: pending → running → {succeeded, failed, skipped}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageStatus {
    /// Whether a later stage may run on top of this one
    pub fn permits_successor(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Final outcome of a deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every stage succeeded or was skipped
    Succeeded,
    /// A stage failed; earlier stages stay applied
    PartiallyApplied,
    /// The operator declined at a confirmation gate
    Aborted,
    /// The run could not continue for a reason outside any engine call
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::PartiallyApplied => "partially-applied",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Resource counts reported by a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub add: usize,
    pub change: usize,
    pub destroy: usize,
}

impl PlanSummary {
    pub fn has_changes(&self) -> bool {
        self.add + self.change + self.destroy > 0
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_changes() {
            write!(
                f,
                "{} to add, {} to change, {} to destroy",
                self.add, self.change, self.destroy
            )
        } else {
            f.write_str("no changes")
        }
    }
}

/// A host/principal pair the orchestrator connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub principal: String,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.principal, self.host)
    }
}
