//! Stage planner - maps a mode to its concrete stage list

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::types::{Mode, StageKind};

/// A group of resource addresses applied together in layered mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub targets: Vec<String>,
}

impl Layer {
    pub fn new<I, S>(name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }
}

/// Builds stage lists from the configured layers
#[derive(Debug, Clone, Default)]
pub struct StagePlanner {
    layers: Vec<Layer>,
}

impl StagePlanner {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Whether a mode starts out unattended
    pub fn default_auto_approve(mode: Mode) -> bool {
        matches!(mode, Mode::FullApply)
    }

    /// Concrete, numbered stage list for `mode`
    pub fn stages(&self, mode: Mode) -> Vec<Stage> {
        let stages = match mode {
            Mode::FullApply => self.apply_stages(false),
            Mode::LayeredApply => self.apply_stages(true),
            Mode::DryRun => self.dry_run_stages(),
            Mode::Destroy => destroy_stages(),
            Mode::Redeploy => {
                let mut stages = destroy_stages();
                stages.extend(self.apply_stages(true));
                stages
            }
        };
        number(stages)
    }

    /// Plan, core apply(s), readiness wait, configuration, reconciliation
    fn apply_stages(&self, layered: bool) -> Vec<Stage> {
        let mut stages = vec![Stage::new("plan", 0, StageKind::InfrastructurePlan)];

        if layered && !self.layers.is_empty() {
            for layer in &self.layers {
                stages.push(
                    Stage::new(
                        format!("apply-{}", layer.name),
                        0,
                        StageKind::InfrastructureApply,
                    )
                    .with_confirmation()
                    .with_targets(layer.targets.iter().cloned()),
                );
            }
        } else {
            let core: Vec<String> = self
                .layers
                .iter()
                .flat_map(|l| l.targets.iter().cloned())
                .collect();
            stages.push(
                Stage::new("apply-core", 0, StageKind::InfrastructureApply)
                    .with_confirmation()
                    .with_targets(core),
            );
        }

        stages.push(Stage::new("await-target", 0, StageKind::ReadinessWait));
        stages.push(Stage::new("configure", 0, StageKind::ConfigurationApply).with_confirmation());
        // Second pass over the whole graph picks up resources that depend on
        // values only known after the core apply.
        stages.push(Stage::new("reconcile", 0, StageKind::InfrastructureApply).with_confirmation());
        stages
    }

    /// Layered list with every mutating infrastructure stage turned into a plan
    fn dry_run_stages(&self) -> Vec<Stage> {
        self.apply_stages(true)
            .into_iter()
            .filter_map(|stage| match stage.kind {
                StageKind::InfrastructureApply => {
                    let name = match stage.name.strip_prefix("apply-") {
                        Some(rest) => format!("plan-{rest}"),
                        None => format!("plan-{}", stage.name),
                    };
                    Some(
                        Stage::new(name, 0, StageKind::InfrastructurePlan)
                            .with_targets(stage.targets),
                    )
                }
                StageKind::ReadinessWait | StageKind::ConfigurationApply => None,
                _ => Some(stage),
            })
            .collect()
    }
}

fn destroy_stages() -> Vec<Stage> {
    vec![Stage::new("destroy", 0, StageKind::InfrastructureDestroy).with_confirmation()]
}

fn number(mut stages: Vec<Stage>) -> Vec<Stage> {
    for (i, stage) in stages.iter_mut().enumerate() {
        stage.order = i as u32 + 1;
    }
    stages
}
