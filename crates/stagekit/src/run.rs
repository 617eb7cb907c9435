//! One invocation of the orchestrator and everything it owns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::stage::Stage;
use crate::types::{Mode, Outputs, RunOutcome, StageKind, StageStatus};

/// A single deployment run.
///
/// Only the sequencer mutates a run once it has started. The run owns its
/// stages, the outputs collected from infrastructure applies and the
/// inventory materialized from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRun {
    pub mode: Mode,
    pub auto_approve: bool,
    pub stages: Vec<Stage>,
    /// `None` until the run reaches a terminal state
    pub outcome: Option<RunOutcome>,
    #[serde(default)]
    pub outputs: Outputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Inventory>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeploymentRun {
    /// Create a run, rejecting stage lists whose order is not strictly increasing
    pub fn new(mode: Mode, auto_approve: bool, stages: Vec<Stage>) -> Result<Self> {
        for pair in stages.windows(2) {
            if pair[1].order <= pair[0].order {
                return Err(Error::InvalidStageOrder {
                    name: pair[1].name.clone(),
                    order: pair[1].order,
                    previous: pair[0].order,
                });
            }
        }

        Ok(Self {
            mode,
            auto_approve,
            stages,
            outcome: None,
            outputs: Outputs::new(),
            inventory: None,
            warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Check that every stage before `index` succeeded or was skipped
    pub fn check_prerequisites(&self, index: usize) -> Result<()> {
        let stage = &self.stages[index];
        match self.stages[..index]
            .iter()
            .find(|s| !s.status.permits_successor())
        {
            Some(blocking) => Err(Error::OrderingViolation {
                name: stage.name.clone(),
                blocking: blocking.name.clone(),
                status: blocking.status,
            }),
            None => Ok(()),
        }
    }

    /// Pre-mark every pending stage matching `predicate` as skipped
    pub fn skip_where<F>(&mut self, predicate: F, reason: &str) -> Result<usize>
    where
        F: Fn(&Stage) -> bool,
    {
        let mut skipped = 0;
        for stage in self
            .stages
            .iter_mut()
            .filter(|s| s.status == StageStatus::Pending)
        {
            if predicate(stage) {
                stage.skip(reason)?;
                skipped += 1;
            }
        }
        Ok(skipped)
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn finish(&mut self, outcome: RunOutcome) -> Result<()> {
        if let Some(existing) = self.outcome {
            return Err(Error::AlreadyFinished(existing));
        }
        log::info!("run finished: {outcome}");
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn count(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|s| s.status == status).count()
    }

    /// The stage that stopped the run, if any
    pub fn failed_stage(&self) -> Option<&Stage> {
        self.stages.iter().find(|s| s.status == StageStatus::Failed)
    }

    /// Whether the run should make the process exit non-zero.
    ///
    /// A failed standalone destroy is re-run by the operator until the engine
    /// reports a clean state, so it is reported as a warning instead. Inside a
    /// redeploy the same failure means nothing was deployed, which is fatal.
    pub fn is_fatal(&self) -> bool {
        match self.outcome {
            Some(RunOutcome::Failed) => true,
            Some(RunOutcome::PartiallyApplied) => {
                self.mode != Mode::Destroy
                    || self
                        .failed_stage()
                        .is_none_or(|s| s.kind != StageKind::InfrastructureDestroy)
            }
            _ => false,
        }
    }
}
