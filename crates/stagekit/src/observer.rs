//! Progress callbacks for the sequencer
//!
//! Implement [`StageObserver`] to render progress; the sequencer itself never
//! prints anything.

use crate::prober::ReadinessCheck;
use crate::run::DeploymentRun;
use crate::stage::Stage;

/// Receives stage lifecycle events in execution order
pub trait StageObserver {
    /// Called right before a stage starts running
    fn on_stage_start(&mut self, _position: usize, _total: usize, _stage: &Stage) {}

    /// Called once a stage resolved (succeeded, failed or skipped)
    fn on_stage_complete(&mut self, _stage: &Stage) {}

    /// Called after each readiness probe
    fn on_probe_attempt(&mut self, _check: &ReadinessCheck, _ready: bool) {}

    /// Called for non-fatal problems the run continues past
    fn on_warning(&mut self, _message: &str) {}

    /// Called once the run reached its outcome
    fn on_run_complete(&mut self, _run: &DeploymentRun) {}
}

/// Observer that ignores every event
pub struct NoObserver;

impl StageObserver for NoObserver {}
