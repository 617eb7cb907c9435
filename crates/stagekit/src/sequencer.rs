//! Stage sequencer - runs a deployment strictly in order
//!
//! One stage at a time, blocking on every engine call. The only pause point
//! is the confirmation gate in front of a stage; the only loop is the
//! readiness prober. A failed stage stops the run and nothing is rolled back:
//! the operator recovers by invoking the same mode again.

use crate::engine::{ConfigurationEngine, InfrastructureEngine};
use crate::error::{EngineCall, Error, Result, StageFailure};
use crate::gate::{ConfirmationGate, OperatorPrompt};
use crate::inventory::InventoryMaterializer;
use crate::observer::StageObserver;
use crate::prober::{ReadinessCheck, ReadinessProber, RetryPolicy};
use crate::run::DeploymentRun;
use crate::types::{RunOutcome, StageKind, StageStatus};

/// Drives the collaborators through a run's stage list
pub struct Sequencer<'a> {
    infrastructure: &'a dyn InfrastructureEngine,
    configuration: &'a dyn ConfigurationEngine,
    materializer: &'a InventoryMaterializer,
    prober: ReadinessProber<'a>,
    readiness: RetryPolicy,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        infrastructure: &'a dyn InfrastructureEngine,
        configuration: &'a dyn ConfigurationEngine,
        materializer: &'a InventoryMaterializer,
        prober: ReadinessProber<'a>,
        readiness: RetryPolicy,
    ) -> Self {
        Self {
            infrastructure,
            configuration,
            materializer,
            prober,
            readiness,
        }
    }

    /// Execute every stage of `run` in order until it reaches an outcome.
    ///
    /// Declines and stage failures are outcomes, not errors. `Err` means the
    /// run could not be driven at all (broken stage list, unreadable input).
    pub fn execute<P, O>(
        &self,
        run: &mut DeploymentRun,
        prompt: &mut P,
        observer: &mut O,
    ) -> Result<()>
    where
        P: OperatorPrompt,
        O: StageObserver,
    {
        if let Some(outcome) = run.outcome {
            return Err(Error::AlreadyFinished(outcome));
        }

        let total = run.stages.len();
        log::info!(
            "starting {} run with {} stages (auto-approve: {})",
            run.mode,
            total,
            run.auto_approve
        );

        for index in 0..total {
            if run.stages[index].status == StageStatus::Skipped {
                log::info!(
                    "stage '{}' skipped: {}",
                    run.stages[index].name,
                    run.stages[index].detail.as_deref().unwrap_or("no reason given")
                );
                observer.on_stage_complete(&run.stages[index]);
                continue;
            }

            run.check_prerequisites(index)?;

            if run.stages[index].requires_confirmation {
                let stage = &run.stages[index];
                let mut gate = ConfirmationGate::new(format!(
                    "Run stage {}/{} '{}' ({})?",
                    index + 1,
                    total,
                    stage.name,
                    stage.kind
                ));

                match gate.resolve(run.auto_approve, &mut *prompt) {
                    Ok(true) => {}
                    Ok(false) => {
                        log::info!("stage '{}' declined by operator", stage.name);
                        run.stages[index].skip("declined at confirmation gate")?;
                        observer.on_stage_complete(&run.stages[index]);
                        return finish(run, RunOutcome::Aborted, observer);
                    }
                    Err(e) => {
                        finish(run, RunOutcome::Failed, observer)?;
                        return Err(Error::Confirmation(e));
                    }
                }
            }

            run.stages[index].start()?;
            observer.on_stage_start(index + 1, total, &run.stages[index]);
            log::info!(
                "stage {}/{} '{}' running",
                index + 1,
                total,
                run.stages[index].name
            );

            match self.perform(run, index, observer) {
                Ok(detail) => {
                    run.stages[index].succeed(detail)?;
                    observer.on_stage_complete(&run.stages[index]);
                }
                Err(failure) => {
                    log::error!("{failure}");
                    let destroy = run.stages[index].kind == StageKind::InfrastructureDestroy;
                    run.stages[index].fail(failure)?;
                    observer.on_stage_complete(&run.stages[index]);

                    if destroy {
                        let message = "destroy did not complete cleanly; re-run destroy until the engine reports no remaining resources";
                        run.warn(message);
                        observer.on_warning(message);
                    }
                    return finish(run, RunOutcome::PartiallyApplied, observer);
                }
            }
        }

        finish(run, RunOutcome::Succeeded, observer)
    }

    /// Run the collaborator call behind one stage
    fn perform<O: StageObserver>(
        &self,
        run: &mut DeploymentRun,
        index: usize,
        observer: &mut O,
    ) -> std::result::Result<Option<String>, StageFailure> {
        let name = run.stages[index].name.clone();
        let targets = run.stages[index].targets.clone();

        match run.stages[index].kind {
            StageKind::InfrastructurePlan => {
                let summary = self
                    .infrastructure
                    .plan(&targets)
                    .map_err(|e| StageFailure::from_engine(&name, EngineCall::Plan, &e))?;
                Ok(Some(format!("plan: {summary}")))
            }
            StageKind::InfrastructureApply => {
                let outputs = self
                    .infrastructure
                    .apply(&targets)
                    .map_err(|e| StageFailure::from_engine(&name, EngineCall::Apply, &e))?;
                let count = outputs.len();
                run.outputs.extend(outputs);
                Ok(Some(format!("applied, {count} outputs")))
            }
            StageKind::InfrastructureDestroy => {
                self.infrastructure
                    .destroy()
                    .map_err(|e| StageFailure::from_engine(&name, EngineCall::Destroy, &e))?;
                run.outputs.clear();
                Ok(Some("destroyed".to_string()))
            }
            StageKind::ReadinessWait => {
                let target = self.materializer.keys().target(&run.outputs).map_err(|e| {
                    StageFailure::from_materialize(&name, EngineCall::ResolveTarget, &e)
                })?;

                let mut check = ReadinessCheck::new(target, self.readiness);
                let outcome = self.prober.wait(&mut check, &mut |c, ready| {
                    observer.on_probe_attempt(c, ready);
                });

                if outcome.ready {
                    return Ok(Some(format!(
                        "{} reachable after {} attempt(s)",
                        check.target, outcome.attempts
                    )));
                }

                let message = format!(
                    "{} not reachable after {} attempts ({}s); continuing, configuration will retry its own connections",
                    check.target,
                    outcome.attempts,
                    outcome.elapsed.as_secs()
                );
                run.warn(message.clone());
                observer.on_warning(&message);
                Ok(Some("target not reachable yet, continued".to_string()))
            }
            StageKind::ConfigurationApply => {
                let inventory = self.materializer.materialize(&run.outputs).map_err(|e| {
                    StageFailure::from_materialize(&name, EngineCall::MaterializeInventory, &e)
                })?;
                let inventory = run.inventory.insert(inventory);

                self.configuration
                    .apply_configuration(inventory)
                    .map_err(|e| {
                        StageFailure::from_engine(&name, EngineCall::ApplyConfiguration, &e)
                    })?;
                Ok(Some(format!("configured {}", inventory.target())))
            }
        }
    }
}

fn finish<O: StageObserver>(
    run: &mut DeploymentRun,
    outcome: RunOutcome,
    observer: &mut O,
) -> Result<()> {
    run.finish(outcome)?;
    observer.on_run_complete(run);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::gate::NoPrompt;
    use crate::inventory::OutputKeys;
    use crate::observer::NoObserver;
    use crate::planner::{Layer, StagePlanner};
    use crate::prober::{Clock, ManualClock};
    use crate::stage::Stage;
    use crate::testing::{
        FakeConfiguration, FakeInfrastructure, Journal, RecordingObserver, ScriptedProbe,
        ScriptedPrompt, journal,
    };
    use crate::types::Mode;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        journal: Journal,
        infrastructure: FakeInfrastructure,
        configuration: FakeConfiguration,
        materializer: InventoryMaterializer,
        probe: ScriptedProbe,
        clock: ManualClock,
        policy: RetryPolicy,
        _dir: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let journal = journal();
            Self {
                infrastructure: FakeInfrastructure::new(journal.clone()),
                configuration: FakeConfiguration::new(journal.clone()),
                materializer: InventoryMaterializer::new(
                    OutputKeys::default(),
                    "app",
                    dir.path().join("inventory.ini"),
                ),
                probe: ScriptedProbe::always(true),
                clock: ManualClock::new(),
                policy: RetryPolicy::from_secs(5, 3),
                journal,
                _dir: dir,
            }
        }

        fn sequencer(&self) -> Sequencer<'_> {
            Sequencer::new(
                &self.infrastructure,
                &self.configuration,
                &self.materializer,
                ReadinessProber::new(&self.probe, &self.clock),
                self.policy,
            )
        }

        fn calls(&self) -> Vec<String> {
            self.journal.borrow().clone()
        }

        fn clock_elapsed(&self) -> Duration {
            self.clock.now()
        }
    }

    fn planner() -> StagePlanner {
        StagePlanner::new(vec![
            Layer::new("network", ["module.network"]),
            Layer::new("compute", ["module.compute"]),
        ])
    }

    fn run_for(mode: Mode, auto_approve: bool) -> DeploymentRun {
        DeploymentRun::new(mode, auto_approve, planner().stages(mode)).unwrap()
    }

    fn statuses(run: &DeploymentRun) -> Vec<StageStatus> {
        run.stages.iter().map(|s| s.status).collect()
    }

    #[test]
    fn test_full_apply_runs_every_stage_in_order() {
        let h = Harness::new();
        let mut run = run_for(Mode::FullApply, true);

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(
            h.calls(),
            vec![
                "plan ",
                "apply module.network,module.compute",
                "configure ops@203.0.113.10",
                "apply ",
            ]
        );
        assert!(run.stages.iter().all(|s| s.status == StageStatus::Succeeded));
        assert_eq!(
            run.inventory.as_ref().map(|i| i.host.as_str()),
            Some("203.0.113.10")
        );
    }

    #[test]
    fn test_apply_failure_on_stage_two_leaves_rest_pending() {
        let mut h = Harness::new();
        h.infrastructure.fail_apply_on = Some(1);
        let mut run = run_for(Mode::FullApply, true);
        let mut observer = RecordingObserver::default();

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut observer)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::PartiallyApplied));
        assert_eq!(
            statuses(&run),
            vec![
                StageStatus::Succeeded,
                StageStatus::Failed,
                StageStatus::Pending,
                StageStatus::Pending,
                StageStatus::Pending,
            ]
        );
        assert!(!observer.events.iter().any(|e| e.contains("await-target")));

        let failure = run.stages[1].failure.as_ref().unwrap();
        assert_eq!(failure.stage, "apply-core");
        assert_eq!(failure.call, EngineCall::Apply);
        assert_eq!(failure.category, ErrorCategory::Quota);
        assert!(run.is_fatal());
    }

    #[test]
    fn test_decline_at_stage_three_aborts() {
        let h = Harness::new();
        let stages = vec![
            Stage::new("plan", 1, StageKind::InfrastructurePlan),
            Stage::new("apply-core", 2, StageKind::InfrastructureApply).with_confirmation(),
            Stage::new("await-target", 3, StageKind::ReadinessWait).with_confirmation(),
            Stage::new("configure", 4, StageKind::ConfigurationApply).with_confirmation(),
            Stage::new("reconcile", 5, StageKind::InfrastructureApply).with_confirmation(),
        ];
        let mut run = DeploymentRun::new(Mode::LayeredApply, false, stages).unwrap();
        let mut prompt = ScriptedPrompt::answering(&["yes", "no"]);

        h.sequencer()
            .execute(&mut run, &mut prompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::Aborted));
        assert_eq!(
            statuses(&run),
            vec![
                StageStatus::Succeeded,
                StageStatus::Succeeded,
                StageStatus::Skipped,
                StageStatus::Pending,
                StageStatus::Pending,
            ]
        );
        assert_eq!(prompt.prompts.len(), 2);
        assert!(prompt.prompts[1].contains("'await-target'"));
        assert!(!run.is_fatal());
        assert_eq!(h.calls(), vec!["plan ", "apply "]);
    }

    #[test]
    fn test_empty_answer_declines_first_gate() {
        let h = Harness::new();
        let mut run = run_for(Mode::LayeredApply, false);
        let mut prompt = ScriptedPrompt::answering(&[""]);

        h.sequencer()
            .execute(&mut run, &mut prompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::Aborted));
        assert_eq!(h.calls(), vec!["plan "]);
    }

    #[test]
    fn test_auto_approve_never_prompts() {
        let h = Harness::new();
        let mut run = run_for(Mode::Redeploy, true);

        // NoPrompt errors if consulted
        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(h.calls().first().map(String::as_str), Some("destroy"));
    }

    #[test]
    fn test_layered_prompts_before_each_gated_stage() {
        let h = Harness::new();
        let mut run = run_for(Mode::LayeredApply, false);
        let mut prompt = ScriptedPrompt::answering(&["y", "y", "y", "y"]);

        h.sequencer()
            .execute(&mut run, &mut prompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(prompt.prompts.len(), 4);
        assert!(prompt.prompts[0].contains("'apply-network'"));
        assert!(prompt.prompts[3].contains("'reconcile'"));
    }

    #[test]
    fn test_dry_run_only_plans() {
        let h = Harness::new();
        let mut run = run_for(Mode::DryRun, false);

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::Succeeded));
        let calls = h.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|c| c.starts_with("plan")));
        assert!(run.inventory.is_none());
    }

    #[test]
    fn test_readiness_exhaustion_is_a_warning() {
        let mut h = Harness::new();
        h.probe = ScriptedProbe::always(false);
        let mut run = run_for(Mode::FullApply, true);
        let mut observer = RecordingObserver::default();

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut observer)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(h.probe.calls(), 3);
        assert!(h.clock_elapsed() >= Duration::from_secs(10));
        assert_eq!(run.warnings.len(), 1);
        assert!(run.warnings[0].contains("not reachable after 3 attempts"));
        assert!(h.calls().contains(&"configure ops@203.0.113.10".to_string()));
        assert_eq!(
            observer
                .events
                .iter()
                .filter(|e| e.starts_with("probe"))
                .count(),
            3
        );
    }

    #[test]
    fn test_missing_outputs_fail_loudly_before_probing() {
        let mut h = Harness::new();
        h.infrastructure.outputs.remove("instance_public_ip");
        let mut run = run_for(Mode::FullApply, true);

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::PartiallyApplied));
        let failed = run.failed_stage().unwrap();
        assert_eq!(failed.name, "await-target");
        assert_eq!(
            failed.failure.as_ref().map(|f| f.call),
            Some(EngineCall::ResolveTarget)
        );
        assert_eq!(h.probe.calls(), 0);
        assert!(!h.calls().iter().any(|c| c.starts_with("configure")));
    }

    #[test]
    fn test_configuration_failure_stops_before_reconcile() {
        let mut h = Harness::new();
        h.configuration.fail = true;
        let mut run = run_for(Mode::FullApply, true);

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::PartiallyApplied));
        assert_eq!(run.stages[4].status, StageStatus::Pending);
        assert_eq!(
            run.failed_stage().and_then(|s| s.failure.as_ref()).map(|f| f.category),
            Some(ErrorCategory::Unreachable)
        );
    }

    #[test]
    fn test_destroy_failure_is_not_fatal() {
        let mut h = Harness::new();
        h.infrastructure.fail_destroy = true;
        let mut run = run_for(Mode::Destroy, true);

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::PartiallyApplied));
        assert_eq!(run.stages[0].status, StageStatus::Failed);
        assert!(!run.is_fatal());
        assert_eq!(run.warnings.len(), 1);
    }

    #[test]
    fn test_redeploy_destroy_failure_blocks_apply() {
        let mut h = Harness::new();
        h.infrastructure.fail_destroy = true;
        let mut run = run_for(Mode::Redeploy, true);

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(h.calls(), vec!["destroy"]);
        assert!(run.stages[1..].iter().all(|s| s.status == StageStatus::Pending));
        assert!(run.is_fatal());
        assert!(h.infrastructure.created().is_empty());
    }

    #[test]
    fn test_pre_skipped_stages_are_passed_over() {
        let h = Harness::new();
        let mut run = run_for(Mode::Redeploy, false);
        run.skip_where(|s| s.kind == StageKind::InfrastructureDestroy, "--skip-destroy")
            .unwrap();
        let mut prompt = ScriptedPrompt::answering(&["y", "y", "y", "y"]);

        h.sequencer()
            .execute(&mut run, &mut prompt, &mut NoObserver)
            .unwrap();

        assert_eq!(run.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(run.stages[0].status, StageStatus::Skipped);
        assert!(!h.calls().contains(&"destroy".to_string()));
    }

    #[test]
    fn test_second_apply_run_is_idempotent() {
        let h = Harness::new();

        let mut first = run_for(Mode::FullApply, true);
        h.sequencer()
            .execute(&mut first, &mut NoPrompt, &mut NoObserver)
            .unwrap();
        assert_eq!(
            first.stages[0].detail.as_deref(),
            Some("plan: 2 to add, 0 to change, 0 to destroy")
        );

        let mut second = run_for(Mode::FullApply, true);
        h.sequencer()
            .execute(&mut second, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(second.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(second.count(StageStatus::Failed), 0);
        assert_eq!(second.stages[0].detail.as_deref(), Some("plan: no changes"));
        assert_eq!(
            h.infrastructure.created(),
            vec!["module.network", "module.compute"]
        );
        assert_eq!(first.outputs, second.outputs);
        assert_eq!(first.inventory, second.inventory);
    }

    #[test]
    fn test_rerun_after_partial_apply_converges() {
        let mut h = Harness::new();
        h.infrastructure.fail_apply_on = Some(1);

        let mut failed = run_for(Mode::FullApply, true);
        h.sequencer()
            .execute(&mut failed, &mut NoPrompt, &mut NoObserver)
            .unwrap();
        assert_eq!(failed.outcome, Some(RunOutcome::PartiallyApplied));
        assert_eq!(failed.failed_stage().map(|s| s.name.as_str()), Some("apply-core"));
        assert_eq!(h.infrastructure.created(), vec!["module.network"]);

        h.infrastructure.fail_apply_on = None;
        let mut rerun = run_for(Mode::FullApply, true);
        h.sequencer()
            .execute(&mut rerun, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        assert_eq!(rerun.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(
            rerun.stages[0].detail.as_deref(),
            Some("plan: 1 to add, 0 to change, 0 to destroy")
        );
        assert_eq!(
            h.infrastructure.created(),
            vec!["module.network", "module.compute"]
        );
        assert!(rerun.stages.iter().all(|s| s.status == StageStatus::Succeeded));
    }

    #[test]
    fn test_no_stage_starts_before_predecessors_resolve() {
        let h = Harness::new();
        let mut run = run_for(Mode::LayeredApply, true);
        let mut observer = RecordingObserver::default();

        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut observer)
            .unwrap();

        let mut resolved = Vec::new();
        for event in &observer.events {
            if let Some(rest) = event.strip_prefix("start ") {
                let name = rest.split_whitespace().nth(1).unwrap();
                let index = run.stages.iter().position(|s| s.name == name).unwrap();
                assert_eq!(resolved.len(), index, "'{name}' started out of order");
            } else if let Some(name) = event.strip_prefix("succeeded ") {
                resolved.push(name.to_string());
            }
        }
        assert_eq!(resolved.len(), run.stages.len());
    }

    #[test]
    fn test_finished_run_cannot_be_executed_again() {
        let h = Harness::new();
        let mut run = run_for(Mode::DryRun, false);
        h.sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap();

        let err = h
            .sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyFinished(RunOutcome::Succeeded)));
    }

    #[test]
    fn test_unreadable_input_fails_the_run() {
        let h = Harness::new();
        let mut run = run_for(Mode::Destroy, false);

        let err = h
            .sequencer()
            .execute(&mut run, &mut NoPrompt, &mut NoObserver)
            .unwrap_err();

        assert!(matches!(err, Error::Confirmation(_)));
        assert_eq!(run.outcome, Some(RunOutcome::Failed));
        assert_eq!(run.stages[0].status, StageStatus::Pending);
        assert!(h.calls().is_empty());
    }
}
