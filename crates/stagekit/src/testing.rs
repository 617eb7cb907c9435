//! Recording fakes for sequencer and prober tests

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::engine::{ConfigurationEngine, InfrastructureEngine};
use crate::error::EngineError;
use crate::gate::OperatorPrompt;
use crate::inventory::Inventory;
use crate::observer::StageObserver;
use crate::prober::{Probe, ReadinessCheck};
use crate::run::DeploymentRun;
use crate::stage::Stage;
use crate::types::{Outputs, PlanSummary, Target};

/// Shared, ordered log of every collaborator call
pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn sample_outputs() -> Outputs {
    [
        ("instance_public_ip", "203.0.113.10"),
        ("admin_username", "ops"),
        ("ssh_private_key_path", "/keys/id_ed25519"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Infrastructure engine that records calls and fails on request.
///
/// Keeps the set of applied resources so a repeated plan reports only what is
/// still missing and a repeated apply converges instead of creating twice.
pub struct FakeInfrastructure {
    pub journal: Journal,
    pub outputs: Outputs,
    /// Fail the n-th apply call (1-indexed) after creating one resource
    pub fail_apply_on: Option<usize>,
    pub fail_destroy: bool,
    declared: Vec<String>,
    applied: RefCell<BTreeSet<String>>,
    created: RefCell<Vec<String>>,
    applies: Cell<usize>,
}

impl FakeInfrastructure {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            outputs: sample_outputs(),
            fail_apply_on: None,
            fail_destroy: false,
            declared: vec!["module.network".into(), "module.compute".into()],
            applied: RefCell::new(BTreeSet::new()),
            created: RefCell::new(Vec::new()),
            applies: Cell::new(0),
        }
    }

    /// Every resource creation, in order, across all runs
    pub fn created(&self) -> Vec<String> {
        self.created.borrow().clone()
    }

    fn record(&self, entry: String) {
        self.journal.borrow_mut().push(entry);
    }

    /// Declared resources an empty or explicit target list covers
    fn scope<'a>(&'a self, targets: &'a [String]) -> impl Iterator<Item = &'a String> + 'a {
        self.declared
            .iter()
            .filter(move |r| targets.is_empty() || targets.contains(r))
    }

    fn pending(&self, targets: &[String]) -> Vec<String> {
        let applied = self.applied.borrow();
        self.scope(targets)
            .filter(|r| !applied.contains(*r))
            .cloned()
            .collect()
    }

    fn create(&self, resource: String) {
        self.applied.borrow_mut().insert(resource.clone());
        self.created.borrow_mut().push(resource);
    }
}

impl InfrastructureEngine for FakeInfrastructure {
    fn plan(&self, targets: &[String]) -> Result<PlanSummary, EngineError> {
        self.record(format!("plan {}", targets.join(",")));
        Ok(PlanSummary {
            add: self.pending(targets).len(),
            change: 0,
            destroy: 0,
        })
    }

    fn apply(&self, targets: &[String]) -> Result<Outputs, EngineError> {
        self.record(format!("apply {}", targets.join(",")));
        let n = self.applies.get() + 1;
        self.applies.set(n);
        let mut pending = self.pending(targets).into_iter();
        if self.fail_apply_on == Some(n) {
            if let Some(first) = pending.next() {
                self.create(first);
            }
            return Err(EngineError::Quota {
                message: "instance limit reached".into(),
            });
        }
        for resource in pending {
            self.create(resource);
        }
        Ok(self.outputs.clone())
    }

    fn destroy(&self) -> Result<(), EngineError> {
        self.record("destroy".to_string());
        if self.fail_destroy {
            return Err(EngineError::CommandFailed {
                command: "destroy".into(),
                stderr: "DependencyViolation".into(),
            });
        }
        self.applied.borrow_mut().clear();
        Ok(())
    }
}

/// Configuration engine that records the inventory it was handed
pub struct FakeConfiguration {
    pub journal: Journal,
    pub fail: bool,
}

impl FakeConfiguration {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail: false,
        }
    }
}

impl ConfigurationEngine for FakeConfiguration {
    fn apply_configuration(&self, inventory: &Inventory) -> Result<(), EngineError> {
        self.journal
            .borrow_mut()
            .push(format!("configure {}", inventory.target()));
        if self.fail {
            return Err(EngineError::Unreachable {
                message: "ssh: connect to host port 22: Connection timed out".into(),
            });
        }
        Ok(())
    }
}

/// Probe that answers from a script, repeating the last answer
pub struct ScriptedProbe {
    answers: RefCell<VecDeque<bool>>,
    last: Cell<bool>,
    timeouts: RefCell<Vec<Duration>>,
}

impl ScriptedProbe {
    pub fn always(answer: bool) -> Self {
        Self::sequence(&[answer])
    }

    pub fn sequence(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            last: Cell::new(false),
            timeouts: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.timeouts.borrow().len()
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.borrow().clone()
    }
}

impl Probe for ScriptedProbe {
    fn probe(&self, _target: &Target, timeout: Duration) -> bool {
        self.timeouts.borrow_mut().push(timeout);
        if let Some(answer) = self.answers.borrow_mut().pop_front() {
            self.last.set(answer);
        }
        self.last.get()
    }
}

/// Operator prompt that replays canned answers and records the prompts shown
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedPrompt {
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| (*a).to_string()).collect(),
            prompts: Vec::new(),
        }
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn read_answer(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}

/// Observer that keeps a flat event log
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Vec<String>,
}

impl StageObserver for RecordingObserver {
    fn on_stage_start(&mut self, position: usize, total: usize, stage: &Stage) {
        self.events
            .push(format!("start {position}/{total} {}", stage.name));
    }

    fn on_stage_complete(&mut self, stage: &Stage) {
        self.events.push(format!("{} {}", stage.status, stage.name));
    }

    fn on_probe_attempt(&mut self, check: &ReadinessCheck, ready: bool) {
        self.events
            .push(format!("probe {} {ready}", check.attempts_made));
    }

    fn on_warning(&mut self, message: &str) {
        self.events.push(format!("warning {message}"));
    }

    fn on_run_complete(&mut self, run: &DeploymentRun) {
        if let Some(outcome) = run.outcome {
            self.events.push(format!("outcome {outcome}"));
        }
    }
}
