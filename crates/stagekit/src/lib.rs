//! # stagekit
//!
//! Staged provisioning: drive an infrastructure engine and a configuration
//! engine through one ordered, resumable deployment run.
//!
//! ## Core Concepts
//!
//! - **Stage**: one unit of work with a kind, an order and a lifecycle status
//! - **DeploymentRun**: one invocation of a mode, owning its stages
//! - **StagePlanner**: maps a [`Mode`] to the stage list it runs
//! - **Sequencer**: executes stages strictly in order, pausing at gates
//! - **ReadinessProber**: bounded polling of a freshly provisioned target
//! - **InventoryMaterializer**: turns engine outputs into an inventory file
//!
//! Engines, probes, prompts and progress rendering are all traits, so the
//! whole lifecycle can be exercised without touching real infrastructure.
//!
//! ## Example
//!
//! ```ignore
//! use stagekit::{
//!     DeploymentRun, InventoryMaterializer, Mode, NoObserver, OutputKeys,
//!     ReadinessProber, RetryPolicy, Sequencer, StagePlanner, SystemClock,
//! };
//!
//! let planner = StagePlanner::new(layers);
//! let mut run = DeploymentRun::new(Mode::LayeredApply, false, planner.stages(Mode::LayeredApply))?;
//!
//! let materializer = InventoryMaterializer::new(OutputKeys::default(), "app", "inventory.ini");
//! let clock = SystemClock::new();
//! let sequencer = Sequencer::new(
//!     &terraform,
//!     &ansible,
//!     &materializer,
//!     ReadinessProber::new(&ssh_probe, &clock),
//!     RetryPolicy::default(),
//! );
//! sequencer.execute(&mut run, &mut prompt, &mut NoObserver)?;
//! ```

pub mod engine;
pub mod error;
pub mod gate;
pub mod inventory;
pub mod observer;
pub mod planner;
pub mod prober;
pub mod run;
pub mod sequencer;
pub mod stage;
pub mod types;

#[cfg(test)]
mod testing;

pub use engine::{ConfigurationEngine, InfrastructureEngine};
pub use error::{
    EngineCall, EngineError, Error, ErrorCategory, MaterializeError, Result, StageFailure,
};
pub use gate::{ConfirmationGate, LinePrompt, NoPrompt, OperatorPrompt, is_affirmative};
pub use inventory::{Inventory, InventoryMaterializer, OutputKeys};
pub use observer::{NoObserver, StageObserver};
pub use planner::{Layer, StagePlanner};
pub use prober::{
    Clock, ManualClock, Probe, ReadinessCheck, ReadinessOutcome, ReadinessProber, RetryPolicy,
    SystemClock,
};
pub use run::DeploymentRun;
pub use sequencer::Sequencer;
pub use stage::Stage;
pub use types::{Mode, Outputs, PlanSummary, RunOutcome, StageKind, StageStatus, Target};
