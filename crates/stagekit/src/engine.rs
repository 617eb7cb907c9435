//! Collaborator traits for the two engines the sequencer drives
//!
//! Both engines are treated as synchronous, all-or-nothing black boxes.
//! Implement them over real tools for production, or with recording fakes
//! to verify ordering, gating and retry bounds.

use crate::error::EngineError;
use crate::inventory::Inventory;
use crate::types::{Outputs, PlanSummary};

/// Declarative infrastructure engine (plan / apply / destroy)
pub trait InfrastructureEngine {
    /// Compute the diff for `targets` (all resources when empty) without mutating anything
    fn plan(&self, targets: &[String]) -> Result<PlanSummary, EngineError>;

    /// Converge `targets` (all resources when empty) and return the named outputs
    fn apply(&self, targets: &[String]) -> Result<Outputs, EngineError>;

    /// Tear down every declared resource
    fn destroy(&self) -> Result<(), EngineError>;
}

/// Configuration management engine acting on a live target
pub trait ConfigurationEngine {
    /// Apply idempotent setup tasks to the hosts listed in `inventory`
    fn apply_configuration(&self, inventory: &Inventory) -> Result<(), EngineError>;
}
