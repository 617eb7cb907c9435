//! A single ordered unit of provisioning work

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, StageFailure};
use crate::types::{StageKind, StageStatus};

/// One named step of a deployment run.
///
/// Status and confirmation requirements are plain data so a stage list can be
/// built, inspected and tested without touching any engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub order: u32,
    pub kind: StageKind,
    pub status: StageStatus,
    pub requires_confirmation: bool,
    /// Resource addresses the infrastructure engine is limited to; empty means the whole graph
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    /// Short human-readable result (plan summary, skip reason, warning)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

impl Stage {
    pub fn new(name: impl Into<String>, order: u32, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            order,
            kind,
            status: StageStatus::Pending,
            requires_confirmation: false,
            targets: Vec::new(),
            detail: None,
            failure: None,
        }
    }

    pub fn with_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(StageStatus::Pending, StageStatus::Running)
    }

    pub fn succeed(&mut self, detail: Option<String>) -> Result<()> {
        self.transition(StageStatus::Running, StageStatus::Succeeded)?;
        self.detail = detail;
        Ok(())
    }

    pub fn fail(&mut self, failure: StageFailure) -> Result<()> {
        self.transition(StageStatus::Running, StageStatus::Failed)?;
        self.detail = Some(failure.message.clone());
        self.failure = Some(failure);
        Ok(())
    }

    /// Skip a stage that never started
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(StageStatus::Pending, StageStatus::Skipped)?;
        self.detail = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, expected: StageStatus, to: StageStatus) -> Result<()> {
        if self.status != expected {
            return Err(Error::InvalidTransition {
                name: self.name.clone(),
                from: self.status,
                to,
            });
        }
        log::debug!("stage '{}': {} -> {}", self.name, self.status, to);
        self.status = to;
        Ok(())
    }
}
