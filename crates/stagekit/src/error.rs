//! Error types for staged provisioning.
//!
//! Engine failures are categorized so the operator always gets a root-cause
//! hint next to the stage name and the engine call that failed. Recovery is
//! never automatic: every suggestion ends with a fresh invocation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::StageStatus;

/// Root-cause categories of an engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    /// Provider credentials missing, expired or rejected
    Credentials,
    /// Connectivity to the provider or target
    Network,
    /// Provider quota or limit reached
    Quota,
    /// The provisioned target never answered
    Unreachable,
    /// Anything else
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Credentials => "Credential problem",
            Self::Network => "Network connectivity issue",
            Self::Quota => "Provider quota exceeded",
            Self::Unreachable => "Target unreachable",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Credentials => "Refresh or export valid provider credentials",
            Self::Network => "Check your connection to the provider",
            Self::Quota => "Request a quota increase or free up resources",
            Self::Unreachable => "Check the access rules and that the target finished booting",
            Self::Other => "Check the engine output above for details",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Failure reported by an infrastructure or configuration engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("credentials rejected: {message}")]
    Credentials { message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("quota exceeded: {message}")]
    Quota { message: String },

    #[error("target unreachable: {message}")]
    Unreachable { message: String },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Get the root-cause category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Credentials { .. } => ErrorCategory::Credentials,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Quota { .. } => ErrorCategory::Quota,
            Self::Unreachable { .. } => ErrorCategory::Unreachable,
            _ => ErrorCategory::Other,
        }
    }
}

/// Failure to turn engine outputs into an inventory
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("required output '{key}' is missing from the infrastructure outputs")]
    MissingOutput { key: String },

    #[error("required output '{key}' is empty")]
    EmptyOutput { key: String },

    #[error("failed to write inventory to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The collaborator call a stage was making when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineCall {
    Plan,
    Apply,
    Destroy,
    ResolveTarget,
    MaterializeInventory,
    ApplyConfiguration,
}

impl fmt::Display for EngineCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plan => "plan()",
            Self::Apply => "apply()",
            Self::Destroy => "destroy()",
            Self::ResolveTarget => "resolve target",
            Self::MaterializeInventory => "materialize inventory",
            Self::ApplyConfiguration => "apply_configuration()",
        };
        f.write_str(s)
    }
}

/// Why a stage failed, recorded on the stage itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: String,
    pub call: EngineCall,
    pub category: ErrorCategory,
    pub message: String,
}

impl StageFailure {
    pub fn from_engine(stage: &str, call: EngineCall, error: &EngineError) -> Self {
        Self {
            stage: stage.to_string(),
            call,
            category: error.category(),
            message: error.to_string(),
        }
    }

    pub fn from_materialize(stage: &str, call: EngineCall, error: &MaterializeError) -> Self {
        Self {
            stage: stage.to_string(),
            call,
            category: ErrorCategory::Other,
            message: error.to_string(),
        }
    }

    /// Operator-facing next step
    pub fn suggestion(&self) -> String {
        format!(
            "{}, then re-run the same command; completed stages are idempotent and will not be applied twice",
            self.category.advice()
        )
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage '{}' failed during {}: {}",
            self.stage, self.call, self.message
        )
    }
}

/// Errors raised by the orchestrator itself
#[derive(Debug, Error)]
pub enum Error {
    #[error("stage order must be strictly increasing: '{name}' has order {order} after {previous}")]
    InvalidStageOrder {
        name: String,
        order: u32,
        previous: u32,
    },

    #[error("stage '{name}' cannot move from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: StageStatus,
        to: StageStatus,
    },

    #[error("stage '{name}' cannot start: '{blocking}' is {status}")]
    OrderingViolation {
        name: String,
        blocking: String,
        status: StageStatus,
    },

    #[error("confirmation failed: {0}")]
    Confirmation(#[source] std::io::Error),

    #[error("run is already finished ({0})")]
    AlreadyFinished(crate::types::RunOutcome),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_category() {
        let err = EngineError::Quota {
            message: "VcpuLimitExceeded".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Quota);

        let err = EngineError::CommandFailed {
            command: "terraform apply".into(),
            stderr: "boom".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Other);
    }

    #[test]
    fn test_stage_failure_names_stage_and_call() {
        let err = EngineError::Credentials {
            message: "token expired".into(),
        };
        let failure = StageFailure::from_engine("apply-network", EngineCall::Apply, &err);

        let rendered = failure.to_string();
        assert!(rendered.contains("apply-network"));
        assert!(rendered.contains("apply()"));
        assert!(failure.suggestion().contains("re-run"));
        assert!(failure.suggestion().starts_with("Refresh"));
    }
}
