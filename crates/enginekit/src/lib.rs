//! # enginekit
//!
//! Real collaborators for [`stagekit`]: Terraform as the infrastructure
//! engine, `ansible-playbook` as the configuration engine, and TCP/SSH
//! liveness probes for the readiness wait.
//!
//! All engines shell out and block until the command exits. A non-zero exit
//! is classified from stderr into a [`stagekit::EngineError`] category so the
//! operator gets a root cause and a fix, not just an exit code.

pub mod ansible;
pub mod classify;
pub mod command;
pub mod probe;
pub mod terraform;

use std::path::{Path, PathBuf};

pub use ansible::Ansible;
pub use classify::{classify, summarize};
pub use command::{CommandOutput, Invocation};
pub use probe::{SshProbe, TcpProbe};
pub use terraform::{Terraform, parse_outputs, parse_plan_summary};

/// Resolve an engine binary: explicit paths must exist, bare names are
/// looked up in `PATH`.
pub fn locate(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        return binary.is_file().then(|| binary.to_path_buf());
    }
    which::which(binary).ok()
}
