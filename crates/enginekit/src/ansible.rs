//! Ansible as the configuration engine.

use std::path::PathBuf;

use stagekit::{ConfigurationEngine, EngineError, Inventory};

use crate::command::Invocation;

/// `ansible-playbook` adapter
#[derive(Debug, Clone)]
pub struct Ansible {
    binary: PathBuf,
    playbook: PathBuf,
    extra_args: Vec<String>,
    ssh_retries: u32,
    stream: bool,
}

impl Ansible {
    pub fn new(binary: impl Into<PathBuf>, playbook: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            playbook: playbook.into(),
            extra_args: Vec::new(),
            ssh_retries: 3,
            stream: false,
        }
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Connection retries Ansible makes on its own, independent of the
    /// readiness wait in front of it
    pub fn with_ssh_retries(mut self, retries: u32) -> Self {
        self.ssh_retries = retries;
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn invocation(&self, inventory: &Inventory) -> Invocation {
        Invocation::new(&self.binary)
            .arg("-i")
            .arg(&inventory.path)
            .arg(&self.playbook)
            .args(&self.extra_args)
            .env("ANSIBLE_SSH_RETRIES", self.ssh_retries.to_string())
            .env("ANSIBLE_HOST_KEY_CHECKING", "False")
            .env("ANSIBLE_NOCOLOR", "1")
            .stream(self.stream)
    }
}

impl ConfigurationEngine for Ansible {
    fn apply_configuration(&self, inventory: &Inventory) -> Result<(), EngineError> {
        log::info!(
            "applying {} to {}",
            self.playbook.display(),
            inventory.target()
        );
        self.invocation(inventory).checked()?;
        Ok(())
    }
}
