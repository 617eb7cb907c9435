//! Inventory materialization - bridge from infrastructure outputs to configuration input

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::MaterializeError;
use crate::types::{Outputs, Target};

/// Names of the infrastructure outputs the materializer reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputKeys {
    pub host: String,
    pub principal: String,
    pub credential: String,
}

impl Default for OutputKeys {
    fn default() -> Self {
        Self {
            host: "instance_public_ip".to_string(),
            principal: "admin_username".to_string(),
            credential: "ssh_private_key_path".to_string(),
        }
    }
}

impl OutputKeys {
    /// Resolve the host/principal pair without writing anything
    pub fn target(&self, outputs: &Outputs) -> Result<Target, MaterializeError> {
        Ok(Target {
            host: require(outputs, &self.host)?,
            principal: require(outputs, &self.principal)?,
        })
    }
}

fn require(outputs: &Outputs, key: &str) -> Result<String, MaterializeError> {
    let value = outputs
        .get(key)
        .ok_or_else(|| MaterializeError::MissingOutput {
            key: key.to_string(),
        })?;

    let value = value.trim();
    if value.is_empty() {
        return Err(MaterializeError::EmptyOutput {
            key: key.to_string(),
        });
    }
    Ok(value.to_string())
}

/// The record set telling the configuration engine what to act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub host: String,
    pub principal: String,
    pub credential_reference: String,
    pub group: String,
    /// Where the rendered inventory was written
    pub path: PathBuf,
}

impl Inventory {
    pub fn target(&self) -> Target {
        Target {
            host: self.host.clone(),
            principal: self.principal.clone(),
        }
    }

    /// Render as an INI inventory, one host line per managed target
    pub fn render(&self) -> String {
        format!(
            "# Generated by stackup from infrastructure outputs.\n\
             # Rewritten on every run; do not edit.\n\
             [{group}]\n\
             {host} ansible_user={principal} ansible_ssh_private_key_file={credential}\n",
            group = self.group,
            host = ini_value(&self.host),
            principal = ini_value(&self.principal),
            credential = ini_value(&self.credential_reference),
        )
    }
}

/// Quote a host-line value when Ansible's shell-style splitting would break it
fn ini_value(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '#' | ';' | '='));
    if plain {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Builds a fresh inventory from the current outputs on every call
#[derive(Debug, Clone)]
pub struct InventoryMaterializer {
    keys: OutputKeys,
    group: String,
    path: PathBuf,
}

impl InventoryMaterializer {
    pub fn new(keys: OutputKeys, group: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            keys,
            group: group.into(),
            path: path.into(),
        }
    }

    pub fn keys(&self) -> &OutputKeys {
        &self.keys
    }

    /// Build the inventory and overwrite the inventory file.
    ///
    /// Any required output that is absent or blank is an error; a previously
    /// written file is never read back.
    pub fn materialize(&self, outputs: &Outputs) -> Result<Inventory, MaterializeError> {
        let target = self.keys.target(outputs)?;
        let credential_reference = require(outputs, &self.keys.credential)?;

        let inventory = Inventory {
            host: target.host,
            principal: target.principal,
            credential_reference,
            group: self.group.clone(),
            path: self.path.clone(),
        };

        self.write(&inventory)?;
        log::info!(
            "materialized inventory for {} at {}",
            inventory.target(),
            self.path.display()
        );
        Ok(inventory)
    }

    fn write(&self, inventory: &Inventory) -> Result<(), MaterializeError> {
        let to_write_err = |source| MaterializeError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(to_write_err)?;
        }
        fs::write(&self.path, inventory.render()).map_err(to_write_err)
    }
}
