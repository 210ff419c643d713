//! Registry command implementation.

use anyhow::{Context, Result};
use fraudgate_training::PipelineConfig;

use super::open_registry;
use super::types::{RegistryArgs, RegistryCommand};

pub fn execute(args: RegistryArgs, config: &PipelineConfig) -> Result<()> {
    let registry = open_registry(args.registry_dir, config)?;

    let output = match args.command {
        RegistryCommand::List => serde_json::to_value(registry.list()?)?,
        RegistryCommand::Activate { version } => {
            let entry = registry.activate(&version).with_context(|| format!("Failed to activate {version}"))?;
            serde_json::json!({ "activated": entry.version_id })
        }
        RegistryCommand::Rollback { steps } => {
            let entry = registry.rollback(steps).context("Rollback failed")?;
            serde_json::json!({ "rolled_back_to": entry.version_id })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
