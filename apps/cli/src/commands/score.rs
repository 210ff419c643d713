use anyhow::{Context, Result};
use fraudgate_models::ActiveModel;
use fraudgate_training::{FeatureRow, PipelineConfig};

use super::open_registry;
use super::types::ScoreArgs;

/// Score one transaction against the active version and print the decision as JSON.
pub fn execute(args: ScoreArgs, config: &PipelineConfig) -> Result<()> {
    let registry = open_registry(args.registry_dir, config)?;
    let model = ActiveModel::load(&registry).context("Failed to load the active model")?;

    let row = FeatureRow::sanitized(args.amount, args.transaction_frequency, args.location_risk, args.merchant_risk);
    let decision = model.score(&row);

    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
