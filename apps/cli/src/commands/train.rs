//! Train command implementation.
//!
//! Resolves the pipeline configuration (flags over config file over defaults),
//! runs the training orchestrator with the grid-search backend and prints the
//! outcome.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use fraudgate_models::{GridSearchTrainer, default_candidates};
use fraudgate_training::{
    CsvFeatureSource, FeatureSource, ModelRegistry, NoopProgressSink, PipelineConfig, ProgressSink, RunOutcome,
    StdoutProgressSink, SyntheticFeatureSource, TrainingOrchestrator,
};

use super::types::TrainArgs;

pub fn execute(args: TrainArgs, config: PipelineConfig) -> Result<()> {
    let config = apply_overrides(config, &args);

    let source: Box<dyn FeatureSource> = match (args.synthetic, &config.dataset) {
        (Some(size), _) => Box::new(SyntheticFeatureSource::new(size, config.split.random_state)),
        (None, Some(path)) => Box::new(CsvFeatureSource::new(path.clone(), config.target_column.clone())),
        (None, None) => bail!("No dataset given: pass --dataset <path>, --synthetic <N>, or set `dataset` in the config"),
    };

    let candidates = if config.candidates.is_empty() {
        default_candidates(config.quick_mode)
    } else {
        config.candidates.clone()
    };

    let registry = ModelRegistry::open(&config.registry_dir)
        .with_context(|| format!("Failed to open model registry at {}", config.registry_dir.display()))?;
    let trainer = GridSearchTrainer::default();
    let progress: &dyn ProgressSink = if args.json { &NoopProgressSink } else { &StdoutProgressSink };

    tracing::info!(
        dataset = %source.describe(),
        candidates = candidates.len(),
        quick = config.quick_mode,
        "starting training run"
    );

    let outcome = TrainingOrchestrator::new(&config, &trainer, &registry, progress)
        .run(source.as_ref(), &candidates)
        .context("Training run failed")?;

    if args.json {
        display_json(&outcome)
    } else {
        display_human(&outcome);
        Ok(())
    }
}

fn apply_overrides(mut config: PipelineConfig, args: &TrainArgs) -> PipelineConfig {
    if let Some(dataset) = &args.dataset {
        config.dataset = Some(dataset.clone());
    }
    if let Some(target) = &args.target_column {
        config.target_column = Some(target.clone());
    }
    if let Some(output_root) = &args.output_root {
        config.output_root.clone_from(output_root);
    }
    if let Some(registry_dir) = &args.registry_dir {
        config.registry_dir.clone_from(registry_dir);
    }
    if let Some(deploy) = &args.deploy_model_path {
        config.deploy_model_path = Some(deploy.clone());
    }
    if args.quick {
        config.quick_mode = true;
    }
    if let Some(test_size) = args.test_size {
        config.split.test_size = test_size;
    }
    if let Some(random_state) = args.random_state {
        config.split.random_state = random_state;
    }
    if let Some(metric) = args.threshold_metric {
        config.threshold.metric = metric;
    }
    if let Some(min_precision) = args.min_precision {
        config.threshold.min_precision = min_precision;
    }
    if let Some(min_recall) = args.min_recall {
        config.threshold.min_recall = min_recall;
    }
    config
}

fn display_json(outcome: &RunOutcome) -> Result<()> {
    let output = serde_json::json!({
        "run_id": outcome.artifact.run_id.to_string(),
        "run_directory": outcome.artifact.run_directory,
        "version": outcome.version,
        "deployed_to": outcome.deployed_to,
        "summary": outcome.summary,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn display_human(outcome: &RunOutcome) {
    let champion = &outcome.artifact.champion;
    let metrics = &champion.metrics;

    println!();
    println!("{}", "Training complete".bold().green());
    println!();
    println!("  {} {}", "Run:".bold(), outcome.artifact.run_id);
    println!("  {} {}", "Reports:".bold(), outcome.artifact.run_directory.display());
    println!();
    println!("  {}", "Candidates".bold().cyan());
    for candidate in &outcome.artifact.candidates {
        let marker = if candidate.name == champion.name { "*".green() } else { " ".normal() };
        println!(
            "  {} {:<24} f1={:.4} roc_auc={:.4} pr_auc={:.4}",
            marker, candidate.name, candidate.metrics.f1, candidate.metrics.roc_auc, candidate.metrics.pr_auc
        );
    }
    println!();
    println!("  {} {}", "Champion:".bold(), champion.name.green());
    println!(
        "  {} {:.4} ({} = {:.4})",
        "Threshold:".bold(),
        metrics.operating_threshold,
        metrics.operating_metric.as_str(),
        metrics.operating_metric_score
    );
    println!("  {} {} {}", "Registered:".bold(), outcome.version.version_id.green(), "(active)".dimmed());
    if let Some(deployed) = &outcome.deployed_to {
        println!("  {} {}", "Deployed:".bold(), deployed.display());
    }
    println!();
}
