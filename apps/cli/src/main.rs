//! Fraudgate CLI - train fraud models and manage the model registry
//!
//! Provides the `fraudgate` command: `train`, `registry list|activate|rollback`
//! and `score`.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{RegistryArgs, ScoreArgs, TrainArgs, registry, score, train};

/// Fraudgate - fraud model training and deployment
#[derive(Parser, Debug)]
#[command(name = "fraudgate", author, version, about = "Fraudgate - fraud model training and registry management")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Pipeline configuration file (TOML). Flags override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train candidate models, write run reports and register the champion
    Train(TrainArgs),

    /// Inspect and manage registered model versions
    Registry(RegistryArgs),

    /// Score one transaction with the active model
    Score(ScoreArgs),
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // logs go to stderr so JSON on stdout stays parseable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = commands::load_pipeline_config(args.config.as_deref())?;

    match args.command {
        Command::Train(train_args) => train::execute(train_args, config),
        Command::Registry(registry_args) => registry::execute(registry_args, &config),
        Command::Score(score_args) => score::execute(score_args, &config),
    }
}
