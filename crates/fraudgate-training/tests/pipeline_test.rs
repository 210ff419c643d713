use fraudgate_training::{
    CandidateSpec, FeatureMetadata, FeatureRow, FeatureSource, FittedScorer, Hyperparameters, LabeledFeatures,
    ModelRegistry, ModelTrainer, NoopProgressSink, PipelineConfig, SearchOutcome, SyntheticFeatureSource,
    TrainingError, TrainingOrchestrator, TrainingResult,
};
use std::path::Path;
use tempfile::TempDir;

/// Scores rows with a fixed linear combination of the risk features.
#[derive(Debug)]
struct WeightedRisk {
    estimator: String,
    location_weight: f64,
    merchant_weight: f64,
}

impl FittedScorer for WeightedRisk {
    fn estimator(&self) -> &str {
        &self.estimator
    }

    fn predict_proba(&self, row: &FeatureRow) -> f64 {
        (row.location_risk * self.location_weight + row.merchant_risk * self.merchant_weight).clamp(0.0, 1.0)
    }

    fn to_artifact_json(&self) -> TrainingResult<serde_json::Value> {
        Ok(serde_json::json!({
            "estimator": self.estimator,
            "location_weight": self.location_weight,
            "merchant_weight": self.merchant_weight,
        }))
    }
}

/// "risk" candidates score by risk features; "constant" scores everything 0.5.
struct StubTrainer;

impl ModelTrainer for StubTrainer {
    fn id(&self) -> &'static str {
        "stub"
    }

    fn fit_search(&self, spec: &CandidateSpec, _train: &LabeledFeatures) -> TrainingResult<SearchOutcome> {
        let scorer: Box<dyn FittedScorer> = match spec.estimator.as_str() {
            "risk" => Box::new(WeightedRisk { estimator: spec.estimator.clone(), location_weight: 0.5, merchant_weight: 0.5 }),
            "constant" => Box::new(Constant),
            other => return Err(TrainingError::Trainer(format!("unsupported estimator '{other}'"))),
        };
        let mut best = Hyperparameters::new();
        best.insert("weight".to_string(), serde_json::json!(0.5));
        Ok(SearchOutcome { scorer, best_hyperparameters: best, cv_best_roc_auc: 0.5 })
    }
}

#[derive(Debug)]
struct Constant;

impl FittedScorer for Constant {
    fn estimator(&self) -> &str {
        "constant"
    }

    fn predict_proba(&self, _row: &FeatureRow) -> f64 {
        0.5
    }

    fn to_artifact_json(&self) -> TrainingResult<serde_json::Value> {
        Ok(serde_json::json!({"estimator": "constant"}))
    }
}

struct SingleClassSource;

impl FeatureSource for SingleClassSource {
    fn describe(&self) -> String {
        "single-class".to_string()
    }

    fn load(&self) -> TrainingResult<(LabeledFeatures, FeatureMetadata)> {
        let rows = (0..10).map(|i| FeatureRow::sanitized(f64::from(i), 1.0, 0.1, 0.2)).collect();
        let data = LabeledFeatures::new(rows, vec![0; 10])?;
        let metadata = FeatureMetadata {
            source_schema: "inference_features".to_string(),
            source_columns: vec![],
            feature_columns: vec![],
            target_column: "is_fraud".to_string(),
            row_count: data.len(),
            positive_class_ratio: 0.0,
        };
        Ok((data, metadata))
    }
}

fn candidates(estimators: &[(&str, &str)]) -> Vec<CandidateSpec> {
    estimators
        .iter()
        .map(|(name, estimator)| CandidateSpec {
            name: (*name).to_string(),
            estimator: (*estimator).to_string(),
            param_grid: Default::default(),
        })
        .collect()
}

fn config_in(root: &Path) -> PipelineConfig {
    PipelineConfig {
        output_root: root.join("runs"),
        registry_dir: root.join("registry"),
        ..PipelineConfig::default()
    }
}

fn run_dirs(root: &Path) -> usize {
    std::fs::read_dir(root.join("runs")).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn test_pipeline_registers_champion_and_writes_reports() {
    let temp = TempDir::new().unwrap();
    let mut config = config_in(temp.path());
    config.deploy_model_path = Some(temp.path().join("deploy").join("model.json"));
    let registry = ModelRegistry::open(&config.registry_dir).unwrap();
    let orchestrator = TrainingOrchestrator::new(&config, &StubTrainer, &registry, &NoopProgressSink);

    let outcome = orchestrator
        .run(&SyntheticFeatureSource::new(600, 7), &candidates(&[("constant", "constant"), ("risk_sum", "risk")]))
        .unwrap();

    assert_eq!(outcome.artifact.champion.name, "risk_sum");
    assert_eq!(outcome.artifact.candidates.len(), 2);
    assert_eq!(outcome.version.version_id, "v1");

    let run_dir = &outcome.artifact.run_directory;
    for file in [
        "reports/metrics.json",
        "reports/training_summary.md",
        "reports/model_comparison.csv",
        "reports/threshold_analysis.csv",
        "reports/confusion_matrix.csv",
        "artifacts/model.json",
    ] {
        assert!(run_dir.join(file).is_file(), "missing {file}");
    }

    let metrics: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("reports/metrics.json")).unwrap()).unwrap();
    assert_eq!(metrics["champion_model"]["name"], "risk_sum");
    assert_eq!(metrics["candidate_models"][0]["model"], "risk_sum");
    assert_eq!(metrics["selection_criteria"]["ranking"], serde_json::json!(["f1", "roc_auc", "pr_auc"]));
    assert_eq!(metrics["feature_metadata"]["source_schema"], "synthetic");

    let state = registry.list().unwrap();
    assert_eq!(state.active_version.as_deref(), Some("v1"));
    let active_meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(registry.layout().active_metadata_path()).unwrap()).unwrap();
    assert_eq!(active_meta["model_name"], "risk_sum");
    assert_eq!(active_meta["operating_threshold"], metrics["champion_model"]["metrics"]["operating_threshold"]);
    assert!(active_meta["run_summary"]["run_id"].is_string());

    let digest = metrics["champion_artifact"]["sha256"].as_str().unwrap();
    assert_eq!(digest.len(), 64);
    assert_eq!(active_meta["model_sha256"], digest);
    let markdown = std::fs::read_to_string(run_dir.join("reports/training_summary.md")).unwrap();
    assert!(markdown.contains(&format!("- Champion model sha256: {digest}")));
    assert!(markdown.contains("- Best params: `{"));

    let deployed = outcome.deployed_to.unwrap();
    assert_eq!(
        std::fs::read(&deployed).unwrap(),
        std::fs::read(registry.layout().active_model_path()).unwrap()
    );
}

#[test]
fn test_single_class_labels_fail_before_any_output() {
    let temp = TempDir::new().unwrap();
    let config = config_in(temp.path());
    let registry = ModelRegistry::open(&config.registry_dir).unwrap();
    let orchestrator = TrainingOrchestrator::new(&config, &StubTrainer, &registry, &NoopProgressSink);

    let err = orchestrator.run(&SingleClassSource, &candidates(&[("risk_sum", "risk")])).unwrap_err();

    assert!(matches!(err, TrainingError::Validation(_)));
    assert!(registry.list().unwrap().versions.is_empty());
    assert_eq!(run_dirs(temp.path()), 0);
}

#[test]
fn test_trainer_failure_leaves_registry_untouched() {
    let temp = TempDir::new().unwrap();
    let config = config_in(temp.path());
    let registry = ModelRegistry::open(&config.registry_dir).unwrap();
    let orchestrator = TrainingOrchestrator::new(&config, &StubTrainer, &registry, &NoopProgressSink);
    let source = SyntheticFeatureSource::new(300, 11);
    orchestrator.run(&source, &candidates(&[("risk_sum", "risk")])).unwrap();
    let before = registry.list().unwrap();

    let err = orchestrator.run(&source, &candidates(&[("risk_sum", "risk"), ("svm", "svm")])).unwrap_err();

    assert!(matches!(err, TrainingError::Trainer(_)));
    assert_eq!(registry.list().unwrap(), before);
}

#[test]
fn test_repeated_runs_get_fresh_directories_and_versions() {
    let temp = TempDir::new().unwrap();
    let config = config_in(temp.path());
    let registry = ModelRegistry::open(&config.registry_dir).unwrap();
    let orchestrator = TrainingOrchestrator::new(&config, &StubTrainer, &registry, &NoopProgressSink);
    let source = SyntheticFeatureSource::new(300, 3);
    let specs = candidates(&[("risk_sum", "risk")]);

    let first = orchestrator.run(&source, &specs).unwrap();
    let second = orchestrator.run(&source, &specs).unwrap();

    assert_ne!(first.artifact.run_directory, second.artifact.run_directory);
    assert_eq!(run_dirs(temp.path()), 2);
    assert_eq!(second.version.version_id, "v2");
    assert_eq!(registry.list().unwrap().active_version.as_deref(), Some("v2"));
}

#[test]
fn test_empty_candidate_list_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = config_in(temp.path());
    let registry = ModelRegistry::open(&config.registry_dir).unwrap();
    let orchestrator = TrainingOrchestrator::new(&config, &StubTrainer, &registry, &NoopProgressSink);

    let err = orchestrator.run(&SyntheticFeatureSource::new(100, 1), &[]).unwrap_err();
    assert!(matches!(err, TrainingError::Validation(_)));
}
