use fraudgate_models::{ActiveModel, GridSearchTrainer, ModelArtifact, default_candidates};
use fraudgate_training::{
    FeatureRow, ModelRegistry, NoopProgressSink, PipelineConfig, SyntheticFeatureSource, ThresholdMetric,
    TrainingOrchestrator,
};
use tempfile::TempDir;

#[test]
fn test_quick_pipeline_trains_registers_and_serves() {
    let temp = TempDir::new().unwrap();
    let mut config = PipelineConfig {
        output_root: temp.path().join("runs"),
        registry_dir: temp.path().join("registry"),
        quick_mode: true,
        ..PipelineConfig::default()
    };
    config.threshold.metric = ThresholdMetric::F2;
    let registry = ModelRegistry::open(&config.registry_dir).unwrap();
    let trainer = GridSearchTrainer::default();
    let orchestrator = TrainingOrchestrator::new(&config, &trainer, &registry, &NoopProgressSink);

    let outcome = orchestrator.run(&SyntheticFeatureSource::new(1200, 42), &default_candidates(true)).unwrap();

    assert_eq!(outcome.artifact.candidates.len(), 2);
    for candidate in &outcome.artifact.candidates {
        assert!(candidate.metrics.roc_auc > 0.6, "{} roc_auc {}", candidate.name, candidate.metrics.roc_auc);
        assert!((0.0..=1.0).contains(&candidate.metrics.operating_threshold));
        assert_eq!(candidate.metrics.operating_metric, ThresholdMetric::F2);
    }

    let champion = &outcome.artifact.champion;
    let stored = ModelArtifact::load(&registry.layout().active_model_path()).unwrap();
    assert_eq!(stored.scorer().estimator(), champion.estimator);

    let active = ActiveModel::load(&registry).unwrap();
    assert_eq!(active.version_id(), outcome.version.version_id);
    assert!((active.threshold() - champion.metrics.operating_threshold).abs() < 1e-12);

    let row = FeatureRow::sanitized(9000.0, 7.0, 0.8, 0.7);
    let decision = active.score(&row);
    assert!((decision.probability - champion.scorer.predict_proba(&row)).abs() < 1e-9);
    assert_eq!(decision.is_fraud, decision.probability >= decision.threshold);
}
