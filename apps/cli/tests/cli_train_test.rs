//! Integration tests for `fraudgate train` and the train-then-serve flow.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn fraudgate() -> Command {
    Command::cargo_bin("fraudgate").unwrap()
}

fn train_synthetic(temp: &Path, rows: &str) -> serde_json::Value {
    let output = fraudgate()
        .args(["train", "--quick", "--json", "--synthetic", rows, "--output-root"])
        .arg(temp.join("runs"))
        .arg("--registry-dir")
        .arg(temp.join("registry"))
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Deterministic table where fraud follows location and merchant risk.
fn write_dataset(path: &Path) {
    let mut body = String::from("Amount,transaction_frequency,location_risk,merchant_risk,is_fraud\n");
    for i in 0..400_u32 {
        let amount = f64::from((i * 37) % 1000);
        let frequency = i % 10;
        let location = f64::from((i * 13) % 100) / 100.0;
        let merchant = f64::from((i * 7) % 100) / 100.0;
        let label = u8::from(location + merchant > 1.2);
        writeln!(body, "{amount},{frequency},{location},{merchant},{label}").unwrap();
    }
    fs::write(path, body).unwrap();
}

#[test]
fn test_train_requires_dataset() {
    let temp_dir = TempDir::new().unwrap();

    fraudgate()
        .args(["train", "--registry-dir"])
        .arg(temp_dir.path().join("registry"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No dataset given"));
}

#[test]
fn test_train_rejects_dataset_with_synthetic() {
    fraudgate()
        .args(["train", "--dataset", "data.csv", "--synthetic", "100"])
        .assert()
        .failure();
}

#[test]
fn test_train_missing_dataset_fails_without_registering() {
    let temp_dir = TempDir::new().unwrap();
    let registry_dir = temp_dir.path().join("registry");

    fraudgate()
        .args(["train", "--quick", "--dataset"])
        .arg(temp_dir.path().join("missing.csv"))
        .arg("--registry-dir")
        .arg(&registry_dir)
        .arg("--output-root")
        .arg(temp_dir.path().join("runs"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("dataset not found"));

    let registry: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(registry_dir.join("registry.json")).unwrap()).unwrap();
    assert_eq!(registry["versions"], serde_json::json!([]));
    assert!(!temp_dir.path().join("runs").exists());
}

#[test]
fn test_train_synthetic_then_score() {
    let temp_dir = TempDir::new().unwrap();
    let result = train_synthetic(temp_dir.path(), "800");

    assert_eq!(result["version"]["version_id"], "v1");
    let run_dir = Path::new(result["run_directory"].as_str().unwrap());
    assert!(run_dir.join("reports").join("metrics.json").exists());
    assert!(run_dir.join("reports").join("model_comparison.csv").exists());
    assert_eq!(result["summary"]["candidate_models"].as_array().unwrap().len(), 2);

    let output = fraudgate()
        .args([
            "score",
            "--amount",
            "4500",
            "--transaction-frequency",
            "6",
            "--location-risk",
            "0.9",
            "--merchant-risk",
            "0.8",
            "--registry-dir",
        ])
        .arg(temp_dir.path().join("registry"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let decision: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(decision["model_version"], "v1");
    let probability = decision["probability"].as_f64().unwrap();
    let threshold = decision["threshold"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&probability));
    assert_eq!(decision["is_fraud"].as_bool().unwrap(), probability >= threshold);
}

#[test]
fn test_second_run_registers_v2_and_rollback_restores_v1() {
    let temp_dir = TempDir::new().unwrap();
    let registry_dir = temp_dir.path().join("registry");
    train_synthetic(temp_dir.path(), "800");
    let second = train_synthetic(temp_dir.path(), "800");
    assert_eq!(second["version"]["version_id"], "v2");

    fraudgate()
        .args(["registry", "rollback", "--steps", "1", "--registry-dir"])
        .arg(&registry_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rolled_back_to\": \"v1\""));

    fraudgate()
        .args(["registry", "activate", "--version", "v2", "--registry-dir"])
        .arg(&registry_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"activated\": \"v2\""));

    fraudgate()
        .args(["registry", "rollback", "--steps", "2", "--registry-dir"])
        .arg(&registry_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_train_from_csv_with_deploy_path() {
    let temp_dir = TempDir::new().unwrap();
    let dataset = temp_dir.path().join("transactions.csv");
    write_dataset(&dataset);
    let deploy = temp_dir.path().join("deploy").join("model.json");

    fraudgate()
        .args(["train", "--quick", "--threshold-metric", "f2", "--dataset"])
        .arg(&dataset)
        .arg("--output-root")
        .arg(temp_dir.path().join("runs"))
        .arg("--registry-dir")
        .arg(temp_dir.path().join("registry"))
        .arg("--deploy-model-path")
        .arg(&deploy)
        .assert()
        .success()
        .stdout(predicate::str::contains("Training complete"))
        .stdout(predicate::str::contains("f2"));

    assert!(deploy.exists());
    assert!(temp_dir.path().join("registry").join("active").join("model.json").exists());
}
