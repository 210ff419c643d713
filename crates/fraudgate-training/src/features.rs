//! Feature contract shared by training and serving, plus the two feature
//! sources the pipeline ships with.
//!
//! Rows arrive sanitized: `amount >= 0`, `transaction_frequency` in
//! `[0, 10000]`, and both risk scores in `[0, 1]`.

use crate::error::{TrainingError, TrainingResult};
use rand::SeedableRng;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, Gamma, Poisson};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const FEATURE_COLUMNS: [&str; 4] = ["amount", "transaction_frequency", "location_risk", "merchant_risk"];

pub const DEFAULT_TARGET_CANDIDATES: [&str; 5] = ["is_fraud", "label", "class", "Class", "target"];

pub const MAX_TRANSACTION_FREQUENCY: u32 = 10_000;

/// One sanitized transaction feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub amount: f64,
    pub transaction_frequency: u32,
    pub location_risk: f64,
    pub merchant_risk: f64,
}

impl FeatureRow {
    /// Build a row, clipping every field into its documented range.
    #[must_use]
    pub fn sanitized(amount: f64, transaction_frequency: f64, location_risk: f64, merchant_risk: f64) -> Self {
        Self {
            amount: sanitize_amount(amount),
            transaction_frequency: sanitize_frequency(transaction_frequency),
            location_risk: sanitize_probability(location_risk),
            merchant_risk: sanitize_probability(merchant_risk),
        }
    }

    /// Feature vector in `FEATURE_COLUMNS` order.
    #[must_use]
    pub fn to_vector(&self) -> [f64; 4] {
        [
            self.amount,
            f64::from(self.transaction_frequency),
            self.location_risk,
            self.merchant_risk,
        ]
    }
}

/// Feature rows with aligned binary labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledFeatures {
    pub rows: Vec<FeatureRow>,
    pub labels: Vec<u8>,
}

impl LabeledFeatures {
    pub fn new(rows: Vec<FeatureRow>, labels: Vec<u8>) -> TrainingResult<Self> {
        if rows.len() != labels.len() {
            return Err(TrainingError::Validation(format!(
                "feature rows ({}) and labels ({}) are not aligned",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|l| **l > 1) {
            return Err(TrainingError::Validation(format!("labels must be 0 or 1, got {bad}")));
        }
        Ok(Self { rows, labels })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct label values present.
    #[must_use]
    pub fn class_count(&self) -> usize {
        let has_neg = self.labels.contains(&0);
        let has_pos = self.labels.contains(&1);
        usize::from(has_neg) + usize::from(has_pos)
    }

    #[must_use]
    pub fn positive_class_ratio(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        let positives = self.labels.iter().filter(|l| **l == 1).count();
        positives as f64 / self.labels.len() as f64
    }

    /// Subset by row index, preserving the given order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|i| self.rows[*i]).collect(),
            labels: indices.iter().map(|i| self.labels[*i]).collect(),
        }
    }
}

/// Provenance of a loaded feature table, persisted in every run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    pub source_schema: String,
    pub source_columns: Vec<String>,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub row_count: usize,
    pub positive_class_ratio: f64,
}

/// Supplies sanitized features and aligned labels to the pipeline.
pub trait FeatureSource {
    /// Human readable description (dataset path, generator seed, ...).
    fn describe(&self) -> String;

    fn load(&self) -> TrainingResult<(LabeledFeatures, FeatureMetadata)>;
}

fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

fn sanitize_frequency(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().clamp(0.0, f64::from(MAX_TRANSACTION_FREQUENCY)) as u32
}

fn sanitize_probability(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_number(raw: &str) -> f64 {
    parse_finite(raw).unwrap_or(0.0)
}

fn parse_label(raw: &str) -> u8 {
    let value = parse_number(raw).trunc();
    if value >= 1.0 { 1 } else { 0 }
}

/// Reads a headered CSV with the four inference features and a label column.
#[derive(Debug, Clone)]
pub struct CsvFeatureSource {
    path: PathBuf,
    target_column: Option<String>,
}

impl CsvFeatureSource {
    #[must_use]
    pub fn new(path: PathBuf, target_column: Option<String>) -> Self {
        Self { path, target_column }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve_target(&self, headers: &[String]) -> TrainingResult<usize> {
        if let Some(target) = &self.target_column {
            return headers.iter().position(|h| h == target).ok_or_else(|| {
                TrainingError::Validation(format!("target column '{target}' not found in dataset"))
            });
        }

        DEFAULT_TARGET_CANDIDATES
            .iter()
            .find_map(|candidate| headers.iter().position(|h| h == candidate))
            .ok_or_else(|| {
                TrainingError::Validation(format!(
                    "unable to infer target column; provide one explicitly or include one of: {}",
                    DEFAULT_TARGET_CANDIDATES.join(", ")
                ))
            })
    }
}

impl FeatureSource for CsvFeatureSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    /// Uses the four inference columns when present; otherwise derives them
    /// from raw credit-card columns (`Amount`, optional `Time`, `V*`).
    fn load(&self) -> TrainingResult<(LabeledFeatures, FeatureMetadata)> {
        if !self.path.exists() {
            return Err(TrainingError::NotFound(format!("dataset not found at {}", self.path.display())));
        }

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(&self.path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        if records.is_empty() {
            return Err(TrainingError::Validation("training dataset is empty".to_string()));
        }
        let target_idx = self.resolve_target(&headers)?;

        let by_lower: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != target_idx)
            .map(|(idx, name)| (name.to_lowercase(), idx))
            .collect();

        let inference_columns: Option<Vec<usize>> =
            FEATURE_COLUMNS.iter().map(|c| by_lower.get(*c).copied()).collect();
        let (rows, source_schema) = match (inference_columns, by_lower.get("amount")) {
            (Some(columns), _) => (inference_rows(&records, &columns), "inference_features"),
            (None, Some(&amount_idx)) => {
                let raw = RawColumns {
                    amount: amount_idx,
                    time: by_lower.get("time").copied(),
                    v_columns: headers
                        .iter()
                        .enumerate()
                        .filter(|(idx, name)| *idx != target_idx && name.to_lowercase().starts_with('v'))
                        .map(|(idx, _)| idx)
                        .collect(),
                };
                (credit_card_rows(&records, &raw), "credit_card_raw")
            }
            (None, None) => {
                return Err(TrainingError::Validation(format!(
                    "dataset must include either inference-ready features ({}) or raw credit-card columns with Amount",
                    FEATURE_COLUMNS.join(", ")
                )));
            }
        };
        let labels = records.iter().map(|r| parse_label(r.get(target_idx).unwrap_or(""))).collect();

        let data = LabeledFeatures::new(rows, labels)?;
        let metadata = FeatureMetadata {
            source_schema: source_schema.to_string(),
            source_columns: headers.clone(),
            feature_columns: FEATURE_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            target_column: headers[target_idx].clone(),
            row_count: data.len(),
            positive_class_ratio: data.positive_class_ratio(),
        };
        tracing::debug!(
            path = %self.path.display(),
            rows = data.len(),
            schema = source_schema,
            "loaded csv feature table"
        );
        Ok((data, metadata))
    }
}

/// `columns` holds indices in `FEATURE_COLUMNS` order.
fn inference_rows(records: &[csv::StringRecord], columns: &[usize]) -> Vec<FeatureRow> {
    records
        .iter()
        .map(|record| {
            let field = |pos: usize| parse_number(record.get(columns[pos]).unwrap_or(""));
            FeatureRow::sanitized(field(0), field(1), field(2), field(3))
        })
        .collect()
}

/// Column positions of a raw credit-card export.
struct RawColumns {
    amount: usize,
    time: Option<usize>,
    v_columns: Vec<usize>,
}

/// Derive inference features from a raw credit-card table.
///
/// Frequency is the number of rows sharing a row's `Time` minute (1 without
/// `Time`). Location and merchant risk are percentile ranks of the mean
/// absolute value over the first and last five `V` columns, or of the amount
/// when there are none.
fn credit_card_rows(records: &[csv::StringRecord], raw: &RawColumns) -> Vec<FeatureRow> {
    let amounts: Vec<f64> =
        records.iter().map(|r| sanitize_amount(parse_number(r.get(raw.amount).unwrap_or("")))).collect();

    let frequencies = match raw.time {
        Some(idx) => per_minute_counts(records.iter().map(|r| parse_number(r.get(idx).unwrap_or("")))),
        None => vec![1.0; records.len()],
    };

    let (location_signal, merchant_signal) = if raw.v_columns.is_empty() {
        (amounts.clone(), amounts.clone())
    } else {
        let width = raw.v_columns.len().min(5);
        (
            abs_means(records, &raw.v_columns[..width]),
            abs_means(records, &raw.v_columns[raw.v_columns.len() - width..]),
        )
    };
    let location = percentile_ranks(&location_signal);
    let merchant = percentile_ranks(&merchant_signal);

    (0..records.len())
        .map(|i| FeatureRow::sanitized(amounts[i], frequencies[i], location[i], merchant[i]))
        .collect()
}

fn per_minute_counts(seconds: impl Iterator<Item = f64>) -> Vec<f64> {
    let buckets: Vec<i64> = seconds.map(|s| (s.max(0.0) / 60.0).floor() as i64).collect();
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for bucket in &buckets {
        *counts.entry(*bucket).or_default() += 1;
    }
    buckets.iter().map(|b| counts.get(b).copied().unwrap_or(0) as f64).collect()
}

/// Mean of `|value|` over `columns`, skipping unparseable cells; 0 when none parse.
fn abs_means(records: &[csv::StringRecord], columns: &[usize]) -> Vec<f64> {
    records
        .iter()
        .map(|record| {
            let values: Vec<f64> =
                columns.iter().filter_map(|idx| parse_finite(record.get(*idx).unwrap_or(""))).collect();
            if values.is_empty() { 0.0 } else { values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64 }
        })
        .collect()
}

/// Percentile rank in `(0, 1]`, ties sharing their average rank.
fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]].total_cmp(&values[order[start]]).is_eq() {
            end += 1;
        }
        // 1-based positions start+1..=end
        let average = (start + 1 + end) as f64 / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = average / n as f64;
        }
        start = end;
    }
    ranks
}

/// Seeded generator of plausible transactions with a logistic fraud signal.
#[derive(Debug, Clone)]
pub struct SyntheticFeatureSource {
    pub size: usize,
    pub seed: u64,
}

impl SyntheticFeatureSource {
    #[must_use]
    pub fn new(size: usize, seed: u64) -> Self {
        Self { size, seed }
    }

    fn distributions() -> TrainingResult<SyntheticDistributions> {
        let err = |e: &dyn std::fmt::Display| TrainingError::Config(format!("synthetic distribution: {e}"));
        Ok(SyntheticDistributions {
            // statrs parameterizes gamma by rate, so scale 1800 becomes 1/1800.
            amount: Gamma::new(2.2, 1.0 / 1800.0).map_err(|e| err(&e))?,
            frequency: Poisson::new(2.8).map_err(|e| err(&e))?,
            location: Beta::new(1.6, 4.1).map_err(|e| err(&e))?,
            merchant: Beta::new(1.4, 4.4).map_err(|e| err(&e))?,
        })
    }
}

struct SyntheticDistributions {
    amount: Gamma,
    frequency: Poisson,
    location: Beta,
    merchant: Beta,
}

impl FeatureSource for SyntheticFeatureSource {
    fn describe(&self) -> String {
        format!("synthetic(size={}, seed={})", self.size, self.seed)
    }

    fn load(&self) -> TrainingResult<(LabeledFeatures, FeatureMetadata)> {
        use rand::Rng;

        if self.size == 0 {
            return Err(TrainingError::Validation("synthetic dataset size must be >= 1".to_string()));
        }

        let dist = Self::distributions()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rows = Vec::with_capacity(self.size);
        let mut labels = Vec::with_capacity(self.size);

        for _ in 0..self.size {
            let amount = dist.amount.sample(&mut rng);
            let frequency = Distribution::<f64>::sample(&dist.frequency, &mut rng) + f64::from(rng.gen_range(0..2u8));
            let location = dist.location.sample(&mut rng);
            let merchant = dist.merchant.sample(&mut rng);

            let signal = -6.3 + amount * 0.000_30 + frequency * 0.28 + location * 3.8 + merchant * 3.4;
            let fraud_probability = (1.0 / (1.0 + (-signal).exp())).clamp(0.001, 0.999);

            rows.push(FeatureRow::sanitized(amount, frequency, location, merchant));
            labels.push(u8::from(rng.gen_bool(fraud_probability)));
        }

        let data = LabeledFeatures::new(rows, labels)?;
        let mut source_columns: Vec<String> = FEATURE_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        source_columns.push("is_fraud".to_string());
        let metadata = FeatureMetadata {
            source_schema: "synthetic".to_string(),
            source_columns,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            target_column: "is_fraud".to_string(),
            row_count: data.len(),
            positive_class_ratio: data.positive_class_ratio(),
        };
        Ok((data, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_csv_source_sanitizes_feature_ranges() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training.csv");
        std::fs::write(
            &path,
            "amount,transaction_frequency,location_risk,merchant_risk,is_fraud\n\
             120.1,3,0.7,0.4,0\n\
             -10.0,-1,-0.2,0.6,1\n\
             450.5,20000,1.2,5.0,1\n",
        )
        .unwrap();

        let (data, metadata) = CsvFeatureSource::new(path, Some("is_fraud".to_string())).load().unwrap();

        assert_eq!(data.labels, vec![0, 1, 1]);
        assert_eq!(metadata.source_schema, "inference_features");
        assert_eq!(metadata.row_count, 3);
        assert!(data.rows.iter().all(|r| r.amount >= 0.0));
        assert!(data.rows.iter().all(|r| r.transaction_frequency <= MAX_TRANSACTION_FREQUENCY));
        assert!(data.rows.iter().all(|r| (0.0..=1.0).contains(&r.location_risk)));
        assert!(data.rows.iter().all(|r| (0.0..=1.0).contains(&r.merchant_risk)));
        assert_eq!(data.rows[2].transaction_frequency, 10_000);
    }

    #[test]
    fn test_csv_source_infers_target_and_matches_case_insensitively() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training.csv");
        std::fs::write(&path, "Amount,Transaction_Frequency,Location_Risk,Merchant_Risk,Class\n10,1,0.1,0.2,1\n").unwrap();

        let (data, metadata) = CsvFeatureSource::new(path, None).load().unwrap();
        assert_eq!(metadata.target_column, "Class");
        assert_eq!(data.labels, vec![1]);
    }

    #[test]
    fn test_csv_source_rejects_missing_target() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training.csv");
        std::fs::write(&path, "amount,transaction_frequency,location_risk,merchant_risk\n1,1,0.1,0.1\n").unwrap();

        let err = CsvFeatureSource::new(path, None).load().unwrap_err();
        assert!(matches!(err, TrainingError::Validation(_)));
    }

    #[test]
    fn test_csv_source_derives_features_from_credit_card_columns() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("creditcard.csv");
        std::fs::write(
            &path,
            "Time,V1,V2,V3,V4,V5,V6,Amount,Class\n\
             0,1,1,1,1,1,0,10,0\n\
             30,2,2,2,2,2,0,20,0\n\
             90,-3,-3,-3,-3,-3,6,30,1\n\
             200,0,0,0,0,0,-12,40,0\n",
        )
        .unwrap();

        let (data, metadata) = CsvFeatureSource::new(path, None).load().unwrap();

        assert_eq!(metadata.source_schema, "credit_card_raw");
        assert_eq!(metadata.target_column, "Class");
        assert_eq!(data.labels, vec![0, 0, 1, 0]);
        let amounts: Vec<f64> = data.rows.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![10.0, 20.0, 30.0, 40.0]);
        let frequencies: Vec<u32> = data.rows.iter().map(|r| r.transaction_frequency).collect();
        assert_eq!(frequencies, vec![2, 2, 1, 1]);
        let location: Vec<f64> = data.rows.iter().map(|r| r.location_risk).collect();
        assert_eq!(location, vec![0.5, 0.75, 1.0, 0.25]);
        let merchant: Vec<f64> = data.rows.iter().map(|r| r.merchant_risk).collect();
        assert_eq!(merchant, vec![0.25, 0.5, 1.0, 0.75]);
    }

    #[test]
    fn test_credit_card_columns_without_time_or_v_fall_back_to_amount() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("creditcard.csv");
        std::fs::write(&path, "Amount,Class\n5,0\n5,1\n1,0\n").unwrap();

        let (data, metadata) = CsvFeatureSource::new(path, None).load().unwrap();

        assert_eq!(metadata.source_schema, "credit_card_raw");
        assert!(data.rows.iter().all(|r| r.transaction_frequency == 1));
        let expected = [2.5 / 3.0, 2.5 / 3.0, 1.0 / 3.0];
        for (row, want) in data.rows.iter().zip(expected) {
            assert!((row.location_risk - want).abs() < 1e-12);
            assert!((row.merchant_risk - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_csv_source_rejects_table_without_amount() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("training.csv");
        std::fs::write(&path, "Time,V1,is_fraud\n0,1.5,1\n").unwrap();

        let err = CsvFeatureSource::new(path, None).load().unwrap_err();
        assert!(matches!(err, TrainingError::Validation(msg) if msg.contains("raw credit-card columns")));
    }

    #[test]
    fn test_csv_source_missing_file_is_not_found() {
        let err = CsvFeatureSource::new(PathBuf::from("/nonexistent/data.csv"), None).load().unwrap_err();
        assert!(matches!(err, TrainingError::NotFound(_)));
    }

    #[test]
    fn test_synthetic_source_is_seeded() {
        let a = SyntheticFeatureSource::new(200, 7).load().unwrap().0;
        let b = SyntheticFeatureSource::new(200, 7).load().unwrap().0;
        assert_eq!(a, b);
        assert_eq!(a.class_count(), 2);
    }
}
