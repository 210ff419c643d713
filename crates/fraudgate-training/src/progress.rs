use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a training run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { run_id: RunId },
    Message { run_id: RunId, message: String },
    CandidateEvaluated { run_id: RunId, candidate: String, index: usize, total: usize, f1: f64, roc_auc: f64 },
    Finished { run_id: RunId, version_id: Option<String> },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { run_id } => println!("[train:{run_id}] started"),
            ProgressEvent::Message { run_id, message } => println!("[train:{run_id}] {message}"),
            ProgressEvent::CandidateEvaluated { run_id, candidate, index, total, f1, roc_auc } => {
                println!("[train:{run_id}] candidate {index}/{total} {candidate}: f1={f1:.4} roc_auc={roc_auc:.4}");
            }
            ProgressEvent::Finished { run_id, version_id } => match version_id {
                Some(version) => println!("[train:{run_id}] finished, registered {version}"),
                None => println!("[train:{run_id}] finished"),
            },
        }
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_is_tagged() {
        let event = ProgressEvent::Message { run_id: RunId("r1".to_string()), message: "split".to_string() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["run_id"], "r1");
    }
}
