//! The mutable execution record of one pipeline run.

use super::{FailureRecord, OneShotLatch};
use crate::cancellation::CancellationToken;
use crate::core::{ArtifactId, RunId, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// One user-triggered run over one artifact.
#[derive(Debug)]
pub struct PipelineRun {
    /// Changes on every reset; late results are checked against it.
    pub id: RunId,
    /// Set by `start`.
    pub artifact: Option<ArtifactId>,
    /// Current status.
    pub status: RunStatus,
    /// Stage key to recorded result. Only grows until reset.
    pub results: HashMap<String, Value>,
    /// Config passed to `start`, shared with every stage context.
    pub config: Arc<Value>,
    /// Guards against invoking a stage twice.
    pub latch: OneShotLatch,
    /// Cancelled on reset.
    pub token: Arc<CancellationToken>,
    /// Failures seen by this run, required or not.
    pub failures: Vec<FailureRecord>,
    /// Background stages still in flight.
    pub background: BTreeSet<String>,
    /// Set by `start`.
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the run reaches a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// A fresh idle run.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            id: RunId::new(),
            artifact: None,
            status: RunStatus::Idle,
            results: HashMap::new(),
            config: Arc::new(Value::Null),
            latch: OneShotLatch::new(),
            token: Arc::new(CancellationToken::new()),
            failures: Vec::new(),
            background: BTreeSet::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Returns true if `key` has a recorded result.
    #[must_use]
    pub fn has_result(&self, key: &str) -> bool {
        self.results.contains_key(key)
    }

    /// Builds the read model for `pipeline`.
    #[must_use]
    pub fn snapshot(&self, pipeline: &str) -> RunSnapshot {
        RunSnapshot {
            pipeline: pipeline.to_string(),
            run_id: self.id,
            artifact: self.artifact.clone(),
            status: self.status.clone(),
            results: self.results.clone(),
            failures: self.failures.clone(),
            background: self.background.iter().cloned().collect(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::idle()
    }
}

/// Read-only view of a run, handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Pipeline name.
    pub pipeline: String,
    /// Run identity.
    pub run_id: RunId,
    /// The paper, once started.
    pub artifact: Option<ArtifactId>,
    /// Current status.
    pub status: RunStatus,
    /// Recorded results by stage key.
    pub results: HashMap<String, Value>,
    /// Failures seen so far.
    pub failures: Vec<FailureRecord>,
    /// Background stages still in flight.
    pub background: Vec<String>,
    /// When the run started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSnapshot {
    /// Returns true if `key` has a recorded result.
    #[must_use]
    pub fn has_result(&self, key: &str) -> bool {
        self.results.contains_key(key)
    }

    /// Returns true while a background stage is still running.
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.background.iter().any(|k| k == key)
    }

    /// Decodes the result of `key`, if recorded.
    pub fn result_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> crate::errors::Result<Option<T>> {
        self.results
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_idle_run() {
        let run = PipelineRun::idle();
        assert_eq!(run.status, RunStatus::Idle);
        assert!(run.results.is_empty());
        assert!(run.latch.is_empty());
        assert!(!run.token.is_cancelled());
    }

    #[test]
    fn test_snapshot() {
        let mut run = PipelineRun::idle();
        run.results.insert("audio".into(), json!(["a", "b"]));
        run.background.insert("video".into());

        let snapshot = run.snapshot("media");
        assert_eq!(snapshot.pipeline, "media");
        assert!(snapshot.has_result("audio"));
        assert!(snapshot.is_pending("video"));

        let files: Option<Vec<String>> = snapshot.result_as("audio").unwrap();
        assert_eq!(files.unwrap(), vec!["a", "b"]);
        let missing: Option<Vec<String>> = snapshot.result_as("video").unwrap();
        assert!(missing.is_none());
    }
}
