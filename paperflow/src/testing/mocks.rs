//! Stage doubles for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::core::StageOutput;
use crate::errors::{PaperflowError, Result};
use crate::stages::{Stage, StageContext};

/// Rebuilds an error so a scripted failure can be returned on every call.
pub(crate) fn replicate(err: &PaperflowError) -> PaperflowError {
    match err {
        PaperflowError::Transport(m) => PaperflowError::Transport(m.clone()),
        PaperflowError::RemoteRejection { status, detail } => PaperflowError::rejection(*status, detail.clone()),
        PaperflowError::Validation(v) => PaperflowError::Validation(v.clone()),
        PaperflowError::Timeout { stage, after } => PaperflowError::Timeout {
            stage: stage.clone(),
            after: *after,
        },
        PaperflowError::EmptyResult { stage } => PaperflowError::EmptyResult { stage: stage.clone() },
        PaperflowError::AlreadyRunning { pipeline, status } => PaperflowError::AlreadyRunning {
            pipeline: pipeline.clone(),
            status: status.clone(),
        },
        PaperflowError::RunTerminal { pipeline, status } => PaperflowError::RunTerminal {
            pipeline: pipeline.clone(),
            status: status.clone(),
        },
        PaperflowError::NothingToAdvance(m) => PaperflowError::NothingToAdvance(m.clone()),
        PaperflowError::Cancelled(m) => PaperflowError::Cancelled(m.clone()),
        PaperflowError::UnknownStage(m) => PaperflowError::UnknownStage(m.clone()),
        PaperflowError::Definition(d) => PaperflowError::Definition(d.clone()),
        PaperflowError::Config(m) => PaperflowError::Config(m.clone()),
        PaperflowError::Serialization(m) => PaperflowError::Serialization(m.clone()),
        PaperflowError::Io(e) => PaperflowError::Io(std::io::Error::new(e.kind(), e.to_string())),
    }
}

#[derive(Debug)]
enum Scripted {
    Succeed(StageOutput),
    Fail(PaperflowError),
}

/// A stage that records calls and returns a scripted outcome.
///
/// Succeeds with no payload unless told otherwise.
#[derive(Debug)]
pub struct MockStage {
    name: String,
    outcome: Mutex<Scripted>,
    delay: Option<Duration>,
    contexts: Mutex<Vec<StageContext>>,
}

impl MockStage {
    /// Creates a stage that succeeds with no payload.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Mutex::new(Scripted::Succeed(StageOutput::ok_empty())),
            delay: None,
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds with `data`.
    #[must_use]
    pub fn returning(self, data: Value) -> Self {
        self.succeed_with(data);
        self
    }

    /// Succeeds with a full output.
    #[must_use]
    pub fn returning_output(self, output: StageOutput) -> Self {
        *self.outcome.lock() = Scripted::Succeed(output);
        self
    }

    /// Fails with `err` on every call.
    #[must_use]
    pub fn failing_with(self, err: PaperflowError) -> Self {
        self.fail_with(err);
        self
    }

    /// Sleeps before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Switches to succeeding with `data`.
    pub fn succeed_with(&self, data: Value) {
        *self.outcome.lock() = Scripted::Succeed(StageOutput::ok(data));
    }

    /// Switches to failing with `err`.
    pub fn fail_with(&self, err: PaperflowError) {
        *self.outcome.lock() = Scripted::Fail(err);
    }

    /// The stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.contexts.lock().len()
    }

    /// The context of every invocation.
    #[must_use]
    pub fn recorded_contexts(&self) -> Vec<StageContext> {
        self.contexts.lock().clone()
    }
}

#[async_trait]
impl Stage for MockStage {
    async fn invoke(&self, ctx: &StageContext) -> Result<StageOutput> {
        {
            self.contexts.lock().push(ctx.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = match &*self.outcome.lock() {
            Scripted::Succeed(output) => Ok(output.clone()),
            Scripted::Fail(err) => Err(replicate(err)),
        };
        outcome
    }
}

/// A stage that blocks until the test releases it.
///
/// Each invocation takes the next released outcome, so a test can hold a
/// stage in flight while it inspects or resets the run.
#[derive(Debug)]
pub struct GatedStage {
    name: String,
    release_tx: mpsc::UnboundedSender<Result<StageOutput>>,
    release_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<StageOutput>>>,
    started: watch::Sender<usize>,
}

impl GatedStage {
    /// Creates a closed gate.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (release_tx, release_rx) = mpsc::unbounded_channel();
        let (started, _) = watch::channel(0);
        Self {
            name: name.into(),
            release_tx,
            release_rx: tokio::sync::Mutex::new(release_rx),
            started,
        }
    }

    /// The stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lets one invocation finish with `outcome`. Outcomes released before
    /// an invocation starts are queued.
    pub fn release(&self, outcome: Result<StageOutput>) {
        // The receiver lives in `self`, so this only fails once dropped.
        let _ = self.release_tx.send(outcome);
    }

    /// Number of invocations that have started.
    #[must_use]
    pub fn started_count(&self) -> usize {
        *self.started.borrow()
    }

    /// Waits until the first invocation has started.
    pub async fn wait_started(&self) {
        self.wait_for_calls(1).await;
    }

    /// Waits until `n` invocations have started.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.started.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

#[async_trait]
impl Stage for GatedStage {
    async fn invoke(&self, _ctx: &StageContext) -> Result<StageOutput> {
        self.started.send_modify(|count| *count += 1);
        let mut rx = self.release_rx.lock().await;
        rx.recv()
            .await
            .unwrap_or_else(|| Err(PaperflowError::Cancelled(format!("gate '{}' closed", self.name))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArtifactId;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx(stage: &str) -> StageContext {
        StageContext::new(ArtifactId::new("p1").unwrap(), stage)
    }

    #[tokio::test]
    async fn test_mock_stage_switches_outcome() {
        let stage = MockStage::new("audio").failing_with(PaperflowError::rejection(503, Some("tts unavailable".into())));

        for _ in 0..2 {
            let err = stage.invoke(&ctx("audio")).await.unwrap_err();
            assert_eq!(err.user_message("x"), "tts unavailable");
        }

        stage.succeed_with(json!(["a.mp3"]));
        let output = stage.invoke(&ctx("audio")).await.unwrap();
        assert_eq!(output.into_result(), json!(["a.mp3"]));
        assert_eq!(stage.call_count(), 3);
        assert_eq!(stage.recorded_contexts()[0].stage, "audio");
    }

    #[tokio::test]
    async fn test_gated_stage_waits_for_release() {
        let gate = Arc::new(GatedStage::new("video"));
        let runner = gate.clone();
        let task = tokio::spawn(async move { runner.invoke(&ctx("video")).await });

        gate.wait_started().await;
        assert_eq!(gate.started_count(), 1);
        assert!(!task.is_finished());

        gate.release(Ok(StageOutput::ok(json!("/v/p1.mp4"))));
        let output = task.await.unwrap().unwrap();
        assert_eq!(output.into_result(), json!("/v/p1.mp4"));
    }

    #[test]
    fn test_replicate_keeps_kind() {
        let err = PaperflowError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(replicate(&err).kind(), "io");
        let err = PaperflowError::rejection(404, None);
        assert_eq!(replicate(&err).kind(), "remote_rejection");
    }
}
