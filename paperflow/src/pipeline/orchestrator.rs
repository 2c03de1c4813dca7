//! The pipeline orchestrator.
//!
//! Drives one run at a time through a fixed stage table. Stages execute
//! strictly in order; each claim fires the run's latch and sets the status
//! under the same lock, before the remote call is issued. Results that
//! arrive after a reset are discarded by comparing run ids.

use super::{FailurePolicy, FailureRecord, PipelineRun, PipelineSpec, RunSnapshot, StageSpec};
use crate::cancellation::CancellationToken;
use crate::config::OrchestratorConfig;
use crate::core::{AdvancePolicy, ArtifactId, RunId, RunStatus, StageOutput};
use crate::errors::{PaperflowError, Result};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::observability::StageTimer;
use crate::stages::StageContext;
use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Stage timeout used when none is configured.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(900);

struct Shared {
    spec: PipelineSpec,
    run: Mutex<PipelineRun>,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
    stage_timeout: Duration,
    completions: AtomicUsize,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// A stage whose latch has fired and whose call may now be issued.
struct Claim {
    index: usize,
    ctx: StageContext,
    token: Arc<CancellationToken>,
}

enum Step {
    Next(Claim),
    Finished {
        status: RunStatus,
        background_from: Option<usize>,
    },
}

/// Builder for [`PipelineOrchestrator`].
pub struct OrchestratorBuilder {
    spec: PipelineSpec,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
    stage_timeout: Duration,
}

impl OrchestratorBuilder {
    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets the default stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Applies orchestrator configuration.
    #[must_use]
    pub fn with_config(self, config: &OrchestratorConfig) -> Self {
        self.with_stage_timeout(config.stage_timeout())
    }

    /// Builds the orchestrator.
    #[must_use]
    pub fn build(self) -> PipelineOrchestrator {
        PipelineOrchestrator {
            shared: Arc::new(Shared {
                spec: self.spec,
                run: Mutex::new(PipelineRun::idle()),
                events: self.events,
                notifier: self.notifier,
                stage_timeout: self.stage_timeout,
                completions: AtomicUsize::new(0),
                background: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Executes a pipeline table against one artifact at a time.
///
/// Cloning is cheap; clones share the same run.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    shared: Arc<Shared>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator with default sinks and timeout.
    #[must_use]
    pub fn new(spec: PipelineSpec) -> Self {
        Self::builder(spec).build()
    }

    /// Starts building an orchestrator.
    #[must_use]
    pub fn builder(spec: PipelineSpec) -> OrchestratorBuilder {
        OrchestratorBuilder {
            spec,
            events: Arc::new(NoOpEventSink),
            notifier: Arc::new(TracingNotifier),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// The pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.spec.name
    }

    /// The stage table.
    #[must_use]
    pub fn spec(&self) -> &PipelineSpec {
        &self.shared.spec
    }

    /// Starts a run and drives it until it completes, fails, or pauses.
    ///
    /// Stage failures are reported through the returned status, not as
    /// errors.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if a run is in flight, `RunTerminal` if the last run
    /// finished and was not reset, `Cancelled` if a reset lands mid-run.
    pub async fn start(&self, artifact: ArtifactId, config: Value) -> Result<RunStatus> {
        let claim = {
            let mut run = self.shared.run.lock();
            match &run.status {
                RunStatus::Idle => {}
                status if status.is_active() => {
                    debug!(
                        pipeline = %self.name(),
                        artifact = %artifact,
                        status = %status,
                        "start ignored: run already in progress"
                    );
                    return Err(PaperflowError::AlreadyRunning {
                        pipeline: self.name().to_string(),
                        status: status.to_string(),
                    });
                }
                status => {
                    return Err(PaperflowError::RunTerminal {
                        pipeline: self.name().to_string(),
                        status: status.to_string(),
                    });
                }
            }

            run.artifact = Some(artifact);
            run.config = Arc::new(config);
            run.started_at = Some(Utc::now());
            run.finished_at = None;

            let Some(claim) = self.claim(&mut run, 0) else {
                return Err(PaperflowError::AlreadyRunning {
                    pipeline: self.name().to_string(),
                    status: run.status.to_string(),
                });
            };
            info!(
                pipeline = %self.name(),
                run_id = %run.id,
                artifact = %claim.ctx.artifact,
                "run started"
            );
            claim
        };

        self.drive(claim).await
    }

    /// Starts a run with a typed configuration.
    ///
    /// # Errors
    ///
    /// As [`start`](Self::start), plus `Serialization` if `config` cannot be
    /// encoded.
    pub async fn start_with<T: Serialize>(&self, artifact: ArtifactId, config: &T) -> Result<RunStatus> {
        let config = serde_json::to_value(config)?;
        self.start(artifact, config).await
    }

    /// Starts a run only if the pipeline is idle.
    ///
    /// Returns `None` when a run already exists. Used for stages that are
    /// auto-triggered whenever a view appears.
    ///
    /// # Errors
    ///
    /// `Cancelled` if a reset lands mid-run.
    pub async fn ensure_started(&self, artifact: ArtifactId, config: Value) -> Result<Option<RunStatus>> {
        match self.start(artifact, config).await {
            Ok(status) => Ok(Some(status)),
            Err(PaperflowError::AlreadyRunning { .. } | PaperflowError::RunTerminal { .. }) => {
                debug!(pipeline = %self.name(), "ensure_started: run already exists");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Continues a paused run, or redoes the failed stage of a run that
    /// keeps partial results.
    ///
    /// # Errors
    ///
    /// `NothingToAdvance` if the run is neither awaiting nor retryable.
    pub async fn advance(&self) -> Result<RunStatus> {
        let claim = {
            let mut run = self.shared.run.lock();
            let status = run.status.clone();
            let index = match &status {
                RunStatus::Awaiting(key) => self.index_of(key)?,
                RunStatus::Failed(key) if self.shared.spec.failure_policy == FailurePolicy::RetainPartial => {
                    let index = self.index_of(key)?;
                    run.latch.release(key);
                    run.finished_at = None;
                    info!(pipeline = %self.name(), run_id = %run.id, stage = %key, "retrying failed stage");
                    index
                }
                other => return Err(PaperflowError::NothingToAdvance(other.to_string())),
            };

            let Some(claim) = self.claim(&mut run, index) else {
                return Err(PaperflowError::NothingToAdvance(status.to_string()));
            };
            claim
        };

        self.drive(claim).await
    }

    /// Abandons the current run and returns to `idle`.
    ///
    /// In-flight stage calls are cancelled and any result they still
    /// deliver is discarded. Background work is aborted.
    pub fn reset(&self) {
        let previous = {
            let mut run = self.shared.run.lock();
            run.token.cancel("run reset");
            // Abort under the run lock so a run started after this reset
            // cannot lose its own background work.
            for handle in self.shared.background.lock().drain(..) {
                handle.abort();
            }
            std::mem::replace(&mut *run, PipelineRun::idle())
        };

        info!(pipeline = %self.name(), run_id = %previous.id, status = %previous.status, "run reset");
        self.emit(events::RUN_RESET, json!({ "run_id": previous.id, "previous_status": previous.status }));
    }

    /// Returns true if invoking `stage` now would duplicate remote work.
    #[must_use]
    pub fn is_idempotent_reentry(&self, stage: &str) -> bool {
        let run = self.shared.run.lock();
        run.latch.has_fired(stage) || run.has_result(stage)
    }

    /// Waits until background stages of the current run have resolved.
    pub async fn wait_for_background(&self) {
        loop {
            let handles = std::mem::take(&mut *self.shared.background.lock());
            if handles.is_empty() {
                return;
            }
            // Aborted handles report a JoinError; there is nothing to apply.
            let _ = futures::future::join_all(handles).await;
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.shared.run.lock().status.clone()
    }

    /// Current run id.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.shared.run.lock().id
    }

    /// Read model of the current run.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.shared.run.lock().snapshot(self.name())
    }

    /// Returns true if `stage` has a recorded result.
    #[must_use]
    pub fn has_result(&self, stage: &str) -> bool {
        self.shared.run.lock().has_result(stage)
    }

    /// The raw result of `stage`, if recorded.
    #[must_use]
    pub fn result(&self, stage: &str) -> Option<Value> {
        self.shared.run.lock().results.get(stage).cloned()
    }

    /// Decodes the result of `stage`, if recorded.
    ///
    /// # Errors
    ///
    /// `Serialization` if the recorded value does not fit `T`.
    pub fn result_as<T: DeserializeOwned>(&self, stage: &str) -> Result<Option<T>> {
        self.result(stage)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Number of runs that reached `complete` over this orchestrator's life.
    #[must_use]
    pub fn completion_count(&self) -> usize {
        self.shared.completions.load(Ordering::SeqCst)
    }

    fn index_of(&self, key: &str) -> Result<usize> {
        self.shared
            .spec
            .index_of(key)
            .ok_or_else(|| PaperflowError::UnknownStage(key.to_string()))
    }

    fn emit(&self, event: &str, mut data: Value) {
        if let Value::Object(map) = &mut data {
            map.insert("pipeline".to_string(), Value::String(self.name().to_string()));
        }
        self.shared.events.emit(event, data);
    }

    /// Fires the latch for `index` and marks it running.
    fn claim(&self, run: &mut PipelineRun, index: usize) -> Option<Claim> {
        let stage = &self.shared.spec.stages[index];
        let artifact = run.artifact.clone()?;
        if !run.latch.try_fire(&stage.key) {
            debug!(pipeline = %self.name(), stage = %stage.key, "stage already invoked in this run");
            return None;
        }
        run.status = RunStatus::Running(stage.key.clone());
        Some(Claim {
            index,
            ctx: Self::context(run, artifact, &stage.key),
            token: Arc::clone(&run.token),
        })
    }

    fn context(run: &PipelineRun, artifact: ArtifactId, stage: &str) -> StageContext {
        StageContext {
            artifact,
            run_id: run.id,
            stage: stage.to_string(),
            config: Arc::clone(&run.config),
            results: run.results.clone(),
        }
    }

    async fn drive(&self, mut claim: Claim) -> Result<RunStatus> {
        loop {
            let stage = &self.shared.spec.stages[claim.index];
            self.announce(stage, &claim.ctx);
            let outcome = self.invoke(stage, &claim.ctx, &claim.token).await;

            match self.apply(claim.index, claim.ctx.run_id, outcome)? {
                Step::Next(next) => claim = next,
                Step::Finished {
                    status,
                    background_from,
                } => {
                    if let Some(from) = background_from {
                        self.spawn_background(claim.ctx.run_id, from);
                    }
                    return Ok(status);
                }
            }
        }
    }

    fn announce(&self, stage: &StageSpec, ctx: &StageContext) {
        info!(
            pipeline = %self.name(),
            stage = %stage.key,
            run_id = %ctx.run_id,
            artifact = %ctx.artifact,
            "stage started"
        );
        self.emit(
            events::STAGE_STARTED,
            json!({ "stage": stage.key, "run_id": ctx.run_id, "artifact": ctx.artifact }),
        );
        self.shared
            .notifier
            .notify(Notification::loading(stage.loading_text()).with_stage(&stage.key));
    }

    async fn invoke(&self, stage: &StageSpec, ctx: &StageContext, token: &CancellationToken) -> Result<StageOutput> {
        let limit = stage.timeout.unwrap_or(self.shared.stage_timeout);
        let timer = StageTimer::start(&stage.key);

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(PaperflowError::Cancelled(
                token.reason().unwrap_or_else(|| "cancelled".to_string()),
            )),
            result = tokio::time::timeout(limit, stage.runner.invoke(ctx)) => match result {
                Ok(result) => result,
                Err(_) => Err(PaperflowError::Timeout {
                    stage: stage.key.clone(),
                    after: limit,
                }),
            },
        };

        debug!(
            pipeline = %self.name(),
            stage = %timer.stage(),
            duration_ms = timer.elapsed_ms(),
            ok = outcome.is_ok(),
            "stage call resolved"
        );
        outcome
    }

    fn apply(&self, index: usize, run_id: RunId, outcome: Result<StageOutput>) -> Result<Step> {
        let stage = &self.shared.spec.stages[index];
        let mut run = self.shared.run.lock();

        if run.id != run_id {
            debug!(pipeline = %self.name(), stage = %stage.key, %run_id, "discarding result of a reset run");
            return Err(PaperflowError::Cancelled(format!(
                "run reset while '{}' was in flight",
                stage.key
            )));
        }

        match outcome {
            Ok(output) => self.record_success(&mut run, stage, output),
            Err(err @ PaperflowError::Cancelled(_)) => return Err(err),
            Err(err) if !stage.is_required() => self.record_optional_failure(&mut run, stage, &err),
            Err(err) => return Ok(self.record_required_failure(&mut run, stage, &err)),
        }

        Ok(self.next_step(&mut run, index))
    }

    fn record_success(&self, run: &mut PipelineRun, stage: &StageSpec, output: StageOutput) {
        let message = output
            .message
            .clone()
            .or_else(|| stage.success_message.clone())
            .unwrap_or_else(|| format!("{} ready", stage.label));

        run.results.insert(stage.key.clone(), output.into_result());
        info!(pipeline = %self.name(), stage = %stage.key, run_id = %run.id, "stage completed");
        self.emit(events::STAGE_COMPLETED, json!({ "stage": stage.key, "run_id": run.id }));
        self.shared
            .notifier
            .notify(Notification::success(message).with_stage(&stage.key));
    }

    fn record_optional_failure(&self, run: &mut PipelineRun, stage: &StageSpec, err: &PaperflowError) {
        let message = stage.failure_text(err);
        warn!(
            pipeline = %self.name(),
            stage = %stage.key,
            run_id = %run.id,
            error = %err,
            "optional stage failed, continuing"
        );
        run.failures
            .push(FailureRecord::new(&stage.key, &message, err).optional());
        self.emit(
            events::STAGE_FAILED,
            json!({ "stage": stage.key, "run_id": run.id, "error": err.kind(), "required": false }),
        );
        self.emit(events::STAGE_SKIPPED_OPTIONAL, json!({ "stage": stage.key, "run_id": run.id }));
        self.shared
            .notifier
            .notify(Notification::error(message).with_stage(&stage.key));
    }

    fn record_required_failure(&self, run: &mut PipelineRun, stage: &StageSpec, err: &PaperflowError) -> Step {
        let message = stage.failure_text(err);
        error!(
            pipeline = %self.name(),
            stage = %stage.key,
            run_id = %run.id,
            error = %err,
            "required stage failed"
        );
        let record = FailureRecord::new(&stage.key, &message, err);
        self.emit(
            events::STAGE_FAILED,
            json!({ "stage": stage.key, "run_id": run.id, "error": err.kind(), "required": true }),
        );
        self.shared
            .notifier
            .notify(Notification::error(message).with_stage(&stage.key));

        let status = match self.shared.spec.failure_policy {
            FailurePolicy::RetainPartial => {
                run.failures.push(record);
                run.status = RunStatus::Failed(stage.key.clone());
                run.finished_at = Some(Utc::now());
                run.status.clone()
            }
            FailurePolicy::RevertToIdle => {
                let mut failures = std::mem::take(&mut run.failures);
                failures.push(record);
                *run = PipelineRun::idle();
                run.failures = failures;
                RunStatus::Idle
            }
        };
        self.emit(
            events::RUN_FAILED,
            json!({ "stage": stage.key, "policy": self.shared.spec.failure_policy, "status": status }),
        );

        Step::Finished {
            status,
            background_from: None,
        }
    }

    fn next_step(&self, run: &mut PipelineRun, index: usize) -> Step {
        let spec = &self.shared.spec;
        let next = index + 1;

        if next >= spec.foreground_len() {
            run.status = RunStatus::Complete;
            run.finished_at = Some(Utc::now());

            let background_from = (next < spec.stages.len()).then_some(next);
            for stage in &spec.stages[next.min(spec.stages.len())..] {
                run.latch.try_fire(&stage.key);
                run.background.insert(stage.key.clone());
            }

            info!(pipeline = %self.name(), run_id = %run.id, "run completed");
            self.emit(
                events::RUN_COMPLETED,
                json!({ "run_id": run.id, "stages": run.results.keys().collect::<Vec<_>>() }),
            );
            let previous = self.shared.completions.fetch_add(1, Ordering::SeqCst);
            if previous == 0 && spec.navigate_on_first_completion {
                self.emit(events::RUN_NAVIGATE, json!({ "run_id": run.id, "artifact": run.artifact }));
            }

            return Step::Finished {
                status: RunStatus::Complete,
                background_from,
            };
        }

        let next_key = spec.stages[next].key.clone();
        if spec.stages[index].advance == AdvancePolicy::AwaitUser {
            debug!(pipeline = %self.name(), stage = %next_key, "awaiting user before next stage");
            run.status = RunStatus::Awaiting(next_key);
            return Step::Finished {
                status: run.status.clone(),
                background_from: None,
            };
        }

        match self.claim(run, next) {
            Some(claim) => Step::Next(claim),
            None => {
                run.status = RunStatus::Awaiting(next_key);
                Step::Finished {
                    status: run.status.clone(),
                    background_from: None,
                }
            }
        }
    }

    fn spawn_background(&self, run_id: RunId, from: usize) {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            for index in from..this.shared.spec.stages.len() {
                let Some((ctx, token)) = this.background_context(run_id, index) else {
                    return;
                };
                let stage = &this.shared.spec.stages[index];
                this.announce(stage, &ctx);
                let outcome = this.invoke(stage, &ctx, &token).await;
                this.apply_background(run_id, index, outcome);
            }
        });
        self.shared.background.lock().push(handle);
    }

    fn background_context(&self, run_id: RunId, index: usize) -> Option<(StageContext, Arc<CancellationToken>)> {
        let run = self.shared.run.lock();
        if run.id != run_id {
            return None;
        }
        let artifact = run.artifact.clone()?;
        let ctx = Self::context(&run, artifact, &self.shared.spec.stages[index].key);
        Some((ctx, Arc::clone(&run.token)))
    }

    fn apply_background(&self, run_id: RunId, index: usize, outcome: Result<StageOutput>) {
        let stage = &self.shared.spec.stages[index];
        let mut run = self.shared.run.lock();

        if run.id != run_id {
            debug!(pipeline = %self.name(), stage = %stage.key, %run_id, "discarding background result of a reset run");
            return;
        }

        run.background.remove(&stage.key);
        match outcome {
            Ok(output) => self.record_success(&mut run, stage, output),
            Err(PaperflowError::Cancelled(_)) => {}
            Err(err) => self.record_optional_failure(&mut run, stage, &err),
        }
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("pipeline", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::notify::NotificationLog;
    use crate::pipeline::{PipelineBuilder, StageSpec};
    use crate::testing::{GatedStage, MockStage};
    use pretty_assertions::assert_eq;

    fn artifact() -> ArtifactId {
        ArtifactId::new("p1").unwrap()
    }

    fn orchestrator(spec: PipelineSpec) -> (PipelineOrchestrator, Arc<CollectingEventSink>, Arc<NotificationLog>) {
        let events = Arc::new(CollectingEventSink::new());
        let log = Arc::new(NotificationLog::new());
        let orch = PipelineOrchestrator::builder(spec)
            .with_events(events.clone())
            .with_notifier(log.clone())
            .build();
        (orch, events, log)
    }

    #[tokio::test]
    async fn test_auto_chain_runs_all_stages() {
        let a = Arc::new(MockStage::new("a").returning(json!("A")));
        let b = Arc::new(MockStage::new("b").returning(json!("B")));
        let spec = PipelineBuilder::new("p")
            .required("a", a.clone())
            .unwrap()
            .required("b", b.clone())
            .unwrap()
            .build()
            .unwrap();
        let (orch, events, log) = orchestrator(spec);

        let status = orch.start(artifact(), Value::Null).await.unwrap();

        assert_eq!(status, RunStatus::Complete);
        assert_eq!(orch.result("a"), Some(json!("A")));
        assert_eq!(orch.result("b"), Some(json!("B")));
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 1);
        assert_eq!(events.events_of_type("run.completed").len(), 1);
        assert_eq!(log.outcomes().len(), 2);
    }

    #[tokio::test]
    async fn test_next_stage_sees_prior_result() {
        let a = Arc::new(MockStage::new("a").returning(json!(["x", "y"])));
        let b = Arc::new(MockStage::new("b"));
        let spec = PipelineBuilder::new("p")
            .required("a", a)
            .unwrap()
            .required("b", b.clone())
            .unwrap()
            .build()
            .unwrap();
        let (orch, _, _) = orchestrator(spec);

        orch.start(artifact(), json!({"language": "english"})).await.unwrap();

        let seen = b.recorded_contexts();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].results.get("a"), Some(&json!(["x", "y"])));
        assert_eq!(*seen[0].config, json!({"language": "english"}));
    }

    #[tokio::test]
    async fn test_await_user_pauses_then_advance() {
        let a = Arc::new(MockStage::new("a"));
        let b = Arc::new(MockStage::new("b"));
        let spec = PipelineBuilder::new("p")
            .stage(StageSpec::required("a", a).await_user())
            .unwrap()
            .required("b", b.clone())
            .unwrap()
            .build()
            .unwrap();
        let (orch, _, _) = orchestrator(spec);

        let status = orch.start(artifact(), Value::Null).await.unwrap();
        assert_eq!(status, RunStatus::Awaiting("b".into()));
        assert_eq!(b.call_count(), 0);
        assert!(orch.has_result("a"));
        assert_eq!(orch.result("a"), Some(Value::Null));

        let status = orch.advance().await.unwrap();
        assert_eq!(status, RunStatus::Complete);
        assert_eq!(b.call_count(), 1);
    }

    #[tokio::test]
    async fn test_advance_without_pause_is_rejected() {
        let spec = PipelineBuilder::new("p")
            .required("a", Arc::new(MockStage::new("a")))
            .unwrap()
            .build()
            .unwrap();
        let (orch, _, _) = orchestrator(spec);

        let err = orch.advance().await.unwrap_err();
        assert_eq!(err.kind(), "nothing_to_advance");
    }

    #[tokio::test]
    async fn test_required_failure_retains_partial_and_retries() {
        let a = Arc::new(MockStage::new("a").returning(json!("A")));
        let b = Arc::new(MockStage::new("b").failing_with(PaperflowError::rejection(500, Some("boom".into()))));
        let c = Arc::new(MockStage::new("c"));
        let spec = PipelineBuilder::new("p")
            .required("a", a.clone())
            .unwrap()
            .required("b", b.clone())
            .unwrap()
            .required("c", c.clone())
            .unwrap()
            .build()
            .unwrap();
        let (orch, events, log) = orchestrator(spec);

        let status = orch.start(artifact(), Value::Null).await.unwrap();
        assert_eq!(status, RunStatus::Failed("b".into()));
        assert_eq!(orch.result("a"), Some(json!("A")));
        assert_eq!(c.call_count(), 0);
        assert_eq!(log.errors()[0].message, "boom");
        assert_eq!(events.events_of_type("run.failed").len(), 1);

        // A finished run does not restart without reset.
        let err = orch.start(artifact(), Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), "run_terminal");

        b.succeed_with(json!("B"));
        let status = orch.advance().await.unwrap();
        assert_eq!(status, RunStatus::Complete);
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 2);
        assert_eq!(c.call_count(), 1);
        assert_eq!(orch.snapshot().failures.len(), 1);
    }

    #[tokio::test]
    async fn test_revert_to_idle_policy() {
        let a = Arc::new(MockStage::new("a").returning(json!("A")));
        let b = Arc::new(MockStage::new("b").failing_with(PaperflowError::Transport("down".into())));
        let spec = PipelineBuilder::new("p")
            .required("a", a)
            .unwrap()
            .stage(StageSpec::required("b", b).with_failure_message("Failed to generate video"))
            .unwrap()
            .failure_policy(FailurePolicy::RevertToIdle)
            .build()
            .unwrap();
        let (orch, _, log) = orchestrator(spec);
        let first_run = orch.run_id();

        let status = orch.start(artifact(), Value::Null).await.unwrap();

        assert_eq!(status, RunStatus::Idle);
        assert_eq!(orch.status(), RunStatus::Idle);
        assert!(!orch.has_result("a"));
        assert_ne!(orch.run_id(), first_run);
        assert_eq!(orch.snapshot().failures.len(), 1);
        assert_eq!(log.errors()[0].message, "Failed to generate video");
        assert!(orch.advance().await.is_err());
    }

    #[tokio::test]
    async fn test_timeout_fails_stage() {
        let slow = Arc::new(GatedStage::new("slow"));
        let spec = PipelineBuilder::new("p")
            .stage(StageSpec::required("slow", slow).with_timeout(Duration::from_millis(20)))
            .unwrap()
            .build()
            .unwrap();
        let (orch, _, log) = orchestrator(spec);

        let status = orch.start(artifact(), Value::Null).await.unwrap();

        assert_eq!(status, RunStatus::Failed("slow".into()));
        assert_eq!(orch.snapshot().failures[0].error_kind, "timeout");
        assert!(log.errors()[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_reset_cancels_in_flight_stage() {
        let gate = Arc::new(GatedStage::new("a"));
        let spec = PipelineBuilder::new("p")
            .required("a", gate.clone())
            .unwrap()
            .build()
            .unwrap();
        let (orch, events, _) = orchestrator(spec);

        let runner = orch.clone();
        let task = tokio::spawn(async move { runner.start(artifact(), Value::Null).await });
        gate.wait_started().await;
        assert_eq!(orch.status(), RunStatus::Running("a".into()));

        orch.reset();
        gate.release(Ok(StageOutput::ok(json!("late"))));

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), "cancelled");
        assert_eq!(orch.status(), RunStatus::Idle);
        assert!(!orch.has_result("a"));
        assert_eq!(events.events_of_type("run.reset").len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_started_only_once() {
        let stage = Arc::new(MockStage::new("slides"));
        let spec = PipelineBuilder::new("slides")
            .required("slides", stage.clone())
            .unwrap()
            .build()
            .unwrap();
        let (orch, _, _) = orchestrator(spec);

        assert!(orch.ensure_started(artifact(), Value::Null).await.unwrap().is_some());
        assert!(orch.ensure_started(artifact(), Value::Null).await.unwrap().is_none());
        assert!(orch.is_idempotent_reentry("slides"));
        assert_eq!(stage.call_count(), 1);
    }

    #[tokio::test]
    async fn test_background_stage_lands_after_complete() {
        let fg = Arc::new(MockStage::new("script"));
        let bg = Arc::new(GatedStage::new("audio"));
        let spec = PipelineBuilder::new("p")
            .required("script", fg)
            .unwrap()
            .stage(StageSpec::optional("audio", bg.clone()).in_background())
            .unwrap()
            .build()
            .unwrap();
        let (orch, _, _) = orchestrator(spec);

        let status = orch.start(artifact(), Value::Null).await.unwrap();
        assert_eq!(status, RunStatus::Complete);
        bg.wait_started().await;
        assert!(orch.snapshot().is_pending("audio"));

        bg.release(Ok(StageOutput::ok(json!(["a.mp3"]))));
        orch.wait_for_background().await;

        assert_eq!(orch.status(), RunStatus::Complete);
        assert_eq!(orch.result("audio"), Some(json!(["a.mp3"])));
        assert!(!orch.snapshot().is_pending("audio"));
    }

    fn script_then_audio(audio: Arc<GatedStage>) -> PipelineSpec {
        PipelineBuilder::new("podcast")
            .required("script", Arc::new(MockStage::new("script")))
            .unwrap()
            .stage(
                StageSpec::optional("audio", audio)
                    .in_background()
                    .with_success_message("Podcast audio ready"),
            )
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reset_discards_background_of_old_run() {
        let audio = Arc::new(GatedStage::new("audio"));
        let (orch, _, log) = orchestrator(script_then_audio(audio.clone()));

        orch.start(artifact(), Value::Null).await.unwrap();
        audio.wait_started().await;
        orch.reset();

        orch.start(artifact(), Value::Null).await.unwrap();
        audio.wait_for_calls(2).await;
        let second_run = orch.run_id();
        assert!(orch.snapshot().is_pending("audio"));
        assert!(!orch.has_result("audio"));

        audio.release(Ok(StageOutput::ok(json!(["second.mp3"]))));
        orch.wait_for_background().await;

        assert_eq!(orch.run_id(), second_run);
        assert_eq!(orch.result("audio"), Some(json!(["second.mp3"])));
        assert!(!orch.snapshot().is_pending("audio"));
        let audio_notices: Vec<_> = log
            .outcomes()
            .into_iter()
            .filter(|n| n.message == "Podcast audio ready")
            .collect();
        assert_eq!(audio_notices.len(), 1);
    }

    #[tokio::test]
    async fn test_late_background_result_of_old_run_is_dropped() {
        let audio = Arc::new(GatedStage::new("audio"));
        let (orch, events, log) = orchestrator(script_then_audio(audio.clone()));

        orch.start(artifact(), Value::Null).await.unwrap();
        let first_run = orch.run_id();
        audio.wait_started().await;
        orch.reset();
        orch.start(artifact(), Value::Null).await.unwrap();
        audio.wait_for_calls(2).await;
        let notices_before = log.outcomes().len();

        // A result still addressed to the first run arrives after the reset.
        orch.apply_background(first_run, 1, Ok(StageOutput::ok(json!(["stale.mp3"]))));
        orch.apply_background(first_run, 1, Err(PaperflowError::Transport("late".into())));

        assert!(!orch.has_result("audio"));
        assert!(orch.snapshot().is_pending("audio"));
        assert!(orch.snapshot().failures.is_empty());
        assert_eq!(log.outcomes().len(), notices_before);
        assert!(events.for_stage("audio").iter().all(|(name, _)| name == "stage.started"));

        audio.release(Ok(StageOutput::ok(json!(["second.mp3"]))));
        orch.wait_for_background().await;
        assert_eq!(orch.result("audio"), Some(json!(["second.mp3"])));
    }

    #[tokio::test]
    async fn test_navigation_fires_on_first_completion_only() {
        let spec = PipelineBuilder::new("media")
            .required("audio", Arc::new(MockStage::new("audio")))
            .unwrap()
            .navigate_on_first_completion()
            .build()
            .unwrap();
        let (orch, events, _) = orchestrator(spec);

        orch.start(artifact(), Value::Null).await.unwrap();
        orch.reset();
        orch.start(artifact(), Value::Null).await.unwrap();

        assert_eq!(orch.completion_count(), 2);
        assert_eq!(events.events_of_type("run.navigate").len(), 1);
    }
}
