//! Pipeline tables and their execution.
//!
//! This module provides:
//! - Stage and pipeline tables with validation
//! - A fluent builder
//! - The per-run one-shot latch and run record
//! - The orchestrator and a per-artifact registry

mod builder;
mod failure_policy;
mod integration_tests;
mod latch;
mod orchestrator;
mod registry;
mod run;
mod spec;

pub use builder::PipelineBuilder;
pub use failure_policy::{FailurePolicy, FailureRecord};
pub use latch::OneShotLatch;
pub use orchestrator::{OrchestratorBuilder, PipelineOrchestrator, DEFAULT_STAGE_TIMEOUT};
pub use registry::RunRegistry;
pub use run::{PipelineRun, RunSnapshot};
pub use spec::{PipelineSpec, StageSpec};
