//! Lifecycle events emitted by the orchestrator and the sequencer.
//!
//! Events are string-typed with an optional JSON payload so that sinks can
//! forward them to logs, tests or a UI bridge without a shared schema crate.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A stage call was issued.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage call succeeded and its result was recorded.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage call failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// An optional stage failed and the run moved past it.
pub const STAGE_SKIPPED_OPTIONAL: &str = "stage.skipped_optional";
/// Every foreground stage resolved.
pub const RUN_COMPLETED: &str = "run.completed";
/// A required stage failed.
pub const RUN_FAILED: &str = "run.failed";
/// The run was reset by the user.
pub const RUN_RESET: &str = "run.reset";
/// The first run of the orchestrator's lifetime completed; the UI moves to
/// the pipeline's results view. Later completions, including runs after a
/// reset, do not fire it again.
pub const RUN_NAVIGATE: &str = "run.navigate";
/// A segment started playing.
pub const PLAYBACK_STARTED: &str = "playback.started";
/// Playback stopped, by request or at the end of the playlist.
pub const PLAYBACK_STOPPED: &str = "playback.stopped";
