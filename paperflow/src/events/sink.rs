//! Where lifecycle events go.

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, Level};

/// Receives lifecycle events.
///
/// Emission must never fail or block the caller; sinks swallow their own
/// errors.
pub trait EventSink: Send + Sync {
    /// Emits `event` (`stage.started`, `playback.stopped`, ...) with its
    /// JSON payload.
    fn emit(&self, event: &str, data: Value);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &str, _data: Value) {}
}

/// Writes events as `tracing` records, lifting the pipeline and stage out
/// of the payload into fields.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingEventSink {
    /// Logs at `level`; anything below `INFO` is logged at `DEBUG`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

fn field<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("-")
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &str, data: Value) {
        let pipeline = field(&data, "pipeline");
        let stage = field(&data, "stage");
        if self.level <= Level::INFO {
            info!(event, pipeline, stage, payload = %data, "event");
        } else {
            debug!(event, pipeline, stage, payload = %data, "event");
        }
    }
}

/// Keeps every event in memory, for tests and UI bridges.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Value)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.read().clone()
    }

    /// Events whose name starts with `prefix` (`"stage."` matches every
    /// stage event).
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<(String, Value)> {
        self.events
            .read()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Payloads of events that concern `stage`.
    #[must_use]
    pub fn for_stage(&self, stage: &str) -> Vec<(String, Value)> {
        self.events
            .read()
            .iter()
            .filter(|(_, data)| data.get("stage").and_then(Value::as_str) == Some(stage))
            .cloned()
            .collect()
    }

    /// Number of events so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &str, data: Value) {
        self.events.write().push((event.to_string(), data));
    }
}
