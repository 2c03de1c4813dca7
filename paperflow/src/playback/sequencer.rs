//! Ordered, auto-advancing playback with one active handle.

use super::backend::{AudioBackend, EndOfMedia, PlayerHandle};
use super::segment::AudioSegment;
use crate::config::PlaybackConfig;
use crate::errors::{Result, ValidationError};
use crate::events::{EventSink, NoOpEventSink, PLAYBACK_STARTED, PLAYBACK_STOPPED};
use parking_lot::Mutex;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default pause between a segment ending and the next one starting.
pub const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(500);

struct PlaybackState {
    playing: Option<usize>,
    handle: Option<Arc<dyn PlayerHandle>>,
    /// Bumped on every play and stop; end-of-media and pending advances
    /// from older generations are ignored.
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

pub(crate) struct SequencerShared {
    segments: Vec<AudioSegment>,
    backend: Arc<dyn AudioBackend>,
    events: Arc<dyn EventSink>,
    advance_delay: Duration,
    runtime: Option<Handle>,
    state: Mutex<PlaybackState>,
    playing_tx: watch::Sender<Option<usize>>,
}

impl SequencerShared {
    /// Silences the active handle and cancels any pending advance.
    /// Returns the index that was playing.
    fn halt(state: &mut PlaybackState) -> Option<usize> {
        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        if let Some(handle) = state.handle.take() {
            handle.pause();
            handle.rewind();
        }
        state.playing.take()
    }

    fn play(self: &Arc<Self>, index: usize) -> Result<()> {
        let segment = self.segments.get(index).ok_or(ValidationError::InvalidIndex {
            index,
            len: self.segments.len(),
        })?;

        let generation = {
            let mut state = self.state.lock();
            Self::halt(&mut state);
            state.generation
        };

        let on_end = EndOfMedia {
            sequencer: Arc::downgrade(self),
            generation,
            index,
        };
        let handle: Arc<dyn PlayerHandle> = match self.backend.open(&segment.url, on_end) {
            Ok(handle) => Arc::from(handle),
            Err(err) => {
                warn!(index, url = %segment.url, error = %err, "could not open segment");
                self.playing_tx.send_replace(None);
                return Err(err);
            }
        };

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(index, "play superseded before start");
                return Ok(());
            }
            state.handle = Some(Arc::clone(&handle));
            state.playing = Some(index);
            self.playing_tx.send_replace(Some(index));
        }

        info!(index, speaker = %segment.speaker, "playing segment");
        self.events.emit(
            PLAYBACK_STARTED,
            json!({"index": index, "speaker": segment.speaker, "url": segment.url}),
        );

        // A stream may end inside `play`, so the state lock must not be held.
        if let Err(err) = handle.play() {
            warn!(index, url = %segment.url, error = %err, "could not start segment");
            let mut state = self.state.lock();
            if state.generation == generation {
                Self::halt(&mut state);
                self.playing_tx.send_replace(None);
            }
            return Err(err);
        }
        Ok(())
    }

    fn stop(&self) {
        let stopped = {
            let mut state = self.state.lock();
            let stopped = Self::halt(&mut state);
            self.playing_tx.send_replace(None);
            stopped
        };
        if let Some(index) = stopped {
            debug!(index, "playback stopped");
            self.events
                .emit(PLAYBACK_STOPPED, json!({"index": index, "reason": "stopped"}));
        }
    }

    pub(crate) fn on_end(self: &Arc<Self>, generation: u64, index: usize) {
        let mut state = self.state.lock();
        if state.generation != generation || state.playing != Some(index) {
            debug!(index, generation, "ignoring end of stale handle");
            return;
        }
        state.handle = None;
        state.playing = None;
        self.playing_tx.send_replace(None);
        self.events
            .emit(PLAYBACK_STOPPED, json!({"index": index, "reason": "ended"}));

        let next = index + 1;
        if next >= self.segments.len() {
            info!(segments = self.segments.len(), "playlist finished");
            return;
        }

        match &self.runtime {
            Some(runtime) => {
                let weak = Arc::downgrade(self);
                let delay = self.advance_delay;
                state.pending = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(shared) = weak.upgrade() {
                        shared.advance_after_end(generation, next);
                    }
                }));
            }
            None => {
                drop(state);
                self.advance_after_end(generation, next);
            }
        }
    }

    fn advance_after_end(self: &Arc<Self>, generation: u64, next: usize) {
        {
            let mut state = self.state.lock();
            if state.generation != generation || state.playing.is_some() {
                debug!(next, "auto-advance dropped");
                return;
            }
            state.pending = None;
        }
        if let Err(err) = self.play(next) {
            warn!(index = next, error = %err, "auto-advance failed");
        }
    }
}

/// Builds a [`PlaybackSequencer`].
pub struct SequencerBuilder {
    segments: Vec<AudioSegment>,
    backend: Arc<dyn AudioBackend>,
    events: Arc<dyn EventSink>,
    advance_delay: Duration,
}

impl SequencerBuilder {
    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the pause before auto-advancing.
    #[must_use]
    pub fn with_advance_delay(mut self, delay: Duration) -> Self {
        self.advance_delay = delay;
        self
    }

    /// Applies playback settings.
    #[must_use]
    pub fn with_config(self, config: &PlaybackConfig) -> Self {
        self.with_advance_delay(config.advance_delay())
    }

    /// Builds the sequencer. Auto-advance timers run on the current tokio
    /// runtime when there is one; without a runtime the next segment starts
    /// immediately.
    #[must_use]
    pub fn build(self) -> PlaybackSequencer {
        let (playing_tx, _) = watch::channel(None);
        PlaybackSequencer {
            shared: Arc::new(SequencerShared {
                segments: self.segments,
                backend: self.backend,
                events: self.events,
                advance_delay: self.advance_delay,
                runtime: Handle::try_current().ok(),
                state: Mutex::new(PlaybackState {
                    playing: None,
                    handle: None,
                    generation: 0,
                    pending: None,
                }),
                playing_tx,
            }),
        }
    }
}

/// Plays an ordered playlist, one segment at a time.
///
/// Starting a segment always silences the previous one first. When a
/// segment ends naturally the next one starts after a short delay; the
/// last one leaves playback stopped. Dropping the sequencer stops playback.
pub struct PlaybackSequencer {
    shared: Arc<SequencerShared>,
}

impl PlaybackSequencer {
    /// Creates a sequencer with default settings.
    #[must_use]
    pub fn new(segments: Vec<AudioSegment>, backend: Arc<dyn AudioBackend>) -> Self {
        Self::builder(segments, backend).build()
    }

    /// Starts building a sequencer.
    #[must_use]
    pub fn builder(segments: Vec<AudioSegment>, backend: Arc<dyn AudioBackend>) -> SequencerBuilder {
        SequencerBuilder {
            segments,
            backend,
            events: Arc::new(NoOpEventSink),
            advance_delay: DEFAULT_ADVANCE_DELAY,
        }
    }

    /// Plays segment `index`, stopping whatever was playing.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` if `index` is out of range, or the backend's error if
    /// the media cannot be opened.
    pub fn play(&self, index: usize) -> Result<()> {
        self.shared.play(index)
    }

    /// Stops and rewinds the active segment. Idempotent.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Stops `index` if it is playing, otherwise plays it.
    ///
    /// # Errors
    ///
    /// See [`play`](Self::play).
    pub fn toggle(&self, index: usize) -> Result<()> {
        if self.playing_index() == Some(index) {
            self.stop();
            Ok(())
        } else {
            self.play(index)
        }
    }

    /// Plays the following segment. No-op on the last one or when stopped.
    ///
    /// # Errors
    ///
    /// See [`play`](Self::play).
    pub fn next(&self) -> Result<()> {
        match self.playing_index() {
            Some(index) if index + 1 < self.len() => self.play(index + 1),
            _ => Ok(()),
        }
    }

    /// Plays the preceding segment. No-op on the first one or when stopped.
    ///
    /// # Errors
    ///
    /// See [`play`](Self::play).
    pub fn previous(&self) -> Result<()> {
        match self.playing_index() {
            Some(index) if index > 0 => self.play(index - 1),
            _ => Ok(()),
        }
    }

    /// Index of the playing segment, `None` when stopped.
    #[must_use]
    pub fn playing_index(&self) -> Option<usize> {
        self.shared.state.lock().playing
    }

    /// Watches the playing index.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<usize>> {
        self.shared.playing_tx.subscribe()
    }

    /// The playing segment.
    #[must_use]
    pub fn now_playing(&self) -> Option<AudioSegment> {
        self.playing_index()
            .and_then(|index| self.shared.segments.get(index).cloned())
    }

    /// "#k of n" for the playing segment.
    #[must_use]
    pub fn position_label(&self) -> Option<String> {
        self.playing_index()
            .map(|index| format!("#{} of {}", index + 1, self.len()))
    }

    /// The playlist.
    #[must_use]
    pub fn segments(&self) -> &[AudioSegment] {
        &self.shared.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.segments.len()
    }

    /// Whether the playlist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.segments.is_empty()
    }
}

impl Drop for PlaybackSequencer {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl fmt::Debug for PlaybackSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSequencer")
            .field("segments", &self.len())
            .field("playing", &self.playing_index())
            .field("advance_delay", &self.shared.advance_delay)
            .finish_non_exhaustive()
    }
}
