//! Audio output seam.

use super::sequencer::SequencerShared;
use crate::errors::Result;
use std::fmt;
use std::sync::Weak;

/// One opened media stream.
pub trait PlayerHandle: Send + Sync {
    /// Starts or resumes output. A stream that is already at its end may
    /// fire its [`EndOfMedia`] before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be started.
    fn play(&self) -> Result<()>;

    /// Halts output, keeping the position.
    fn pause(&self);

    /// Moves the position back to the start.
    fn rewind(&self);
}

/// Opens media streams.
pub trait AudioBackend: Send + Sync {
    /// Opens `url`. The backend fires `on_end` once when the stream reaches
    /// its natural end, after `open` has returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the media cannot be opened.
    fn open(&self, url: &str, on_end: EndOfMedia) -> Result<Box<dyn PlayerHandle>>;
}

/// Callback handed to each opened stream.
///
/// Firing a notifier whose handle was since replaced or stopped is a no-op.
#[derive(Clone)]
pub struct EndOfMedia {
    pub(super) sequencer: Weak<SequencerShared>,
    pub(super) generation: u64,
    pub(super) index: usize,
}

impl EndOfMedia {
    /// Reports that the stream finished playing.
    pub fn fire(&self) {
        if let Some(shared) = self.sequencer.upgrade() {
            shared.on_end(self.generation, self.index);
        }
    }

    /// The segment this stream plays.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Debug for EndOfMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndOfMedia")
            .field("generation", &self.generation)
            .field("index", &self.index)
            .finish()
    }
}
