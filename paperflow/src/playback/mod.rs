//! Podcast and narration playback.
//!
//! [`PlaybackSequencer`] owns the single active [`PlayerHandle`]; audio
//! output itself sits behind [`AudioBackend`].

mod backend;
mod segment;
mod sequencer;

pub use backend::{AudioBackend, EndOfMedia, PlayerHandle};
pub use segment::{AudioSegment, NARRATOR};
pub use sequencer::{PlaybackSequencer, SequencerBuilder, DEFAULT_ADVANCE_DELAY};
