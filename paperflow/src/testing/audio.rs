//! An in-memory audio backend.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{PaperflowError, Result};
use crate::playback::{AudioBackend, EndOfMedia, PlayerHandle};

#[derive(Debug, Default)]
struct HandleState {
    playing: AtomicBool,
    rewound: AtomicBool,
}

struct Opened {
    url: String,
    state: Arc<HandleState>,
    on_end: EndOfMedia,
}

struct FakeHandle {
    state: Arc<HandleState>,
}

impl PlayerHandle for FakeHandle {
    fn play(&self) -> Result<()> {
        self.state.playing.store(true, Ordering::SeqCst);
        self.state.rewound.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.state.playing.store(false, Ordering::SeqCst);
    }

    fn rewind(&self) {
        self.state.rewound.store(true, Ordering::SeqCst);
    }
}

/// Records every stream the sequencer opens and lets the test end them.
#[derive(Default)]
pub struct FakeAudioBackend {
    opened: Mutex<Vec<Opened>>,
    fail_next: AtomicBool,
}

impl FakeAudioBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `open` fail.
    pub fn fail_next_open(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of streams opened so far.
    #[must_use]
    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }

    /// URLs of every opened stream, in order.
    #[must_use]
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().iter().map(|o| o.url.clone()).collect()
    }

    /// Number of streams currently audible.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.opened
            .lock()
            .iter()
            .filter(|o| o.state.playing.load(Ordering::SeqCst))
            .count()
    }

    /// URLs of the streams currently audible.
    #[must_use]
    pub fn active_urls(&self) -> Vec<String> {
        self.opened
            .lock()
            .iter()
            .filter(|o| o.state.playing.load(Ordering::SeqCst))
            .map(|o| o.url.clone())
            .collect()
    }

    /// Whether the `nth` opened stream was rewound after it last played.
    #[must_use]
    pub fn was_rewound(&self, nth: usize) -> bool {
        self.opened
            .lock()
            .get(nth)
            .is_some_and(|o| o.state.rewound.load(Ordering::SeqCst))
    }

    /// Plays the `nth` opened stream to its end.
    pub fn finish(&self, nth: usize) {
        let on_end = {
            let opened = self.opened.lock();
            let Some(entry) = opened.get(nth) else {
                return;
            };
            entry.state.playing.store(false, Ordering::SeqCst);
            entry.on_end.clone()
        };
        on_end.fire();
    }

    /// Plays the most recently opened stream to its end.
    pub fn finish_current(&self) {
        let last = self.opened_count().saturating_sub(1);
        self.finish(last);
    }
}

impl AudioBackend for FakeAudioBackend {
    fn open(&self, url: &str, on_end: EndOfMedia) -> Result<Box<dyn PlayerHandle>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PaperflowError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cannot open {url}"),
            )));
        }
        let state = Arc::new(HandleState::default());
        self.opened.lock().push(Opened {
            url: url.to_string(),
            state: state.clone(),
            on_end,
        });
        Ok(Box::new(FakeHandle { state }))
    }
}

impl std::fmt::Debug for FakeAudioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeAudioBackend")
            .field("opened", &self.opened_urls())
            .finish_non_exhaustive()
    }
}
