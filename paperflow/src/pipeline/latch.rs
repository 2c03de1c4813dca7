//! One-shot latch guarding stage invocations.

use std::collections::HashSet;

/// Records which stages of a run have already been invoked.
///
/// The latch is fired before the remote call is issued and is only cleared
/// by a reset, which replaces the whole run.
#[derive(Debug, Clone, Default)]
pub struct OneShotLatch {
    fired: HashSet<String>,
}

impl OneShotLatch {
    /// Creates an empty latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the latch for `key`. Returns false if it had already fired.
    pub fn try_fire(&mut self, key: &str) -> bool {
        self.fired.insert(key.to_string())
    }

    /// Returns whether `key` has fired.
    #[must_use]
    pub fn has_fired(&self, key: &str) -> bool {
        self.fired.contains(key)
    }

    /// Releases `key` for an explicit redo.
    pub fn release(&mut self, key: &str) {
        self.fired.remove(key);
    }

    /// Number of fired keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fired.len()
    }

    /// Returns true if nothing has fired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}
