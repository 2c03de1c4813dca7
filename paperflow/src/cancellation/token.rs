//! Per-run cancellation.

use tokio::sync::watch;

/// Cancelled when the run that owns it is reset.
///
/// Only the first reason is kept; later calls to [`cancel`](Self::cancel)
/// are no-ops.
#[derive(Debug)]
pub struct CancellationToken {
    reason: watch::Sender<Option<String>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Creates a live token.
    #[must_use]
    pub fn new() -> Self {
        let (reason, _) = watch::channel(None);
        Self { reason }
    }

    /// Cancels the token and wakes every waiter.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.reason.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    /// Returns true once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.borrow().is_some()
    }

    /// Why the token was cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.borrow().clone()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.reason.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(Option::is_some).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_first_reason_wins() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);

        token.cancel("run reset");
        token.cancel("second");

        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("run reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_wakes_on_cancel() {
        let token = Arc::new(CancellationToken::new());
        let waiter = tokio::spawn({
            let token = Arc::clone(&token);
            async move { token.cancelled().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        token.cancel("run reset");

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let token = CancellationToken::new();
        token.cancel("run reset");
        token.cancelled().await;
    }
}
