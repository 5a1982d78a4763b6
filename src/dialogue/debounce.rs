//! Transcript debouncing
//!
//! Collapses a burst of live transcript updates into one finalized utterance
//! once the transcript has been quiet for the configured interval. At most
//! one timer is pending at any time; a new update replaces it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::DialogueEvent;

/// The single pending finalize timer
#[derive(Debug)]
struct PendingSettle {
    settle: u64,
    timer: JoinHandle<()>,
}

/// Single-slot cancellable finalize timer
///
/// When the quiet period elapses the timer posts
/// [`DialogueEvent::UtteranceFinalized`] to the session's event queue. The
/// session must pass every such event through [`accept`](Self::accept)
/// before acting on it: an event that was already queued when its timer got
/// superseded is rejected there.
#[derive(Debug)]
pub struct TranscriptDebouncer {
    quiet: Duration,
    events: mpsc::UnboundedSender<DialogueEvent>,
    next_settle: u64,
    pending: Option<PendingSettle>,
}

impl TranscriptDebouncer {
    #[must_use]
    pub const fn new(quiet: Duration, events: mpsc::UnboundedSender<DialogueEvent>) -> Self {
        Self {
            quiet,
            events,
            next_settle: 0,
            pending: None,
        }
    }

    /// Restart the quiet period with `text` as the candidate utterance
    ///
    /// Returns the settle token the eventual event will carry.
    pub fn on_update(&mut self, text: String) -> u64 {
        self.cancel();

        self.next_settle += 1;
        let settle = self.next_settle;
        let quiet = self.quiet;
        let events = self.events.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = events.send(DialogueEvent::UtteranceFinalized { settle, text });
        });

        tracing::trace!(settle, quiet_ms = quiet.as_millis(), "finalize timer armed");
        self.pending = Some(PendingSettle { settle, timer });
        settle
    }

    /// Drop the pending timer, if any
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
            tracing::trace!(settle = pending.settle, "finalize timer cancelled");
        }
    }

    /// Claim a fired settle
    ///
    /// Returns `true` exactly once for the current timer; stale or repeated
    /// tokens return `false`.
    pub fn accept(&mut self, settle: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.settle == settle => {
                self.pending = None;
                true
            }
            _ => {
                tracing::debug!(settle, "discarding superseded settle");
                false
            }
        }
    }

    /// Whether a finalize timer is armed
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for TranscriptDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    const QUIET: Duration = Duration::from_millis(1500);

    #[tokio::test(start_paused = true)]
    async fn test_burst_settles_once_with_last_text() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = TranscriptDebouncer::new(QUIET, tx);

        debouncer.on_update("a".to_string());
        tokio::time::sleep(Duration::from_millis(500)).await;
        debouncer.on_update("a lat".to_string());
        tokio::time::sleep(Duration::from_millis(1400)).await;
        let last = Instant::now();
        let settle = debouncer.on_update("a latte".to_string());

        let Some(DialogueEvent::UtteranceFinalized { settle: fired, text }) = rx.recv().await
        else {
            panic!("expected a finalized utterance");
        };

        assert!(last.elapsed() >= QUIET);
        assert_eq!(fired, settle);
        assert_eq!(text, "a latte");
        assert!(debouncer.accept(fired));
        assert!(!debouncer.accept(fired));

        tokio::time::sleep(QUIET * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = TranscriptDebouncer::new(QUIET, tx);

        debouncer.on_update("one shot".to_string());
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert!(!debouncer.is_pending());

        tokio::time::sleep(QUIET * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_stale_settle_is_rejected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = TranscriptDebouncer::new(QUIET, tx);

        let first = debouncer.on_update("first".to_string());
        tokio::time::sleep(QUIET + Duration::from_millis(1)).await;
        // The first timer already fired; a new update lands before the session drains it
        let second = debouncer.on_update("second".to_string());

        let Some(DialogueEvent::UtteranceFinalized { settle, .. }) = rx.recv().await else {
            panic!("expected first settle");
        };
        assert_eq!(settle, first);
        assert!(!debouncer.accept(settle));
        assert!(debouncer.is_pending());

        let Some(DialogueEvent::UtteranceFinalized { settle, text }) = rx.recv().await else {
            panic!("expected second settle");
        };
        assert_eq!(settle, second);
        assert_eq!(text, "second");
        assert!(debouncer.accept(settle));
    }
}
