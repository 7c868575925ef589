//! Debounce controller
//!
//! Turns a burst of text changes into at most one "settled" event. Every change
//! bumps a token and restarts a single timer task; when the timer fires it only
//! sends its token back, and the owner asks [`DebounceController::on_tick`]
//! whether that token is still current. A superseded timer is aborted, and even
//! if it already fired its tick is rejected by the token check.

use std::time::Duration;

use tokio::{sync::mpsc, task::AbortHandle};
use tracing::trace;

/// Sent by a timer task when its delay elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTick(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceEvent {
    /// The text stayed unchanged for the full delay (or was submitted explicitly).
    Settled(String),
    /// The text became empty, nothing should be searched.
    Cleared,
}

#[derive(Debug)]
pub struct DebounceController {
    delay: Duration,
    text: String,
    token: u64,
    pending: Option<AbortHandle>,
    tick_tx: mpsc::UnboundedSender<DebounceTick>,
}

impl DebounceController {
    /// Create a controller together with the receiver its timers report to.
    ///
    /// The receiver must be drained by the same owner that calls the other
    /// methods, passing each tick to [`on_tick`](Self::on_tick).
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<DebounceTick>) {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let controller = Self {
            delay,
            text: String::new(),
            token: 0,
            pending: None,
            tick_tx,
        };
        (controller, tick_rx)
    }

    /// The most recent text, untrimmed.
    #[cfg(test)]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record new text and restart the timer.
    ///
    /// Empty (after trimming) text cancels any pending timer and returns
    /// [`DebounceEvent::Cleared`] straight away. Must be called inside a tokio runtime.
    pub fn on_text_changed(&mut self, text: impl Into<String>) -> Option<DebounceEvent> {
        self.text = text.into();
        self.cancel();

        if self.text.trim().is_empty() {
            return Some(DebounceEvent::Cleared);
        }

        let token = self.token;
        let delay = self.delay;
        let tick_tx = self.tick_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone once the owner shuts down
            let _ = tick_tx.send(DebounceTick(token));
        });
        self.pending = Some(timer.abort_handle());
        trace!(token, "Debounce timer started");
        None
    }

    /// Resolve a timer tick. Only the tick of the latest, still pending timer settles.
    pub fn on_tick(&mut self, tick: DebounceTick) -> Option<DebounceEvent> {
        if tick.0 != self.token || self.pending.is_none() {
            trace!(tick = tick.0, current = self.token, "Stale debounce tick");
            return None;
        }
        self.pending = None;
        Some(self.settled())
    }

    /// Settle immediately with the current text, cancelling any pending timer.
    pub fn settle_now(&mut self) -> DebounceEvent {
        self.cancel();
        self.settled()
    }

    /// Overwrite the text without scheduling a search.
    pub fn replace_text(&mut self, text: impl Into<String>) {
        self.cancel();
        self.text = text.into();
    }

    /// Drop the pending timer, if any. Its tick can never settle afterwards.
    pub fn cancel(&mut self) {
        self.token = self.token.wrapping_add(1);
        if let Some(timer) = self.pending.take() {
            timer.abort();
        }
    }

    fn settled(&self) -> DebounceEvent {
        let text = self.text.trim();
        if text.is_empty() {
            DebounceEvent::Cleared
        } else {
            DebounceEvent::Settled(text.to_string())
        }
    }
}

impl Drop for DebounceController {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.take() {
            timer.abort();
        }
    }
}
