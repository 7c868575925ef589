//! Voice input adapter.
//!
//! Speech recognition itself is external: anything that can produce a
//! [`Stream`] of [`Recognition`]s can drive the engine through [`VoiceInput`].

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::core::LocationSearch;

/// One update from a speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub text: String,
    /// Set once the recognizer has detected the end of speech.
    pub is_final: bool,
}

impl Recognition {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Why [`VoiceInput::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStop {
    /// A final result was forwarded.
    Completed,
    /// The recognizer closed its stream.
    StreamEnded,
    /// Nothing was recognized for the silence timeout.
    Silence,
}

/// Forwards recognition updates to a [`LocationSearch`] engine.
#[derive(Clone)]
pub struct VoiceInput {
    engine: LocationSearch,
    silence_timeout: Duration,
}

impl VoiceInput {
    /// Uses the engine's configured silence timeout.
    pub fn new(engine: LocationSearch) -> Self {
        let silence_timeout = engine.config().voice_silence_timeout;
        Self {
            engine,
            silence_timeout,
        }
    }

    #[must_use]
    pub fn with_silence_timeout(mut self, timeout: Duration) -> Self {
        self.silence_timeout = timeout;
        self
    }

    /// Consume `recognitions` until a final result, the end of the stream, or silence.
    ///
    /// Non-empty partial results are forwarded as text changes and restart the
    /// silence timer. Nothing is forwarded after this returns.
    pub async fn run<S>(&self, recognitions: S) -> VoiceStop
    where
        S: Stream<Item = Recognition>,
    {
        let mut recognitions = std::pin::pin!(recognitions);
        let mut deadline = Instant::now() + self.silence_timeout;

        loop {
            tokio::select! {
                next = recognitions.next() => match next {
                    None => {
                        debug!("Recognition stream ended");
                        return VoiceStop::StreamEnded;
                    }
                    Some(Recognition { text, is_final: true }) => {
                        debug!(text = %text, "Final voice result");
                        self.engine.handle_voice(text, true);
                        return VoiceStop::Completed;
                    }
                    Some(Recognition { text, .. }) => {
                        if !text.trim().is_empty() {
                            self.engine.handle_voice(text, false);
                            deadline = Instant::now() + self.silence_timeout;
                        }
                    }
                },
                () = sleep_until(deadline) => {
                    info!(
                        timeout = ?self.silence_timeout,
                        "No speech recognized, stopping voice input"
                    );
                    return VoiceStop::Silence;
                }
            }
        }
    }
}
