//! Speech output controller.
//!
//! Serializes spoken utterances: at most one utterance is ever in flight,
//! and speaking while one is in flight supersedes it. There is no queue;
//! the newer utterance cancels the older one, matching a live assistant's
//! "interrupt to say the next thing" behavior.

use crate::capability::Synthesizer;
use crate::config::OutputConfig;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Callback fired exactly once when an utterance finishes synthesizing.
///
/// A superseded utterance's callback is dropped, not fired.
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

struct OutputInner {
    speaking: bool,
    on_complete: Option<CompletionCallback>,
}

/// Serializes utterances through the synthesis capability.
pub struct SpeechOutputController {
    synthesizer: Arc<dyn Synthesizer>,
    config: OutputConfig,
    inner: Mutex<OutputInner>,
}

impl SpeechOutputController {
    /// Create a new output controller over a synthesis capability.
    pub fn new(synthesizer: Arc<dyn Synthesizer>, config: OutputConfig) -> Arc<Self> {
        Arc::new(Self {
            synthesizer,
            config,
            inner: Mutex::new(OutputInner {
                speaking: false,
                on_complete: None,
            }),
        })
    }

    /// Speak `text`, superseding any utterance currently in flight.
    ///
    /// `on_complete` fires exactly once when synthesis finishes; it is
    /// dropped without firing if this utterance is itself superseded.
    pub fn speak(&self, text: &str, on_complete: Option<CompletionCallback>) {
        let superseded = {
            let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            let superseded = inner.speaking;
            // The superseded utterance's callback is dropped here.
            inner.on_complete = on_complete;
            inner.speaking = true;
            superseded
        };

        if superseded {
            debug!("superseding in-flight utterance");
            self.synthesizer.cancel();
        }
        debug!("speaking: \"{text}\"");
        self.synthesizer.speak(
            text,
            self.config.rate,
            self.config.pitch,
            self.config.volume,
        );
    }

    /// Deliver a synthesis-completion event from the capability adapter.
    ///
    /// Adapters must not call this for utterances cancelled by
    /// supersession; see [`Synthesizer`].
    pub fn handle_synthesis_end(&self) {
        let callback = {
            let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            if !inner.speaking {
                debug!("ignoring synthesis-end with no utterance in flight");
                return;
            }
            inner.speaking = false;
            inner.on_complete.take()
        };

        if let Some(callback) = callback {
            callback();
        }
    }

    /// Cancel any in-flight utterance, dropping its completion callback.
    pub fn cancel(&self) {
        let was_speaking = {
            let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            let was_speaking = inner.speaking;
            inner.speaking = false;
            inner.on_complete = None;
            was_speaking
        };
        if was_speaking {
            self.synthesizer.cancel();
        }
    }

    /// Whether an utterance is currently in flight.
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .speaking
    }
}
