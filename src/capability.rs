//! External capability interfaces consumed by the engine.
//!
//! The engine drives speech recognition, speech synthesis, and desktop
//! notifications through these narrow traits. Production adapters wrap a
//! platform capability and feed its events back into the engine via
//! [`crate::engine::VoiceEngine::handle_recognizer_event`] and
//! [`crate::engine::VoiceEngine::handle_synthesis_end`]; tests use the
//! in-memory fakes in [`crate::testing`].

use crate::error::Result;

/// One finalized recognition result.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Recognized text, as produced by the capability.
    pub text: String,
    /// Capability confidence in \[0, 1\].
    pub confidence: f32,
    /// Whether this is a final result (vs an interim hypothesis).
    pub is_final: bool,
}

/// Error codes reported by the recognition capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerErrorCode {
    /// Network failure while reaching the recognition service.
    Network,
    /// Microphone or recognition access denied.
    NotAllowed,
    /// The session ended without capturing any speech.
    NoSpeech,
    /// The session was stopped intentionally by the controller.
    Aborted,
    /// Any other capability-specific code.
    Other(String),
}

/// Events emitted by the recognition capability.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// A recognition session started.
    SessionStart,
    /// A recognition session ended (cleanly or after an error).
    SessionEnd,
    /// A recognition result arrived.
    Result(Utterance),
    /// The session failed with a classified error code.
    Error(RecognizerErrorCode),
}

/// Settings passed to the capability when a session starts.
#[derive(Debug, Clone)]
pub struct RecognizerSettings {
    /// Keep the session open across multiple utterances.
    pub continuous: bool,
    /// Deliver interim (non-final) hypotheses.
    pub interim_results: bool,
    /// Recognition language tag (e.g. "en-US").
    pub language: String,
}

/// Speech recognition capability.
///
/// The engine owns the single recognition session: only the input
/// controller calls `start`/`stop`, and stopping is a request the
/// capability acknowledges asynchronously with a
/// [`RecognizerEvent::SessionEnd`].
pub trait Recognizer: Send + Sync {
    /// Request a recognition session.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability is unavailable or already
    /// running. The engine absorbs this (logs only) rather than failing.
    fn start(&self, settings: &RecognizerSettings) -> Result<()>;

    /// Request that the current session stop.
    ///
    /// Safe to call when no session is running.
    fn stop(&self);

    /// Whether the execution context is secure (HTTPS or local).
    ///
    /// Network errors in an insecure context disable listening
    /// permanently instead of being retried.
    fn secure_context(&self) -> bool {
        true
    }
}

/// Speech synthesis capability.
///
/// Implementations must report completion of each finished utterance by
/// arranging a call to the output controller's `handle_synthesis_end`,
/// and must NOT report completion for an utterance superseded by
/// [`Synthesizer::cancel`].
pub trait Synthesizer: Send + Sync {
    /// Begin synthesizing `text`.
    fn speak(&self, text: &str, rate: f32, pitch: f32, volume: f32);

    /// Cancel any utterance currently being synthesized.
    fn cancel(&self);
}

/// Desktop notification capability.
pub trait Notifier: Send + Sync {
    /// Show a notification to the user.
    fn show(&self, title: &str, body: &str);
}
