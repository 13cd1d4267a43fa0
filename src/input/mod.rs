//! Speech input controller.
//!
//! Owns the single recognition session: wake-word listening, error
//! classification, retry/backoff, and permanent-disable logic. Recognized
//! transcripts are routed to whichever consumer is currently active, the
//! wake-word matcher or a task session. State lives in a
//! [`session::RecognitionSession`] and is mutated only through its
//! transition functions; this module interprets the resulting effects
//! against the real capabilities.

pub mod session;

pub use session::{DisableCause, ListeningState};

use crate::capability::{Recognizer, RecognizerEvent, RecognizerSettings};
use crate::clock::{Clock, TimerId};
use crate::config::WakeConfig;
use crate::output::SpeechOutputController;
use session::{Effect, RecognitionSession, RetryDelays};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handler for wake-phrase detections. Receives the normalized transcript.
pub type WakeHandler = Box<dyn FnMut(String) + Send>;
/// Handler for transcripts captured while actively listening.
pub type TranscriptHandler = Box<dyn FnMut(String) + Send>;
/// Handler for listening-state changes.
pub type StateHandler = Box<dyn FnMut(ListeningState) + Send>;
/// Handler for the one-shot disable alert. Receives the cause and the
/// user-facing message.
pub type AlertHandler = Box<dyn FnMut(DisableCause, String) + Send>;

struct InputInner {
    session: RecognitionSession,
    pending_retry: Option<TimerId>,
    on_wake: Option<WakeHandler>,
    on_transcript: Option<TranscriptHandler>,
    on_state_change: Option<StateHandler>,
    on_alert: Option<AlertHandler>,
}

/// Controller for the shared recognition capability.
pub struct SpeechInputController {
    recognizer: Arc<dyn Recognizer>,
    output: Arc<SpeechOutputController>,
    clock: Arc<dyn Clock>,
    config: WakeConfig,
    inner: Mutex<InputInner>,
}

impl SpeechInputController {
    /// Create a new input controller.
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        output: Arc<SpeechOutputController>,
        clock: Arc<dyn Clock>,
        config: WakeConfig,
    ) -> Arc<Self> {
        let delays = RetryDelays {
            restart_ms: config.restart_delay_ms,
            no_speech_ms: config.no_speech_retry_delay_ms,
            error_ms: config.error_retry_delay_ms,
        };
        let session = RecognitionSession::new(config.max_retries, delays);
        Arc::new(Self {
            recognizer,
            output,
            clock,
            config,
            inner: Mutex::new(InputInner {
                session,
                pending_retry: None,
                on_wake: None,
                on_transcript: None,
                on_state_change: None,
                on_alert: None,
            }),
        })
    }

    /// Register the wake-phrase handler. Only one handler is active at a
    /// time; a later registration replaces the earlier one.
    pub fn set_on_wake_word(&self, handler: WakeHandler) {
        self.lock().on_wake = Some(handler);
    }

    /// Register the transcript handler (single-subscriber).
    pub fn set_on_transcript(&self, handler: TranscriptHandler) {
        self.lock().on_transcript = Some(handler);
    }

    /// Register the listening-state handler (single-subscriber).
    pub fn set_on_listening_change(&self, handler: StateHandler) {
        self.lock().on_state_change = Some(handler);
    }

    /// Register the disable-alert handler (single-subscriber).
    pub fn set_on_alert(&self, handler: AlertHandler) {
        self.lock().on_alert = Some(handler);
    }

    /// Begin listening for the wake phrase.
    ///
    /// Idempotent; logs and returns when listening is disabled or a task
    /// session is actively listening.
    pub fn start_wake_listening(self: &Arc<Self>) {
        let (state, effects) = {
            let mut inner = self.lock();
            let effects = inner.session.start_wake();
            (inner.session.state(), effects)
        };
        if effects.is_empty() {
            debug!("start_wake_listening ignored in state {state:?}");
            return;
        }
        info!("wake-word listening started");
        self.perform(effects);
    }

    /// Suspend wake-word matching and capture the next task-session
    /// transcripts.
    pub fn start_active_listening(self: &Arc<Self>) {
        let effects = self.lock().session.start_active();
        self.perform(effects);
    }

    /// Stop wake-word listening. Safe to call when already stopped.
    pub fn stop_wake_listening(self: &Arc<Self>) {
        let effects = self.lock().session.stop();
        self.perform(effects);
    }

    /// Stop active listening. Safe to call when already stopped.
    pub fn stop_active_listening(self: &Arc<Self>) {
        let effects = self.lock().session.stop();
        self.perform(effects);
    }

    /// Explicit external reset out of the permanently disabled state.
    ///
    /// Clears the retry count and alert guards; the caller decides
    /// whether to start listening again.
    pub fn reset(self: &Arc<Self>) {
        info!("recognition session reset");
        let effects = self.lock().session.reset();
        self.perform(effects);
    }

    /// Current listening state.
    pub fn state(&self) -> ListeningState {
        self.lock().session.state()
    }

    /// Feed a recognizer event into the controller.
    pub fn handle_event(self: &Arc<Self>, event: RecognizerEvent) {
        let effects = match event {
            RecognizerEvent::SessionStart => {
                debug!("recognition session started");
                Vec::new()
            }
            RecognizerEvent::SessionEnd => self.lock().session.handle_session_end(),
            RecognizerEvent::Result(utterance) => {
                if !utterance.is_final {
                    return;
                }
                self.lock()
                    .session
                    .handle_result(&utterance.text, &self.config.wake_phrase)
            }
            RecognizerEvent::Error(code) => {
                let secure = self.recognizer.secure_context();
                warn!("recognizer error: {code:?} (secure_context={secure})");
                self.lock().session.handle_error(&code, secure)
            }
        };
        self.perform(effects);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InputInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn retry_fire(self: &Arc<Self>) {
        let effects = {
            let mut inner = self.lock();
            inner.pending_retry = None;
            inner.session.restart_for_retry()
        };
        debug!("retry timer fired");
        self.perform(effects);
    }

    fn perform(self: &Arc<Self>, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartCapability => {
                    let settings = RecognizerSettings {
                        continuous: true,
                        interim_results: true,
                        language: self.config.language.clone(),
                    };
                    if let Err(e) = self.recognizer.start(&settings) {
                        warn!("cannot start recognition: {e}");
                    }
                }
                Effect::StopCapability => self.recognizer.stop(),
                Effect::CancelPendingRetry => {
                    let pending = self.lock().pending_retry.take();
                    if let Some(id) = pending {
                        self.clock.cancel(id);
                    }
                }
                Effect::ScheduleRetry { delay_ms } => {
                    let weak: Weak<Self> = Arc::downgrade(self);
                    let id = self.clock.schedule(
                        Duration::from_millis(delay_ms),
                        Box::new(move || {
                            if let Some(controller) = weak.upgrade() {
                                controller.retry_fire();
                            }
                        }),
                    );
                    self.lock().pending_retry = Some(id);
                }
                Effect::WakeDetected { transcript } => {
                    info!("wake phrase detected: \"{transcript}\"");
                    self.emit_wake(transcript);
                }
                Effect::ForwardTranscript { transcript } => {
                    self.emit_transcript(transcript);
                }
                Effect::SpeakWakeAck => {
                    self.output.speak(&self.config.wake_ack, None);
                }
                Effect::Disabled(cause) => {
                    let message = match cause {
                        DisableCause::InsecureContext => self.config.insecure_message.clone(),
                        DisableCause::PermissionDenied => self.config.denied_message.clone(),
                        DisableCause::RetriesExhausted => self.config.disabled_message.clone(),
                    };
                    warn!("listening permanently disabled: {cause:?}");
                    // Never go quiet silently: the disable path always
                    // drives a final informative utterance.
                    self.output.speak(&message, None);
                    self.emit_alert(cause, message);
                }
                Effect::StateChanged(state) => {
                    debug!("listening state -> {state:?}");
                    self.emit_state(state);
                }
            }
        }
    }

    // Handlers are taken out of the slot for the duration of the call so
    // they may re-enter the controller (e.g. a wake handler that starts
    // active listening) without deadlocking.

    fn emit_wake(&self, transcript: String) {
        let handler = self.lock().on_wake.take();
        if let Some(mut handler) = handler {
            handler(transcript);
            let mut inner = self.lock();
            if inner.on_wake.is_none() {
                inner.on_wake = Some(handler);
            }
        }
    }

    fn emit_transcript(&self, transcript: String) {
        let handler = self.lock().on_transcript.take();
        if let Some(mut handler) = handler {
            handler(transcript);
            let mut inner = self.lock();
            if inner.on_transcript.is_none() {
                inner.on_transcript = Some(handler);
            }
        }
    }

    fn emit_state(&self, state: ListeningState) {
        let handler = self.lock().on_state_change.take();
        if let Some(mut handler) = handler {
            handler(state);
            let mut inner = self.lock();
            if inner.on_state_change.is_none() {
                inner.on_state_change = Some(handler);
            }
        }
    }

    fn emit_alert(&self, cause: DisableCause, message: String) {
        let handler = self.lock().on_alert.take();
        if let Some(mut handler) = handler {
            handler(cause, message);
            let mut inner = self.lock();
            if inner.on_alert.is_none() {
                inner.on_alert = Some(handler);
            }
        }
    }
}
