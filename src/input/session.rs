//! Recognition session state machine.
//!
//! Pure transition functions over [`RecognitionSession`]: every recognizer
//! event maps to a list of [`Effect`]s for the controller to perform. No
//! capability, timer, or callback is touched here, so the retry/backoff and
//! permanent-disable policy is unit-testable without a real recognizer.

use crate::capability::RecognizerErrorCode;

/// Listening state of the single recognition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningState {
    /// Not listening.
    Idle,
    /// Listening for the wake phrase.
    WaitingForWakeWord,
    /// Listening for a task-session transcript.
    ActiveListening,
    /// Listening disabled until an explicit reset.
    PermanentlyDisabled,
}

/// Why listening was permanently disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableCause {
    /// Network recognition requires a secure execution context.
    InsecureContext,
    /// Microphone or recognition access was denied.
    PermissionDenied,
    /// The retry budget was exhausted by transient errors.
    RetriesExhausted,
}

/// Side effects requested by a state transition.
#[derive(Debug, PartialEq, Eq)]
pub enum Effect {
    /// Request the recognition capability to start a session.
    StartCapability,
    /// Request the recognition capability to stop.
    StopCapability,
    /// Cancel any pending retry timer.
    CancelPendingRetry,
    /// Schedule a capability restart after a fixed delay.
    ScheduleRetry {
        /// Delay before the restart, in milliseconds.
        delay_ms: u64,
    },
    /// The wake phrase was detected in a transcript.
    WakeDetected {
        /// Normalized transcript that contained the wake phrase.
        transcript: String,
    },
    /// Forward a normalized transcript to the active consumer.
    ForwardTranscript {
        /// Lower-cased, trimmed transcript.
        transcript: String,
    },
    /// Speak the wake acknowledgement.
    SpeakWakeAck,
    /// Listening was permanently disabled; surface the cause once.
    Disabled(DisableCause),
    /// The listening state changed.
    StateChanged(ListeningState),
}

/// Fixed retry delays, in milliseconds.
///
/// These are literal configured constants (see `WakeConfig`), not a
/// computed backoff curve.
#[derive(Debug, Clone, Copy)]
pub struct RetryDelays {
    /// Restart delay after a clean session end.
    pub restart_ms: u64,
    /// Retry delay after a session ends with no speech captured.
    pub no_speech_ms: u64,
    /// Retry delay after a network or unclassified error.
    pub error_ms: u64,
}

/// The single recognition session owned by the input controller.
///
/// `retry_count` resets to 0 only on a successful final result or an
/// explicit fresh start, never implicitly on a restart attempt.
#[derive(Debug)]
pub struct RecognitionSession {
    state: ListeningState,
    retry_count: u8,
    max_retries: u8,
    delays: RetryDelays,
    insecure_alerted: bool,
    denied_alerted: bool,
    exhausted_alerted: bool,
}

impl RecognitionSession {
    /// Create a fresh session in the `Idle` state.
    #[must_use]
    pub fn new(max_retries: u8, delays: RetryDelays) -> Self {
        Self {
            state: ListeningState::Idle,
            retry_count: 0,
            max_retries,
            delays,
            insecure_alerted: false,
            denied_alerted: false,
            exhausted_alerted: false,
        }
    }

    /// Current listening state.
    #[must_use]
    pub fn state(&self) -> ListeningState {
        self.state
    }

    /// Current retry count.
    #[must_use]
    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    fn capability_running(&self) -> bool {
        matches!(
            self.state,
            ListeningState::WaitingForWakeWord | ListeningState::ActiveListening
        )
    }

    /// Begin listening for the wake phrase.
    ///
    /// Valid from `Idle` (fresh start, resets the retry count) or
    /// `WaitingForWakeWord` (idempotent no-op). Has no effect while
    /// disabled or while a task session is actively listening.
    pub fn start_wake(&mut self) -> Vec<Effect> {
        match self.state {
            ListeningState::Idle => {
                self.retry_count = 0;
                self.state = ListeningState::WaitingForWakeWord;
                vec![
                    Effect::StateChanged(self.state),
                    Effect::StartCapability,
                ]
            }
            ListeningState::WaitingForWakeWord
            | ListeningState::ActiveListening
            | ListeningState::PermanentlyDisabled => Vec::new(),
        }
    }

    /// Suspend wake-word matching and listen for a task-session transcript.
    pub fn start_active(&mut self) -> Vec<Effect> {
        match self.state {
            ListeningState::PermanentlyDisabled => Vec::new(),
            ListeningState::ActiveListening => vec![Effect::CancelPendingRetry],
            ListeningState::WaitingForWakeWord => {
                // The capability session keeps running; only the consumer
                // of its transcripts changes.
                self.state = ListeningState::ActiveListening;
                vec![
                    Effect::CancelPendingRetry,
                    Effect::StateChanged(self.state),
                ]
            }
            ListeningState::Idle => {
                self.state = ListeningState::ActiveListening;
                vec![
                    Effect::CancelPendingRetry,
                    Effect::StateChanged(self.state),
                    Effect::StartCapability,
                ]
            }
        }
    }

    /// Stop listening. Safe to call when already stopped: no duplicate
    /// stop request reaches the capability.
    pub fn stop(&mut self) -> Vec<Effect> {
        match self.state {
            ListeningState::Idle | ListeningState::PermanentlyDisabled => {
                vec![Effect::CancelPendingRetry]
            }
            ListeningState::WaitingForWakeWord | ListeningState::ActiveListening => {
                self.state = ListeningState::Idle;
                vec![
                    Effect::CancelPendingRetry,
                    Effect::StopCapability,
                    Effect::StateChanged(self.state),
                ]
            }
        }
    }

    /// A previously scheduled retry timer fired: restart the capability if
    /// the session is still listening. The retry count is not reset here.
    pub fn restart_for_retry(&mut self) -> Vec<Effect> {
        if self.capability_running() {
            vec![Effect::StartCapability]
        } else {
            Vec::new()
        }
    }

    /// Handle a final recognition result.
    ///
    /// The transcript is normalized to lower-cased trimmed text. Any final
    /// result resets the retry count: a working recognizer implies health.
    pub fn handle_result(&mut self, transcript: &str, wake_phrase: &str) -> Vec<Effect> {
        let normalized = transcript.trim().to_lowercase();
        match self.state {
            ListeningState::WaitingForWakeWord => {
                self.retry_count = 0;
                if normalized.contains(&wake_phrase.to_lowercase()) {
                    // Ack first: anything the wake handler speaks then
                    // supersedes the ack, not the other way round.
                    vec![
                        Effect::SpeakWakeAck,
                        Effect::WakeDetected {
                            transcript: normalized,
                        },
                    ]
                } else {
                    Vec::new()
                }
            }
            ListeningState::ActiveListening => {
                self.retry_count = 0;
                vec![Effect::ForwardTranscript {
                    transcript: normalized,
                }]
            }
            ListeningState::Idle | ListeningState::PermanentlyDisabled => Vec::new(),
        }
    }

    /// Handle a recognizer error, classified per the error policy.
    pub fn handle_error(&mut self, code: &RecognizerErrorCode, secure_context: bool) -> Vec<Effect> {
        if self.state == ListeningState::PermanentlyDisabled {
            // Stale capability callback after disablement.
            return Vec::new();
        }
        match code {
            RecognizerErrorCode::Aborted => Vec::new(),
            RecognizerErrorCode::NotAllowed => self.disable(DisableCause::PermissionDenied),
            RecognizerErrorCode::Network if !secure_context => {
                self.disable(DisableCause::InsecureContext)
            }
            RecognizerErrorCode::Network => self.bounded_retry(self.delays.error_ms),
            RecognizerErrorCode::NoSpeech => {
                if self.state == ListeningState::WaitingForWakeWord {
                    self.bounded_retry(self.delays.no_speech_ms)
                } else {
                    Vec::new()
                }
            }
            RecognizerErrorCode::Other(_) => self.bounded_retry(self.delays.error_ms),
        }
    }

    /// Handle the capability ending a session.
    ///
    /// While still waiting for the wake word, the controller restarts
    /// after a fixed delay, subject to the retry budget. This keeps
    /// wake-word listening continuously available despite the recognizer's
    /// tendency to end sessions spontaneously.
    pub fn handle_session_end(&mut self) -> Vec<Effect> {
        match self.state {
            ListeningState::WaitingForWakeWord => {
                if self.retry_count >= self.max_retries {
                    self.disable(DisableCause::RetriesExhausted)
                } else {
                    vec![
                        Effect::CancelPendingRetry,
                        Effect::ScheduleRetry {
                            delay_ms: self.delays.restart_ms,
                        },
                    ]
                }
            }
            ListeningState::Idle
            | ListeningState::ActiveListening
            | ListeningState::PermanentlyDisabled => Vec::new(),
        }
    }

    /// Explicit external reset: clears the disabled state, the retry
    /// count, and the one-shot alert guards.
    pub fn reset(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::CancelPendingRetry];
        if self.capability_running() {
            effects.push(Effect::StopCapability);
        }
        let changed = self.state != ListeningState::Idle;
        self.state = ListeningState::Idle;
        self.retry_count = 0;
        self.insecure_alerted = false;
        self.denied_alerted = false;
        self.exhausted_alerted = false;
        if changed {
            effects.push(Effect::StateChanged(self.state));
        }
        effects
    }

    fn bounded_retry(&mut self, delay_ms: u64) -> Vec<Effect> {
        if !self.capability_running() {
            return Vec::new();
        }
        self.retry_count = self.retry_count.saturating_add(1);
        if self.retry_count < self.max_retries {
            vec![
                Effect::CancelPendingRetry,
                Effect::ScheduleRetry { delay_ms },
            ]
        } else {
            self.disable(DisableCause::RetriesExhausted)
        }
    }

    fn disable(&mut self, cause: DisableCause) -> Vec<Effect> {
        let mut effects = vec![Effect::CancelPendingRetry];
        if self.capability_running() {
            effects.push(Effect::StopCapability);
        }
        self.state = ListeningState::PermanentlyDisabled;
        effects.push(Effect::StateChanged(self.state));

        let alerted = match cause {
            DisableCause::InsecureContext => &mut self.insecure_alerted,
            DisableCause::PermissionDenied => &mut self.denied_alerted,
            DisableCause::RetriesExhausted => &mut self.exhausted_alerted,
        };
        if !*alerted {
            *alerted = true;
            effects.push(Effect::Disabled(cause));
        }
        effects
    }
}
