//! Voice engine facade.
//!
//! Explicitly constructed wiring of the input controller, dialogue
//! engine, reminder scheduler, and output controller, exposed to the
//! surrounding application as a single control surface. The application
//! injects the platform capabilities, feeds recognizer/synthesizer
//! events in, and observes engine signals through single-subscriber
//! event ports (a later registration replaces the earlier handler).

use crate::capability::{Notifier, Recognizer, RecognizerEvent, Synthesizer};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dialogue::{DialogueEngine, DialogueOutcome, QuestionSlot, default_task_slots};
use crate::input::{DisableCause, ListeningState, SpeechInputController};
use crate::output::SpeechOutputController;
use crate::reminder::{
    DeliveryMode, Reminder, ReminderScheduler, ReminderStore, ReminderUpdate,
    suggest_reminder_times,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::info;

/// Handler for completed task-creation sessions.
pub type TaskHandler = Box<dyn FnMut(DialogueOutcome) + Send>;
/// Handler for fired reminders.
pub type ReminderDueHandler = Box<dyn FnMut(Reminder) + Send>;
/// Handler for one-shot disable alerts.
pub type AlertHandler = Box<dyn FnMut(DisableCause, String) + Send>;
/// Handler for wake detections and forwarded transcripts.
pub type TextHandler = Box<dyn FnMut(String) + Send>;
/// Handler for listening-state changes.
pub type ListeningHandler = Box<dyn FnMut(ListeningState) + Send>;

/// Single-subscriber event ports exposed by the engine.
#[derive(Default)]
struct EventPorts {
    on_wake: Mutex<Option<TextHandler>>,
    on_transcript: Mutex<Option<TextHandler>>,
    on_listening_change: Mutex<Option<ListeningHandler>>,
    on_task_complete: Mutex<Option<TaskHandler>>,
    on_reminder_due: Mutex<Option<ReminderDueHandler>>,
    on_alert: Mutex<Option<AlertHandler>>,
}

/// Take the handler out for the call so it may re-enter the engine.
fn emit<T>(slot: &Mutex<Option<Box<dyn FnMut(T) + Send>>>, value: T) {
    let taken = slot.lock().unwrap_or_else(|p| p.into_inner()).take();
    if let Some(mut handler) = taken {
        handler(value);
        let mut guard = slot.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            *guard = Some(handler);
        }
    }
}

fn emit_alert(slot: &Mutex<Option<AlertHandler>>, cause: DisableCause, message: String) {
    let taken = slot.lock().unwrap_or_else(|p| p.into_inner()).take();
    if let Some(mut handler) = taken {
        handler(cause, message);
        let mut guard = slot.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            *guard = Some(handler);
        }
    }
}

/// The voice interaction engine.
pub struct VoiceEngine {
    config: EngineConfig,
    output: Arc<SpeechOutputController>,
    input: Arc<SpeechInputController>,
    dialogue: Arc<DialogueEngine>,
    reminders: Arc<ReminderScheduler>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    ports: Arc<EventPorts>,
}

impl VoiceEngine {
    /// Build an engine with the default task-creation slot sequence.
    pub fn new(
        config: EngineConfig,
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Arc<dyn Synthesizer>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn ReminderStore>,
    ) -> Arc<Self> {
        Self::with_slots(
            config,
            recognizer,
            synthesizer,
            notifier,
            clock,
            store,
            default_task_slots(),
        )
    }

    /// Build an engine with a custom slot sequence.
    #[allow(clippy::too_many_arguments)]
    pub fn with_slots(
        config: EngineConfig,
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Arc<dyn Synthesizer>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn ReminderStore>,
        slots: Vec<QuestionSlot>,
    ) -> Arc<Self> {
        let output = SpeechOutputController::new(synthesizer, config.output.clone());
        let input = SpeechInputController::new(
            recognizer,
            Arc::clone(&output),
            Arc::clone(&clock),
            config.wake.clone(),
        );
        let dialogue = DialogueEngine::new(
            slots,
            config.dialogue.clone(),
            config.reminder.default_hour,
            Arc::clone(&output),
            Arc::clone(&input),
            Arc::clone(&clock),
        );
        let reminders = ReminderScheduler::new(store, Arc::clone(&clock));
        let ports = Arc::new(EventPorts::default());

        let engine = Arc::new(Self {
            config,
            output,
            input,
            dialogue,
            reminders,
            notifier,
            clock,
            ports,
        });
        engine.wire();
        engine
    }

    fn wire(self: &Arc<Self>) {
        // Wake detections go to the application; it decides whether to
        // begin a task session or treat the follow-up as a command.
        let ports = Arc::clone(&self.ports);
        self.input.set_on_wake_word(Box::new(move |transcript| {
            emit(&ports.on_wake, transcript);
        }));

        // Transcripts belong to the dialogue while a session is active,
        // and to the application's command interpreter otherwise.
        let ports = Arc::clone(&self.ports);
        let dialogue: Weak<DialogueEngine> = Arc::downgrade(&self.dialogue);
        self.input.set_on_transcript(Box::new(move |transcript| {
            if let Some(dialogue) = dialogue.upgrade()
                && dialogue.is_active()
            {
                dialogue.handle_transcript(&transcript);
            } else {
                emit(&ports.on_transcript, transcript);
            }
        }));

        let ports = Arc::clone(&self.ports);
        self.input.set_on_listening_change(Box::new(move |state| {
            emit(&ports.on_listening_change, state);
        }));

        // Disablement surfaces exactly once per cause: a notification
        // plus the application port (the final utterance is spoken by
        // the input controller itself).
        let ports = Arc::clone(&self.ports);
        let notifier = Arc::clone(&self.notifier);
        self.input.set_on_alert(Box::new(move |cause, message| {
            notifier.show("Voice control disabled", &message);
            emit_alert(&ports.on_alert, cause, message);
        }));

        // Session end (complete or cancelled) returns control to
        // wake-word listening after a short delay.
        let ports = Arc::clone(&self.ports);
        let resume = self.resume_closure();
        self.dialogue.set_on_complete(Box::new(move |outcome| {
            resume();
            emit(&ports.on_task_complete, outcome);
        }));

        let resume = self.resume_closure();
        self.dialogue.set_on_cancel(Box::new(move || {
            resume();
        }));

        // Reminder delivery: spoken and/or notified, then forwarded.
        let ports = Arc::clone(&self.ports);
        let output = Arc::clone(&self.output);
        let notifier = Arc::clone(&self.notifier);
        let reminder_config = self.config.reminder.clone();
        self.reminders.set_on_trigger(Box::new(move |reminder| {
            if matches!(reminder.delivery, DeliveryMode::Voice | DeliveryMode::Both) {
                output.speak(&reminder_config.announcement, None);
            }
            if matches!(
                reminder.delivery,
                DeliveryMode::Notification | DeliveryMode::Both
            ) {
                notifier.show(
                    &reminder_config.notification_title,
                    &reminder_config.announcement,
                );
            }
            emit(&ports.on_reminder_due, reminder);
        }));
    }

    /// A closure that resumes wake-word listening after the configured
    /// delay.
    fn resume_closure(self: &Arc<Self>) -> impl Fn() + Send + Sync + 'static {
        let input: Weak<SpeechInputController> = Arc::downgrade(&self.input);
        let clock = Arc::clone(&self.clock);
        let delay = Duration::from_millis(self.config.dialogue.resume_wake_delay_ms);
        move || {
            let input = input.clone();
            clock.schedule(
                delay,
                Box::new(move || {
                    if let Some(input) = input.upgrade() {
                        input.start_wake_listening();
                    }
                }),
            );
        }
    }

    /// Start the engine: reconstitute persisted reminders and begin
    /// wake-word listening. Returns the number of reminders rescheduled.
    ///
    /// # Errors
    ///
    /// Returns an error if the reminder store cannot be read.
    pub fn start(self: &Arc<Self>) -> crate::error::Result<usize> {
        let restored = self.reminders.restore()?;
        self.input.start_wake_listening();
        info!("voice engine started ({restored} reminders restored)");
        Ok(restored)
    }

    /// Stop listening and cancel any in-flight utterance. Scheduled
    /// reminders keep running until the engine is dropped.
    pub fn stop(self: &Arc<Self>) {
        self.dialogue.cancel();
        self.input.stop_wake_listening();
        self.output.cancel();
    }

    // ── Listening control ───────────────────────────────────────────

    /// Begin wake-word listening. Idempotent.
    pub fn start_wake_listening(self: &Arc<Self>) {
        self.input.start_wake_listening();
    }

    /// Stop wake-word listening. Idempotent.
    pub fn stop_wake_listening(self: &Arc<Self>) {
        self.input.stop_wake_listening();
    }

    /// Capture the next transcripts for the application's own command
    /// handling (outside a task session).
    pub fn start_active_listening(self: &Arc<Self>) {
        self.input.start_active_listening();
    }

    /// Explicit reset out of the permanently disabled state.
    pub fn reset_listening(self: &Arc<Self>) {
        self.input.reset();
    }

    /// Current listening state.
    #[must_use]
    pub fn listening_state(&self) -> ListeningState {
        self.input.state()
    }

    // ── Task sessions ───────────────────────────────────────────────

    /// Trigger a voice task-creation session.
    pub fn begin_task_session(self: &Arc<Self>) {
        self.dialogue.begin();
    }

    /// Cancel the task-creation session, if one is in progress.
    pub fn cancel_task_session(self: &Arc<Self>) {
        self.dialogue.cancel();
    }

    /// Whether a task-creation session is in progress.
    #[must_use]
    pub fn session_active(&self) -> bool {
        self.dialogue.is_active()
    }

    // ── Capability event ingress ────────────────────────────────────

    /// Feed a recognition capability event into the engine.
    pub fn handle_recognizer_event(self: &Arc<Self>, event: RecognizerEvent) {
        self.input.handle_event(event);
    }

    /// Report that the current utterance finished synthesizing.
    pub fn handle_synthesis_end(self: &Arc<Self>) {
        self.output.handle_synthesis_end();
    }

    // ── Reminders ───────────────────────────────────────────────────

    /// Create and schedule a reminder for a stored task.
    ///
    /// # Errors
    ///
    /// Returns an error if the reminder set cannot be persisted.
    pub fn add_reminder(
        self: &Arc<Self>,
        task_id: &str,
        due_at: DateTime<Utc>,
        delivery: DeliveryMode,
    ) -> crate::error::Result<Reminder> {
        self.reminders.add_reminder(task_id, due_at, delivery)
    }

    /// Cancel and delete a reminder.
    ///
    /// # Errors
    ///
    /// Returns an error if the reminder set cannot be persisted.
    pub fn remove_reminder(self: &Arc<Self>, id: uuid::Uuid) -> crate::error::Result<bool> {
        self.reminders.remove_reminder(id)
    }

    /// Update a reminder, rescheduling it while it remains active.
    ///
    /// # Errors
    ///
    /// Returns an error if the reminder set cannot be persisted.
    pub fn update_reminder(
        self: &Arc<Self>,
        id: uuid::Uuid,
        update: ReminderUpdate,
    ) -> crate::error::Result<bool> {
        self.reminders.update_reminder(id, update)
    }

    /// Snapshot of all reminders, active and historical.
    #[must_use]
    pub fn reminders(&self) -> Vec<Reminder> {
        self.reminders.reminders()
    }

    /// Propose candidate reminder times for a task due date.
    #[must_use]
    pub fn suggest_reminder_times(&self, due_date: Option<NaiveDate>) -> Vec<DateTime<Utc>> {
        suggest_reminder_times(due_date, self.clock.now(), self.config.reminder.default_hour)
    }

    // ── Event port registration ─────────────────────────────────────

    /// Register the wake-detection handler (single-subscriber).
    pub fn on_wake_word(&self, handler: TextHandler) {
        *self
            .ports
            .on_wake
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(handler);
    }

    /// Register the command-transcript handler (single-subscriber).
    pub fn on_transcript(&self, handler: TextHandler) {
        *self
            .ports
            .on_transcript
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(handler);
    }

    /// Register the listening-state handler (single-subscriber).
    pub fn on_listening_change(&self, handler: ListeningHandler) {
        *self
            .ports
            .on_listening_change
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(handler);
    }

    /// Register the task-completion handler (single-subscriber).
    pub fn on_task_complete(&self, handler: TaskHandler) {
        *self
            .ports
            .on_task_complete
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(handler);
    }

    /// Register the reminder-due handler (single-subscriber).
    pub fn on_reminder_due(&self, handler: ReminderDueHandler) {
        *self
            .ports
            .on_reminder_due
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(handler);
    }

    /// Register the disable-alert handler (single-subscriber).
    pub fn on_alert(&self, handler: AlertHandler) {
        *self
            .ports
            .on_alert
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(handler);
    }
}
