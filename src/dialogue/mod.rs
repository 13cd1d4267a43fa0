//! Slot-filling dialogue engine.
//!
//! Drives one voice task-creation session: a strictly ordered sequence of
//! spoken questions, answer validation and normalization, and an optional
//! reminder negotiation suffix. Validation failures are never errors:
//! the engine re-asks the same question until it gets a usable answer or
//! the session is cancelled.

pub mod phrases;
pub mod slots;

pub use slots::{QuestionSlot, SlotField, SlotKind, default_task_slots};

use crate::clock::Clock;
use crate::config::DialogueConfig;
use crate::input::SpeechInputController;
use crate::output::SpeechOutputController;
use crate::task::{Priority, TaskDraft};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

/// Where the reminder negotiation suffix currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderPhase {
    /// Still filling slots.
    None,
    /// Asked whether a reminder is wanted.
    AwaitingYesNo,
    /// Asked when to remind.
    AwaitingTime,
    /// Negotiation finished.
    Resolved,
}

/// Result of a completed task-creation session.
#[derive(Debug, Clone)]
pub struct DialogueOutcome {
    /// The completed task draft.
    pub draft: TaskDraft,
    /// Requested reminder time, if the user asked for one.
    pub reminder_at: Option<DateTime<Utc>>,
}

/// Handler invoked when a session completes.
pub type CompletionHandler = Box<dyn FnMut(DialogueOutcome) + Send>;
/// Handler invoked when a session is cancelled.
pub type CancelHandler = Box<dyn FnMut() + Send>;

/// Per-session state. Exists only while a session is in progress.
struct DialogueState {
    slot_index: usize,
    title: Option<String>,
    description: Option<String>,
    priority: Option<Priority>,
    category: Option<String>,
    due_date: Option<NaiveDate>,
    reminder_phase: ReminderPhase,
}

impl DialogueState {
    fn new() -> Self {
        Self {
            slot_index: 0,
            title: None,
            description: None,
            priority: None,
            category: None,
            due_date: None,
            reminder_phase: ReminderPhase::None,
        }
    }
}

struct DialogueInner {
    state: Option<DialogueState>,
    on_complete: Option<CompletionHandler>,
    on_cancel: Option<CancelHandler>,
}

/// What `handle_transcript` decided to do, performed outside the lock.
enum Step {
    /// Speak a corrective prompt and listen again.
    ReAsk(String),
    /// Speak an acknowledgement, then ask the next question.
    AckThenAsk(String),
    /// Ask the current question (no acknowledgement).
    AskCurrent,
    /// The session is complete.
    Complete(DialogueOutcome),
    /// Nothing to do.
    Ignore,
}

/// The slot-filling dialogue state machine.
pub struct DialogueEngine {
    slots: Vec<QuestionSlot>,
    config: DialogueConfig,
    /// Hour of day used when a reminder phrase names a date but no time.
    default_hour: u32,
    output: Arc<SpeechOutputController>,
    input: Arc<SpeechInputController>,
    clock: Arc<dyn Clock>,
    inner: Mutex<DialogueInner>,
}

impl DialogueEngine {
    /// Create a dialogue engine over the given slot sequence.
    pub fn new(
        slots: Vec<QuestionSlot>,
        config: DialogueConfig,
        default_hour: u32,
        output: Arc<SpeechOutputController>,
        input: Arc<SpeechInputController>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            slots,
            config,
            default_hour,
            output,
            input,
            clock,
            inner: Mutex::new(DialogueInner {
                state: None,
                on_complete: None,
                on_cancel: None,
            }),
        })
    }

    /// Register the completion handler (single-subscriber).
    pub fn set_on_complete(&self, handler: CompletionHandler) {
        self.lock().on_complete = Some(handler);
    }

    /// Register the cancellation handler (single-subscriber).
    pub fn set_on_cancel(&self, handler: CancelHandler) {
        self.lock().on_cancel = Some(handler);
    }

    /// Whether a task-creation session is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().state.is_some()
    }

    /// Begin a task-creation session: speak the first question, then
    /// listen for the answer.
    pub fn begin(self: &Arc<Self>) {
        {
            let mut inner = self.lock();
            if inner.state.is_some() {
                warn!("task session already in progress, ignoring begin");
                return;
            }
            if self.slots.is_empty() {
                warn!("no question slots configured, ignoring begin");
                return;
            }
            inner.state = Some(DialogueState::new());
        }
        info!("task-creation session started");
        self.ask_current();
    }

    /// Cancel the session from any state.
    pub fn cancel(self: &Arc<Self>) {
        {
            let mut inner = self.lock();
            if inner.state.take().is_none() {
                return;
            }
        }
        info!("task-creation session cancelled");
        self.input.stop_active_listening();
        self.output.speak(&self.config.cancel_ack, None);
        self.emit_cancel();
    }

    /// Consume a transcript captured while this session is active.
    ///
    /// The transcript is normalized to lower-cased trimmed text before
    /// any branching.
    pub fn handle_transcript(self: &Arc<Self>, text: &str) {
        let text = text.trim().to_lowercase();
        if self.config.cancel_phrases.iter().any(|p| *p == text) {
            self.cancel();
            return;
        }

        let step = {
            let mut inner = self.lock();
            let Some(state) = inner.state.as_mut() else {
                debug!("transcript with no active session, ignoring");
                return;
            };
            let step = self.advance_state(state, &text);
            if matches!(step, Step::Complete(_)) {
                inner.state = None;
            }
            step
        };

        match step {
            Step::ReAsk(prompt) => self.speak_then_listen(&prompt),
            Step::AckThenAsk(ack) => {
                let weak = Arc::downgrade(self);
                self.output.speak(
                    &ack,
                    Some(Box::new(move || {
                        if let Some(engine) = weak.upgrade() {
                            engine.ask_current();
                        }
                    })),
                );
            }
            Step::AskCurrent => self.ask_current(),
            Step::Complete(outcome) => {
                info!("task-creation session complete: \"{}\"", outcome.draft.title);
                self.input.stop_active_listening();
                self.output.speak(&self.config.completion_ack, None);
                self.emit_complete(outcome);
            }
            Step::Ignore => {}
        }
    }

    /// Apply one answer to the session state and decide the next step.
    fn advance_state(&self, state: &mut DialogueState, text: &str) -> Step {
        match state.reminder_phase {
            ReminderPhase::None => self.advance_slot(state, text),
            ReminderPhase::AwaitingYesNo => {
                if phrases::is_affirmative(text) {
                    state.reminder_phase = ReminderPhase::AwaitingTime;
                    Step::AskCurrent
                } else {
                    state.reminder_phase = ReminderPhase::Resolved;
                    Step::Complete(Self::outcome(state, None))
                }
            }
            ReminderPhase::AwaitingTime => {
                if phrases::is_skip(text) {
                    state.reminder_phase = ReminderPhase::Resolved;
                    return Step::Complete(Self::outcome(state, None));
                }
                match phrases::resolve_time_phrase(text, self.clock.now(), self.default_hour) {
                    Some(at) => {
                        state.reminder_phase = ReminderPhase::Resolved;
                        Step::Complete(Self::outcome(state, Some(at)))
                    }
                    // No retry cap here: an unparsable time is re-asked,
                    // bounded only by the user's patience.
                    None => Step::ReAsk(self.config.reminder_time_reprompt.clone()),
                }
            }
            ReminderPhase::Resolved => Step::Ignore,
        }
    }

    fn advance_slot(&self, state: &mut DialogueState, text: &str) -> Step {
        let slot = &self.slots[state.slot_index];

        if phrases::is_skip(text) {
            if slot.required {
                debug!("required slot '{}' skipped, re-asking", slot.id);
                return Step::ReAsk(slot.reject_prompt.clone());
            }
            debug!("optional slot '{}' skipped", slot.id);
            Self::advance_position(state, self.slots.len());
            return Step::AskCurrent;
        }

        if let Some(validator) = &slot.validator
            && !validator(text)
        {
            debug!("slot '{}' answer rejected by validator", slot.id);
            return Step::ReAsk(slot.reject_prompt.clone());
        }

        let acked_value = match &slot.kind {
            SlotKind::FreeText => {
                Self::store_text(state, slot.field, text);
                Some(text.to_owned())
            }
            SlotKind::Enumerated { options, fallback } => {
                let chosen = options
                    .iter()
                    .find(|option| text.contains(option.as_str()))
                    .unwrap_or(fallback)
                    .clone();
                Self::store_text(state, slot.field, &chosen);
                Some(chosen)
            }
            SlotKind::Date => {
                match phrases::resolve_date_phrase(text, self.clock.now().date_naive()) {
                    Some(date) => {
                        if slot.field == SlotField::DueDate {
                            state.due_date = Some(date);
                        }
                        Some(text.to_owned())
                    }
                    // Unresolvable date phrases leave the field unset.
                    None => None,
                }
            }
        };

        Self::advance_position(state, self.slots.len());
        match acked_value {
            Some(value) => Step::AckThenAsk(format!("{} {value}", slot.ack_template)),
            None => Step::AskCurrent,
        }
    }

    fn advance_position(state: &mut DialogueState, slot_count: usize) {
        state.slot_index += 1;
        if state.slot_index >= slot_count {
            state.reminder_phase = ReminderPhase::AwaitingYesNo;
        }
    }

    fn store_text(state: &mut DialogueState, field: SlotField, value: &str) {
        match field {
            SlotField::Title => state.title = Some(value.to_owned()),
            SlotField::Description => state.description = Some(value.to_owned()),
            SlotField::Priority => {
                state.priority = Some(Priority::from_name(value).unwrap_or_default());
            }
            SlotField::Category => state.category = Some(value.to_owned()),
            SlotField::DueDate => {}
        }
    }

    fn outcome(state: &mut DialogueState, reminder_at: Option<DateTime<Utc>>) -> DialogueOutcome {
        DialogueOutcome {
            draft: TaskDraft {
                // The title slot is required, so a completed session
                // always carries one.
                title: state.title.take().unwrap_or_default(),
                description: state.description.take(),
                priority: state.priority.take().unwrap_or_default(),
                category: state.category.take(),
                due_date: state.due_date.take(),
            },
            reminder_at,
        }
    }

    fn ask_current(self: &Arc<Self>) {
        let prompt = {
            let inner = self.lock();
            let Some(state) = inner.state.as_ref() else {
                return;
            };
            match state.reminder_phase {
                ReminderPhase::None => self.slots[state.slot_index].prompt.clone(),
                ReminderPhase::AwaitingYesNo => self.config.reminder_question.clone(),
                ReminderPhase::AwaitingTime => self.config.reminder_time_question.clone(),
                ReminderPhase::Resolved => return,
            }
        };
        self.speak_then_listen(&prompt);
    }

    /// Speak a question, then start capturing the answer once the
    /// utterance finishes.
    fn speak_then_listen(self: &Arc<Self>, text: &str) {
        let input = Arc::downgrade(&self.input);
        self.output.speak(
            text,
            Some(Box::new(move || {
                if let Some(input) = input.upgrade() {
                    input.start_active_listening();
                }
            })),
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DialogueInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn emit_complete(&self, outcome: DialogueOutcome) {
        let handler = self.lock().on_complete.take();
        if let Some(mut handler) = handler {
            handler(outcome);
            let mut inner = self.lock();
            if inner.on_complete.is_none() {
                inner.on_complete = Some(handler);
            }
        }
    }

    fn emit_cancel(&self) {
        let handler = self.lock().on_cancel.take();
        if let Some(mut handler) = handler {
            handler();
            let mut inner = self.lock();
            if inner.on_cancel.is_none() {
                inner.on_cancel = Some(handler);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{OutputConfig, WakeConfig};
    use crate::testing::{FakeRecognizer, FakeSynthesizer};
    use chrono::TimeZone;

    struct Harness {
        dialogue: Arc<DialogueEngine>,
        output: Arc<SpeechOutputController>,
        synthesizer: Arc<FakeSynthesizer>,
        outcomes: Arc<Mutex<Vec<DialogueOutcome>>>,
        cancels: Arc<Mutex<usize>>,
    }

    impl Harness {
        /// Finish the in-flight utterance, as the synthesis adapter would.
        fn finish_utterance(&self) {
            self.output.handle_synthesis_end();
        }

        /// Simulate one spoken answer: let the question finish, then
        /// deliver the normalized transcript.
        fn answer(&self, text: &str) {
            self.finish_utterance();
            self.dialogue.handle_transcript(text);
        }
    }

    fn harness() -> Harness {
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let clock = Arc::new(ManualClock::new(
            // A Monday at noon.
            chrono::Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(),
        ));
        let output = SpeechOutputController::new(
            Arc::clone(&synthesizer) as _,
            OutputConfig::default(),
        );
        let input = SpeechInputController::new(
            Arc::new(FakeRecognizer::default()),
            Arc::clone(&output),
            Arc::clone(&clock) as _,
            WakeConfig::default(),
        );
        let dialogue = DialogueEngine::new(
            default_task_slots(),
            DialogueConfig::default(),
            9,
            Arc::clone(&output),
            input,
            clock,
        );

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let o = Arc::clone(&outcomes);
        dialogue.set_on_complete(Box::new(move |outcome| {
            o.lock().unwrap().push(outcome);
        }));
        let cancels = Arc::new(Mutex::new(0));
        let c = Arc::clone(&cancels);
        dialogue.set_on_cancel(Box::new(move || {
            *c.lock().unwrap() += 1;
        }));

        Harness {
            dialogue,
            output,
            synthesizer,
            outcomes,
            cancels,
        }
    }

    #[test]
    fn begin_asks_the_first_question() {
        let h = harness();
        h.dialogue.begin();
        assert!(h.dialogue.is_active());
        assert_eq!(
            h.synthesizer.last_spoken().unwrap(),
            default_task_slots()[0].prompt
        );
    }

    #[test]
    fn required_title_skip_re_asks_without_advancing() {
        let h = harness();
        h.dialogue.begin();

        h.answer("skip");
        assert_eq!(
            h.synthesizer.last_spoken().unwrap(),
            default_task_slots()[0].reject_prompt
        );

        // An empty transcript behaves the same way.
        h.answer("");
        assert_eq!(
            h.synthesizer.last_spoken().unwrap(),
            default_task_slots()[0].reject_prompt
        );
        assert!(h.dialogue.is_active());
        assert!(h.outcomes.lock().unwrap().is_empty());
    }

    #[test]
    fn accepted_answer_is_acknowledged_then_next_question_asked() {
        let h = harness();
        h.dialogue.begin();

        h.answer("buy milk");
        assert_eq!(
            h.synthesizer.last_spoken().unwrap(),
            "got it, the task is buy milk"
        );

        // The acknowledgement finishing triggers the next question.
        h.finish_utterance();
        assert_eq!(
            h.synthesizer.last_spoken().unwrap(),
            default_task_slots()[1].prompt
        );
    }

    #[test]
    fn full_session_produces_expected_draft() {
        let h = harness();
        h.dialogue.begin();

        h.answer("Buy milk");
        h.finish_utterance(); // ack done, next question spoken
        h.answer("skip"); // description
        h.answer("i'd say high priority");
        h.finish_utterance();
        h.answer("skip"); // category
        h.answer("tomorrow"); // due date
        h.finish_utterance();
        h.answer("no"); // no reminder

        let outcomes = h.outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes[0];
        assert_eq!(outcome.draft.title, "buy milk");
        assert_eq!(outcome.draft.description, None);
        assert_eq!(outcome.draft.priority, Priority::High);
        assert_eq!(outcome.draft.category, None);
        assert_eq!(
            outcome.draft.due_date,
            chrono::NaiveDate::from_ymd_opt(2024, 6, 4)
        );
        assert_eq!(outcome.reminder_at, None);
        assert!(!h.dialogue.is_active());
    }

    #[test]
    fn unrecognized_priority_falls_back_to_medium() {
        let h = harness();
        h.dialogue.begin();

        h.answer("buy milk");
        h.finish_utterance();
        h.answer("skip"); // description
        h.answer("extremely urgent"); // matches no option
        h.finish_utterance();
        h.answer("skip"); // category
        h.answer("skip"); // due date
        h.answer("no"); // no reminder

        let outcomes = h.outcomes.lock().unwrap();
        assert_eq!(outcomes[0].draft.priority, Priority::Medium);
    }

    #[test]
    fn unresolvable_due_date_is_left_unset() {
        let h = harness();
        h.dialogue.begin();

        h.answer("buy milk");
        h.finish_utterance();
        h.answer("skip");
        h.answer("low");
        h.finish_utterance();
        h.answer("skip");
        h.answer("at some point maybe"); // unresolvable
        h.answer("no");

        let outcomes = h.outcomes.lock().unwrap();
        assert_eq!(outcomes[0].draft.due_date, None);
    }

    #[test]
    fn reminder_negotiation_yields_resolved_time() {
        let h = harness();
        h.dialogue.begin();

        h.answer("buy milk");
        h.finish_utterance();
        h.answer("skip");
        h.answer("high");
        h.finish_utterance();
        h.answer("skip");
        h.answer("skip");
        h.answer("yes"); // wants a reminder
        assert_eq!(
            h.synthesizer.last_spoken().unwrap(),
            DialogueConfig::default().reminder_time_question
        );
        h.answer("tomorrow at 9");

        let outcomes = h.outcomes.lock().unwrap();
        assert_eq!(
            outcomes[0].reminder_at,
            Some(chrono::Utc.with_ymd_and_hms(2024, 6, 4, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn unparsable_reminder_time_re_prompts_without_cap() {
        let h = harness();
        h.dialogue.begin();

        h.answer("buy milk");
        h.finish_utterance();
        h.answer("skip");
        h.answer("high");
        h.finish_utterance();
        h.answer("skip");
        h.answer("skip");
        h.answer("yes");

        for _ in 0..5 {
            h.answer("whenever suits");
            assert_eq!(
                h.synthesizer.last_spoken().unwrap(),
                DialogueConfig::default().reminder_time_reprompt
            );
        }
        assert!(h.dialogue.is_active());

        h.answer("in 10 minutes");
        assert_eq!(h.outcomes.lock().unwrap().len(), 1);
    }

    #[test]
    fn cancel_phrase_ends_the_session() {
        let h = harness();
        h.dialogue.begin();

        h.answer("never mind");
        assert!(!h.dialogue.is_active());
        assert_eq!(*h.cancels.lock().unwrap(), 1);
        assert_eq!(
            h.synthesizer.last_spoken().unwrap(),
            DialogueConfig::default().cancel_ack
        );
        assert!(h.outcomes.lock().unwrap().is_empty());
    }

    #[test]
    fn explicit_cancel_is_idempotent() {
        let h = harness();
        h.dialogue.begin();
        h.dialogue.cancel();
        h.dialogue.cancel();
        assert_eq!(*h.cancels.lock().unwrap(), 1);
    }

    #[test]
    fn transcript_without_session_is_ignored() {
        let h = harness();
        h.dialogue.handle_transcript("buy milk");
        assert!(h.outcomes.lock().unwrap().is_empty());
        assert!(h.synthesizer.spoken().is_empty());
    }
}
