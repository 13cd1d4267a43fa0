//! Lark: hands-free voice task assistant engine.
//!
//! This crate provides the voice interaction core for a spoken task list:
//! wake word → slot-filling dialogue → task draft (+ optional reminder)
//!
//! # Architecture
//!
//! Three cooperating state machines share one unreliable, asynchronous
//! recognition session, plus the utterance serializer they all speak
//! through:
//! - **Speech input**: owns the recognition capability; wake-phrase
//!   matching, error classification, bounded fixed-delay retries, and
//!   permanent-disable handling
//! - **Dialogue**: an ordered slot-filling flow that turns free-form
//!   transcripts into a structured task draft, with an optional reminder
//!   negotiation suffix
//! - **Reminders**: persisted, timer-driven, at-most-once delivery that
//!   survives restarts
//! - **Speech output**: one utterance in flight at a time; a newer
//!   utterance supersedes the older one
//!
//! The recognizer, synthesizer, notification surface, and persistence
//! backend are external capabilities injected through the traits in
//! [`capability`] and [`reminder::store`]; timers go through [`clock`] so
//! tests can drive time deterministically.

pub mod capability;
pub mod clock;
pub mod config;
pub mod dialogue;
pub mod engine;
pub mod error;
pub mod input;
pub mod output;
pub mod reminder;
pub mod task;
pub mod testing;

pub use capability::{Notifier, Recognizer, RecognizerEvent, Synthesizer, Utterance};
pub use config::EngineConfig;
pub use dialogue::DialogueOutcome;
pub use engine::VoiceEngine;
pub use error::{Result, VoiceError};
pub use input::{DisableCause, ListeningState};
pub use reminder::{DeliveryMode, Reminder};
pub use task::{Priority, TaskDraft};
