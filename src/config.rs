//! Configuration types for the voice interaction engine.

use crate::error::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the voice engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wake-word listening settings.
    pub wake: WakeConfig,
    /// Slot-filling dialogue settings.
    pub dialogue: DialogueConfig,
    /// Reminder scheduling settings.
    pub reminder: ReminderConfig,
    /// Speech output (synthesis) settings.
    pub output: OutputConfig,
}

impl EngineConfig {
    /// Parse a configuration from a TOML string.
    ///
    /// Missing sections and fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VoiceError::Config(format!("cannot parse config: {e}")))
    }

    /// Load a configuration file from disk.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(VoiceError::Config(format!(
                "cannot read config {}: {e}",
                path.display()
            ))),
        }
    }
}

/// Wake-word listening configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Wake phrase that activates a command session (case-insensitive,
    /// matched by substring containment in the transcript).
    pub wake_phrase: String,
    /// Recognition language tag passed to the capability (e.g. "en-US").
    pub language: String,
    /// Spoken acknowledgement after the wake phrase is detected.
    pub wake_ack: String,
    /// Maximum automatic re-attempts after a recoverable recognizer error
    /// before listening is permanently disabled.
    pub max_retries: u8,
    /// Delay before restarting after the recognizer ends a session cleanly (ms).
    ///
    /// The underlying recognizer tends to end sessions spontaneously; this
    /// restart is what keeps wake-word listening continuously available.
    pub restart_delay_ms: u64,
    /// Delay before retrying after a session ends with no speech captured (ms).
    pub no_speech_retry_delay_ms: u64,
    /// Delay before retrying after a network or unclassified error (ms).
    ///
    /// These are literal fixed delays, not a computed backoff curve.
    pub error_retry_delay_ms: u64,
    /// Spoken message when listening is disabled after exhausting retries.
    pub disabled_message: String,
    /// Spoken message when the execution context is not secure.
    pub insecure_message: String,
    /// Spoken message when microphone access is denied.
    pub denied_message: String,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "hi voice".to_owned(),
            language: "en-US".to_owned(),
            wake_ack: "yes? what can I do for you?".to_owned(),
            max_retries: 3,
            restart_delay_ms: 1000,
            no_speech_retry_delay_ms: 1500,
            error_retry_delay_ms: 3000,
            disabled_message: "voice recognition keeps failing, so I am turning it off for now"
                .to_owned(),
            insecure_message: "voice recognition needs a secure connection to work".to_owned(),
            denied_message: "I do not have permission to use the microphone".to_owned(),
        }
    }
}

/// Slot-filling dialogue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Phrases that cancel the task-creation session from any state
    /// (case-insensitive, matched on the whole normalized transcript).
    pub cancel_phrases: Vec<String>,
    /// Spoken acknowledgement when the session is cancelled.
    pub cancel_ack: String,
    /// Spoken question that opens reminder negotiation after the last slot.
    pub reminder_question: String,
    /// Spoken question asking for the reminder time.
    pub reminder_time_question: String,
    /// Spoken re-prompt when a reminder time phrase cannot be parsed.
    pub reminder_time_reprompt: String,
    /// Spoken confirmation once the task draft is complete.
    pub completion_ack: String,
    /// Delay before wake-word listening resumes after a session ends (ms).
    pub resume_wake_delay_ms: u64,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            cancel_phrases: vec![
                "cancel".to_owned(),
                "never mind".to_owned(),
                "nevermind".to_owned(),
                "stop".to_owned(),
            ],
            cancel_ack: "okay, I cancelled that".to_owned(),
            reminder_question: "would you like a reminder for this task?".to_owned(),
            reminder_time_question: "when should I remind you?".to_owned(),
            reminder_time_reprompt: "sorry, I did not catch a time. when should I remind you?"
                .to_owned(),
            completion_ack: "all done, I saved your task".to_owned(),
            resume_wake_delay_ms: 1500,
        }
    }
}

/// Reminder scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Hour of day used when a spoken phrase carries a date but no time,
    /// and for suggested reminder times (0-23, UTC).
    pub default_hour: u32,
    /// Spoken announcement when a voice-delivered reminder fires.
    pub announcement: String,
    /// Notification title when a notification-delivered reminder fires.
    pub notification_title: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            default_hour: 9,
            announcement: "you asked me to remind you about a task".to_owned(),
            notification_title: "Task reminder".to_owned(),
        }
    }
}

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Synthesis rate multiplier.
    pub rate: f32,
    /// Synthesis pitch multiplier.
    pub pitch: f32,
    /// Synthesis volume (0.0-1.0).
    pub volume: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_wake_config() {
        let config = WakeConfig::default();
        assert_eq!(config.wake_phrase, "hi voice");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.restart_delay_ms, 1000);
        assert_eq!(config.no_speech_retry_delay_ms, 1500);
        assert_eq!(config.error_retry_delay_ms, 3000);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.wake.wake_phrase, "hi voice");
        assert_eq!(config.reminder.default_hour, 9);
        assert_eq!(config.dialogue.resume_wake_delay_ms, 1500);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
[wake]
wake_phrase = "hey lark"
max_retries = 5
"#,
        )
        .unwrap();
        assert_eq!(config.wake.wake_phrase, "hey lark");
        assert_eq!(config.wake.max_retries, 5);
        assert_eq!(config.wake.restart_delay_ms, 1000);
        assert_eq!(config.output.rate, 1.0);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(EngineConfig::from_toml_str("wake = [").is_err());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = EngineConfig::load(Path::new("/nonexistent/lark.toml")).unwrap();
        assert_eq!(config.wake.wake_phrase, "hi voice");
    }
}
