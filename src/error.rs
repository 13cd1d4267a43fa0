//! Error types for the voice interaction engine.

/// Top-level error type for the voice engine.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Recognition capability error.
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Synthesis capability error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Dialogue session error.
    #[error("dialogue error: {0}")]
    Dialogue(String),

    /// Reminder scheduling or state persistence error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VoiceError>;
