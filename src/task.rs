//! Task draft value produced by a completed voice session.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (default when no answer ever sets it).
    #[default]
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// Parse a priority from its spoken/config name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// An immutable task draft, handed to the external task store when a
/// voice task-creation session completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Task title. Always non-empty; the title slot is required.
    pub title: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Task priority.
    pub priority: Priority,
    /// Optional category label.
    pub category: Option<String>,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
}
