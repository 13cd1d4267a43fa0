//! Reminder persistence.
//!
//! The reminder set is persisted wholesale on every mutation: a single
//! versioned JSON document holding the full ordered list. Production uses
//! [`JsonFileStore`]; tests use [`MemoryReminderStore`].

use crate::error::{Result, VoiceError};
use crate::reminder::Reminder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Durable storage for the reminder set.
pub trait ReminderStore: Send + Sync {
    /// Load the persisted reminder set. An absent store yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing data exists but cannot be read or
    /// parsed.
    fn load(&self) -> Result<Vec<Reminder>>;

    /// Replace the persisted reminder set.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be written.
    fn save(&self, reminders: &[Reminder]) -> Result<()>;
}

/// Persisted reminder state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    /// Schema version.
    #[serde(default = "default_state_version")]
    version: u8,
    /// The reminder set, in insertion order.
    #[serde(default)]
    reminders: Vec<Reminder>,
}

fn default_state_version() -> u8 {
    1
}

/// File-backed reminder store (pretty-printed JSON).
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default path for the reminder state file.
    #[must_use]
    pub fn default_state_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("LOCALAPPDATA")
                .map(|d| PathBuf::from(d).join("lark").join("reminders.json"))
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("HOME").map(|h| {
                PathBuf::from(h)
                    .join(".config")
                    .join("lark")
                    .join("reminders.json")
            })
        }
    }
}

impl ReminderStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Reminder>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(VoiceError::Scheduler(format!("cannot read state: {e}")));
            }
        };

        let state: PersistedState = serde_json::from_slice(&bytes)
            .map_err(|e| VoiceError::Scheduler(format!("cannot parse state: {e}")))?;
        debug!(
            "loaded {} reminders from {}",
            state.reminders.len(),
            self.path.display()
        );
        Ok(state.reminders)
    }

    fn save(&self, reminders: &[Reminder]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VoiceError::Scheduler(format!("cannot create state dir: {e}")))?;
        }

        let state = PersistedState {
            version: default_state_version(),
            reminders: reminders.to_vec(),
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| VoiceError::Scheduler(format!("cannot serialize state: {e}")))?;
        std::fs::write(&self.path, json)
            .map_err(|e| VoiceError::Scheduler(format!("cannot write state: {e}")))?;
        Ok(())
    }
}

/// In-memory reminder store for tests.
#[derive(Default)]
pub struct MemoryReminderStore {
    reminders: Mutex<Vec<Reminder>>,
}

impl MemoryReminderStore {
    /// Create a store pre-seeded with `reminders`.
    #[must_use]
    pub fn seeded(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: Mutex::new(reminders),
        }
    }

    /// Snapshot of the currently persisted set.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Reminder> {
        self.reminders
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl ReminderStore for MemoryReminderStore {
    fn load(&self) -> Result<Vec<Reminder>> {
        Ok(self.snapshot())
    }

    fn save(&self, reminders: &[Reminder]) -> Result<()> {
        *self.reminders.lock().unwrap_or_else(|p| p.into_inner()) = reminders.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::reminder::DeliveryMode;
    use chrono::TimeZone;

    fn sample_reminder() -> Reminder {
        Reminder {
            id: uuid::Uuid::new_v4(),
            task_id: "task-1".to_owned(),
            due_at: chrono::Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
            delivery: DeliveryMode::Both,
            active: true,
        }
    }

    #[test]
    fn missing_file_loads_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("reminders.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("reminders.json"));

        let reminder = sample_reminder();
        store.save(std::slice::from_ref(&reminder)).unwrap();

        let restored = store.load().unwrap();
        assert_eq!(restored, vec![reminder]);
    }

    #[test]
    fn due_at_is_persisted_as_iso_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.json");
        let store = JsonFileStore::new(path.clone());

        store.save(&[sample_reminder()]).unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        assert!(raw.contains("2024-06-03T09:00:00Z"), "raw was: {raw}");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFileStore::new(path);
        assert!(store.load().is_err());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryReminderStore::default();
        let reminder = sample_reminder();
        store.save(std::slice::from_ref(&reminder)).unwrap();
        assert_eq!(store.load().unwrap(), vec![reminder]);
    }
}
