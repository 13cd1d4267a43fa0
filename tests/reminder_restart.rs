//! Reminder durability across engine restarts, over the file-backed store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::TimeZone;
use lark::clock::ManualClock;
use lark::config::EngineConfig;
use lark::engine::VoiceEngine;
use lark::reminder::{DeliveryMode, JsonFileStore, Reminder};
use lark::testing::{FakeNotifier, FakeRecognizer, FakeSynthesizer};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn engine_at(
    path: &Path,
    clock: Arc<ManualClock>,
) -> (Arc<VoiceEngine>, Arc<Mutex<Vec<Reminder>>>) {
    let engine = VoiceEngine::new(
        EngineConfig::default(),
        Arc::new(FakeRecognizer::default()),
        Arc::new(FakeSynthesizer::default()),
        Arc::new(FakeNotifier::default()),
        clock,
        Arc::new(JsonFileStore::new(path.to_path_buf())),
    );

    let due = Arc::new(Mutex::new(Vec::new()));
    let d = Arc::clone(&due);
    engine.on_reminder_due(Box::new(move |reminder| {
        d.lock().unwrap().push(reminder);
    }));
    (engine, due)
}

#[test]
fn pending_reminder_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reminders.json");
    let start = chrono::Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();

    // First run: schedule a reminder half an hour out, then "shut down"
    // before it fires.
    let reminder_id = {
        let clock = Arc::new(ManualClock::new(start));
        let (engine, due) = engine_at(&path, Arc::clone(&clock));
        engine.start().unwrap();

        let reminder = engine
            .add_reminder(
                "task-1",
                start + chrono::Duration::minutes(30),
                DeliveryMode::Notification,
            )
            .unwrap();
        clock.advance(Duration::from_secs(5 * 60));
        assert!(due.lock().unwrap().is_empty());
        engine.stop();
        reminder.id
    };

    // Second run, 40 minutes later: the reminder is past due and fires
    // immediately on restore, exactly once.
    let clock = Arc::new(ManualClock::new(start + chrono::Duration::minutes(40)));
    let (engine, due) = engine_at(&path, Arc::clone(&clock));
    let restored = engine.start().unwrap();
    assert_eq!(restored, 1);

    {
        let due = due.lock().unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, reminder_id);
        assert!(!due[0].active);
    }

    clock.advance(Duration::from_secs(3600));
    assert_eq!(due.lock().unwrap().len(), 1);

    // A third run finds only inactive history and reschedules nothing.
    let clock = Arc::new(ManualClock::new(start + chrono::Duration::hours(2)));
    let (engine, due) = engine_at(&path, Arc::clone(&clock));
    assert_eq!(engine.start().unwrap(), 0);
    assert!(due.lock().unwrap().is_empty());
    assert_eq!(engine.reminders().len(), 1);
    assert!(!engine.reminders()[0].active);
}

#[test]
fn removed_reminder_is_absent_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reminders.json");
    let start = chrono::Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();

    {
        let clock = Arc::new(ManualClock::new(start));
        let (engine, _due) = engine_at(&path, clock);
        engine.start().unwrap();
        let reminder = engine
            .add_reminder(
                "task-2",
                start + chrono::Duration::minutes(10),
                DeliveryMode::Voice,
            )
            .unwrap();
        assert!(engine.remove_reminder(reminder.id).unwrap());
    }

    let clock = Arc::new(ManualClock::new(start + chrono::Duration::hours(1)));
    let (engine, due) = engine_at(&path, clock);
    assert_eq!(engine.start().unwrap(), 0);
    assert!(due.lock().unwrap().is_empty());
    assert!(engine.reminders().is_empty());
}
