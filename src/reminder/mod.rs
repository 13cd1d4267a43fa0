//! Reminder scheduler.
//!
//! Owns the reminder records, persists every mutation wholesale, and
//! fires a trigger callback exactly once per reminder at or after its due
//! time. On startup [`ReminderScheduler::restore`] reconstitutes a timer
//! for every persisted reminder that is still active; past-due reminders
//! fire immediately. Triggered reminders are kept in the persisted set,
//! inactive, purely as history.

pub mod store;
pub mod suggest;

pub use store::{JsonFileStore, MemoryReminderStore, ReminderStore};
pub use suggest::suggest_reminder_times;

use crate::clock::{Clock, TimerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a reminder is delivered when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Desktop notification only.
    Notification,
    /// Spoken announcement only.
    Voice,
    /// Both notification and spoken announcement.
    Both,
}

/// A persisted, time-triggered request to notify the user about a task.
///
/// References its task by id only; the scheduler does not own task data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique reminder id.
    pub id: Uuid,
    /// Id of the task this reminder is about (weak reference).
    pub task_id: String,
    /// When the reminder is due.
    pub due_at: DateTime<Utc>,
    /// Delivery mode.
    pub delivery: DeliveryMode,
    /// Whether the reminder is still pending. An active reminder has
    /// exactly one outstanding timer; a triggered reminder is history.
    pub active: bool,
}

/// Partial update applied by [`ReminderScheduler::update_reminder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReminderUpdate {
    /// New due time.
    pub due_at: Option<DateTime<Utc>>,
    /// New delivery mode.
    pub delivery: Option<DeliveryMode>,
    /// New active flag.
    pub active: Option<bool>,
}

/// Handler invoked when a reminder fires. The associated task is looked
/// up externally by `task_id`.
pub type TriggerHandler = Box<dyn FnMut(Reminder) + Send>;

struct SchedulerInner {
    reminders: Vec<Reminder>,
    timers: HashMap<Uuid, TimerId>,
    on_trigger: Option<TriggerHandler>,
}

/// Schedules, persists, and fires reminders.
pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    inner: Mutex<SchedulerInner>,
}

impl ReminderScheduler {
    /// Create a scheduler over a store and clock. Call
    /// [`ReminderScheduler::restore`] to reconstitute persisted reminders.
    pub fn new(store: Arc<dyn ReminderStore>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            store,
            clock,
            inner: Mutex::new(SchedulerInner {
                reminders: Vec::new(),
                timers: HashMap::new(),
                on_trigger: None,
            }),
        })
    }

    /// Register the trigger handler (single-subscriber).
    pub fn set_on_trigger(&self, handler: TriggerHandler) {
        self.lock().on_trigger = Some(handler);
    }

    /// Load persisted reminders and reschedule every active one.
    ///
    /// Past-due reminders fire immediately, exactly once. Returns the
    /// number of reminders rescheduled.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn restore(self: &Arc<Self>) -> crate::error::Result<usize> {
        let loaded = self.store.load()?;
        let active: Vec<Reminder> = {
            let mut inner = self.lock();
            inner.reminders = loaded;
            inner.reminders.iter().filter(|r| r.active).cloned().collect()
        };

        let count = active.len();
        info!(
            "restored {} reminders ({} active)",
            self.lock().reminders.len(),
            count
        );
        for reminder in active {
            self.schedule_timer(&reminder);
        }
        Ok(count)
    }

    /// Create and schedule a new reminder.
    ///
    /// A due time at or before now fires the trigger synchronously.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated set cannot be persisted.
    pub fn add_reminder(
        self: &Arc<Self>,
        task_id: &str,
        due_at: DateTime<Utc>,
        delivery: DeliveryMode,
    ) -> crate::error::Result<Reminder> {
        let reminder = Reminder {
            id: Uuid::new_v4(),
            task_id: task_id.to_owned(),
            due_at,
            delivery,
            active: true,
        };

        {
            let mut inner = self.lock();
            inner.reminders.push(reminder.clone());
            self.store.save(&inner.reminders)?;
        }
        debug!("added reminder {} due {}", reminder.id, reminder.due_at);
        self.schedule_timer(&reminder);
        Ok(reminder)
    }

    /// Cancel and delete a reminder. Returns `false` when the id is
    /// unknown, including a reminder already removed after triggering.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated set cannot be persisted.
    pub fn remove_reminder(self: &Arc<Self>, id: Uuid) -> crate::error::Result<bool> {
        let removed_timer = {
            let mut inner = self.lock();
            let before = inner.reminders.len();
            inner.reminders.retain(|r| r.id != id);
            if inner.reminders.len() == before {
                return Ok(false);
            }
            self.store.save(&inner.reminders)?;
            inner.timers.remove(&id)
        };
        if let Some(timer) = removed_timer {
            self.clock.cancel(timer);
        }
        debug!("removed reminder {id}");
        Ok(true)
    }

    /// Apply a partial update; cancels and reschedules the timer while
    /// the reminder remains active. Returns `false` when the id is
    /// unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated set cannot be persisted.
    pub fn update_reminder(
        self: &Arc<Self>,
        id: Uuid,
        update: ReminderUpdate,
    ) -> crate::error::Result<bool> {
        let (updated, cancelled_timer) = {
            let mut inner = self.lock();
            let Some(reminder) = inner.reminders.iter_mut().find(|r| r.id == id) else {
                return Ok(false);
            };
            if let Some(due_at) = update.due_at {
                reminder.due_at = due_at;
            }
            if let Some(delivery) = update.delivery {
                reminder.delivery = delivery;
            }
            if let Some(active) = update.active {
                reminder.active = active;
            }
            let updated = reminder.clone();
            self.store.save(&inner.reminders)?;
            (updated, inner.timers.remove(&id))
        };

        if let Some(timer) = cancelled_timer {
            self.clock.cancel(timer);
        }
        if updated.active {
            self.schedule_timer(&updated);
        }
        Ok(true)
    }

    /// Snapshot of all reminders, active and historical.
    #[must_use]
    pub fn reminders(&self) -> Vec<Reminder> {
        self.lock().reminders.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SchedulerInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Schedule the timer for an active reminder; fire synchronously if
    /// the due time has already passed.
    fn schedule_timer(self: &Arc<Self>, reminder: &Reminder) {
        let delay = reminder.due_at - self.clock.now();
        let Ok(delay) = delay.to_std() else {
            // Already due (negative delay): treated identically to a
            // timer firing at time zero.
            debug!("reminder {} past due, firing now", reminder.id);
            self.trigger(reminder.id);
            return;
        };

        if delay.is_zero() {
            self.trigger(reminder.id);
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let id = reminder.id;
        let timer = self.clock.schedule(
            delay,
            Box::new(move || {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.trigger(id);
                }
            }),
        );
        self.lock().timers.insert(id, timer);
    }

    /// Fire a reminder: mark it inactive, persist, invoke the handler.
    /// Exactly one trigger per reminder; once inactive, nothing fires.
    fn trigger(self: &Arc<Self>, id: Uuid) {
        let fired = {
            let mut inner = self.lock();
            inner.timers.remove(&id);
            let Some(reminder) = inner.reminders.iter_mut().find(|r| r.id == id) else {
                warn!("trigger for unknown reminder {id}");
                return;
            };
            if !reminder.active {
                debug!("reminder {id} already triggered, ignoring");
                return;
            }
            reminder.active = false;
            let fired = reminder.clone();
            if let Err(e) = self.store.save(&inner.reminders) {
                error!("cannot persist reminder state: {e}");
            }
            fired
        };

        info!("reminder {} fired for task {}", fired.id, fired.task_id);
        let handler = self.lock().on_trigger.take();
        if let Some(mut handler) = handler {
            handler(fired);
            let mut inner = self.lock();
            if inner.on_trigger.is_none() {
                inner.on_trigger = Some(handler);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    struct Harness {
        scheduler: Arc<ReminderScheduler>,
        store: Arc<MemoryReminderStore>,
        clock: Arc<ManualClock>,
        fired: Arc<Mutex<Vec<Reminder>>>,
    }

    fn harness_with(store: MemoryReminderStore) -> Harness {
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::new(start_time()));
        let scheduler =
            ReminderScheduler::new(Arc::clone(&store) as _, Arc::clone(&clock) as _);

        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = Arc::clone(&fired);
        scheduler.set_on_trigger(Box::new(move |reminder| {
            f.lock().unwrap().push(reminder);
        }));

        Harness {
            scheduler,
            store,
            clock,
            fired,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryReminderStore::default())
    }

    #[test]
    fn reminder_fires_at_due_time_and_goes_inactive() {
        let h = harness();
        let due = start_time() + chrono::Duration::minutes(10);
        let reminder = h
            .scheduler
            .add_reminder("task-1", due, DeliveryMode::Both)
            .unwrap();

        h.clock.advance(std::time::Duration::from_secs(9 * 60));
        assert!(h.fired.lock().unwrap().is_empty());

        h.clock.advance(std::time::Duration::from_secs(60));
        let fired = h.fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, reminder.id);
        assert!(!fired[0].active);

        // The record remains, inactive, as history.
        let persisted = h.store.snapshot();
        assert_eq!(persisted.len(), 1);
        assert!(!persisted[0].active);
    }

    #[test]
    fn past_due_reminder_fires_synchronously() {
        let h = harness();
        let due = start_time() - chrono::Duration::minutes(5);
        h.scheduler
            .add_reminder("task-1", due, DeliveryMode::Voice)
            .unwrap();
        assert_eq!(h.fired.lock().unwrap().len(), 1);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[test]
    fn removed_reminder_never_fires_and_leaves_no_record() {
        let h = harness();
        let due = start_time() + chrono::Duration::minutes(10);
        let reminder = h
            .scheduler
            .add_reminder("task-1", due, DeliveryMode::Notification)
            .unwrap();

        assert!(h.scheduler.remove_reminder(reminder.id).unwrap());
        h.clock.advance(std::time::Duration::from_secs(20 * 60));

        assert!(h.fired.lock().unwrap().is_empty());
        assert!(h.store.snapshot().is_empty());
    }

    #[test]
    fn remove_after_trigger_is_a_no_op() {
        let h = harness();
        let reminder = h
            .scheduler
            .add_reminder("task-1", start_time(), DeliveryMode::Voice)
            .unwrap();
        assert_eq!(h.fired.lock().unwrap().len(), 1);

        // The record still exists (as history), so removal succeeds once
        // and is then unknown.
        assert!(h.scheduler.remove_reminder(reminder.id).unwrap());
        assert!(!h.scheduler.remove_reminder(reminder.id).unwrap());
    }

    #[test]
    fn restore_reschedules_active_and_fires_past_due_exactly_once() {
        let past_due = Reminder {
            id: Uuid::new_v4(),
            task_id: "task-past".to_owned(),
            due_at: start_time() - chrono::Duration::minutes(5),
            delivery: DeliveryMode::Both,
            active: true,
        };
        let upcoming = Reminder {
            id: Uuid::new_v4(),
            task_id: "task-future".to_owned(),
            due_at: start_time() + chrono::Duration::hours(1),
            delivery: DeliveryMode::Voice,
            active: true,
        };
        let history = Reminder {
            id: Uuid::new_v4(),
            task_id: "task-done".to_owned(),
            due_at: start_time() - chrono::Duration::days(1),
            delivery: DeliveryMode::Voice,
            active: false,
        };

        let h = harness_with(MemoryReminderStore::seeded(vec![
            past_due.clone(),
            upcoming.clone(),
            history,
        ]));
        let count = h.scheduler.restore().unwrap();
        assert_eq!(count, 2);

        // The past-due reminder fired immediately, exactly once.
        {
            let fired = h.fired.lock().unwrap();
            assert_eq!(fired.len(), 1);
            assert_eq!(fired[0].id, past_due.id);
        }

        // The inactive one was never rescheduled; the upcoming one fires
        // at its due time.
        h.clock.advance(std::time::Duration::from_secs(3600));
        let fired = h.fired.lock().unwrap();
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[1].id, upcoming.id);
    }

    #[test]
    fn update_reschedules_active_reminder() {
        let h = harness();
        let reminder = h
            .scheduler
            .add_reminder(
                "task-1",
                start_time() + chrono::Duration::minutes(10),
                DeliveryMode::Voice,
            )
            .unwrap();

        let update = ReminderUpdate {
            due_at: Some(start_time() + chrono::Duration::minutes(30)),
            ..ReminderUpdate::default()
        };
        assert!(h.scheduler.update_reminder(reminder.id, update).unwrap());

        h.clock.advance(std::time::Duration::from_secs(10 * 60));
        assert!(h.fired.lock().unwrap().is_empty());
        h.clock.advance(std::time::Duration::from_secs(20 * 60));
        assert_eq!(h.fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn deactivating_update_cancels_the_timer() {
        let h = harness();
        let reminder = h
            .scheduler
            .add_reminder(
                "task-1",
                start_time() + chrono::Duration::minutes(10),
                DeliveryMode::Voice,
            )
            .unwrap();

        let update = ReminderUpdate {
            active: Some(false),
            ..ReminderUpdate::default()
        };
        assert!(h.scheduler.update_reminder(reminder.id, update).unwrap());
        assert_eq!(h.clock.pending_timers(), 0);

        h.clock.advance(std::time::Duration::from_secs(3600));
        assert!(h.fired.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let h = harness();
        assert!(!h.scheduler.remove_reminder(Uuid::new_v4()).unwrap());
        assert!(
            !h.scheduler
                .update_reminder(Uuid::new_v4(), ReminderUpdate::default())
                .unwrap()
        );
    }

    #[test]
    fn trigger_handler_reentrancy_can_add_reminders() {
        let store = Arc::new(MemoryReminderStore::default());
        let clock = Arc::new(ManualClock::new(start_time()));
        let scheduler =
            ReminderScheduler::new(Arc::clone(&store) as _, Arc::clone(&clock) as _);

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sched = Arc::downgrade(&scheduler);
        scheduler.set_on_trigger(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            // A handler that consults the scheduler must not deadlock.
            if let Some(scheduler) = sched.upgrade() {
                let _ = scheduler.reminders();
            }
        }));

        scheduler
            .add_reminder("task-1", start_time(), DeliveryMode::Voice)
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
