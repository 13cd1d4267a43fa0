//! Clock and timer service.
//!
//! All delayed work in the engine (recognizer retries, wake-listening
//! resumption, reminder firing) goes through the [`Clock`] trait so tests
//! can simulate time advancement with [`ManualClock`] and assert exact
//! fire counts without real delays. Production uses [`TokioClock`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Handle for a scheduled timer, used for cancellation.
pub type TimerId = u64;

/// Callback invoked when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Clock and cancellable delayed-callback service.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Schedule `callback` to run after `delay`.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Cancel a pending timer. A no-op if the timer already fired.
    fn cancel(&self, id: TimerId);
}

/// Production clock backed by the tokio runtime.
///
/// Each timer is a spawned task; cancellation aborts the task. Must be
/// used from within a tokio runtime context.
#[derive(Default)]
pub struct TokioClock {
    next_id: AtomicU64,
    handles: Arc<Mutex<HashMap<TimerId, tokio::task::JoinHandle<()>>>>,
}

impl TokioClock {
    /// Create a new tokio-backed clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handles = Arc::clone(&self.handles);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut map) = handles.lock() {
                map.remove(&id);
            }
            callback();
        });
        self.handles
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, handle);
        id
    }

    fn cancel(&self, id: TimerId) {
        let handle = self
            .handles
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&id);
        if let Some(handle) = handle {
            handle.abort();
            debug!("cancelled timer {id}");
        }
    }
}

struct PendingTimer {
    id: TimerId,
    fire_at: DateTime<Utc>,
    callback: TimerCallback,
}

struct ManualClockInner {
    now: DateTime<Utc>,
    next_id: TimerId,
    pending: Vec<PendingTimer>,
}

/// Deterministic clock for tests: time only moves when [`ManualClock::advance`]
/// is called, and due timers fire synchronously inside `advance`, in
/// fire-time order.
pub struct ManualClock {
    inner: Mutex<ManualClockInner>,
}

impl ManualClock {
    /// Create a manual clock starting at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(ManualClockInner {
                now: start,
                next_id: 0,
                pending: Vec::new(),
            }),
        }
    }

    /// Advance time by `delta`, firing every timer that becomes due.
    ///
    /// Callbacks run outside the internal lock, so a firing timer may
    /// schedule or cancel other timers. Timers scheduled by a callback fire
    /// within the same `advance` call if their own fire time is reached.
    pub fn advance(&self, delta: Duration) {
        let target = {
            let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            inner.now
                + chrono::Duration::from_std(delta).unwrap_or_else(|_| chrono::Duration::zero())
        };

        loop {
            let next = {
                let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
                let due_idx = inner
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.fire_at <= target)
                    .min_by_key(|(_, t)| (t.fire_at, t.id))
                    .map(|(i, _)| i);
                match due_idx {
                    Some(i) => {
                        let timer = inner.pending.swap_remove(i);
                        // Time observed by the callback matches the fire time.
                        if timer.fire_at > inner.now {
                            inner.now = timer.fire_at;
                        }
                        Some(timer)
                    }
                    None => {
                        inner.now = target;
                        None
                    }
                }
            };

            match next {
                Some(timer) => (timer.callback)(),
                None => break,
            }
        }
    }

    /// Number of timers currently scheduled.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pending
            .len()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).now
    }

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        let fire_at = inner.now
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        inner.pending.push(PendingTimer {
            id,
            fire_at,
            callback,
        });
        id
    }

    fn cancel(&self, id: TimerId) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.pending.retain(|t| t.id != id);
    }
}
