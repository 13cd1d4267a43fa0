//! In-memory capability fakes for deterministic tests.
//!
//! Used by the crate's own unit and integration tests, and available to
//! downstream applications that want to exercise engine wiring without a
//! real recognizer or synthesizer. Time is faked separately with
//! [`crate::clock::ManualClock`].

use crate::capability::{Notifier, Recognizer, RecognizerSettings, Synthesizer};
use crate::error::{Result, VoiceError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Recognition capability fake that records start/stop requests.
pub struct FakeRecognizer {
    secure: bool,
    fail_start: AtomicBool,
    running: AtomicBool,
    starts: Mutex<Vec<RecognizerSettings>>,
    stops: AtomicUsize,
}

impl Default for FakeRecognizer {
    fn default() -> Self {
        Self {
            secure: true,
            fail_start: AtomicBool::new(false),
            running: AtomicBool::new(false),
            starts: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        }
    }
}

impl FakeRecognizer {
    /// A recognizer reporting an insecure execution context.
    #[must_use]
    pub fn insecure() -> Self {
        Self {
            secure: false,
            ..Self::default()
        }
    }

    /// Make subsequent `start` calls fail (capability unavailable).
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Number of accepted start requests.
    #[must_use]
    pub fn start_count(&self) -> usize {
        self.starts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    /// Number of stop requests.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Whether a session is nominally running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Settings passed to the most recent start request.
    #[must_use]
    pub fn last_settings(&self) -> Option<RecognizerSettings> {
        self.starts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .last()
            .cloned()
    }
}

impl Recognizer for FakeRecognizer {
    fn start(&self, settings: &RecognizerSettings) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(VoiceError::Recognition("capability unavailable".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        self.starts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(settings.clone());
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn secure_context(&self) -> bool {
        self.secure
    }
}

/// Synthesis capability fake that records spoken texts and cancels.
#[derive(Default)]
pub struct FakeSynthesizer {
    utterances: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl FakeSynthesizer {
    /// All texts passed to `speak`, in order.
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.utterances
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// The most recently spoken text.
    #[must_use]
    pub fn last_spoken(&self) -> Option<String> {
        self.utterances
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .last()
            .cloned()
    }

    /// Number of cancel requests.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl Synthesizer for FakeSynthesizer {
    fn speak(&self, text: &str, _rate: f32, _pitch: f32, _volume: f32) {
        self.utterances
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(text.to_owned());
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Notification capability fake that records shown notifications.
#[derive(Default)]
pub struct FakeNotifier {
    shown: Mutex<Vec<(String, String)>>,
}

impl FakeNotifier {
    /// All `(title, body)` pairs shown, in order.
    #[must_use]
    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl Notifier for FakeNotifier {
    fn show(&self, title: &str, body: &str) {
        self.shown
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((title.to_owned(), body.to_owned()));
    }
}
