//! Observer double that records forwarded notifications for assertions.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use time::OffsetDateTime;

use crate::observer::ProgressObserver;

/// Notification as seen by the observer.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    /// `on_booting` fired.
    Booting,
    /// `on_sync_progress` fired.
    SyncProgress { progress: f32, tip: i64 },
    /// `on_scan_progress` fired.
    ScanProgress { progress: f32, eta_secs: u64 },
    /// `on_ready` fired.
    Ready,
}

impl ObservedEvent {
    /// Label matching the daemon event kinds.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Booting => "booting",
            Self::SyncProgress { .. } => "sync_progress",
            Self::ScanProgress { .. } => "scan_progress",
            Self::Ready => "ready",
        }
    }
}

/// Records notifications and lets tests wait for asynchronous delivery.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
    changed: Condvar,
}

impl RecordingObserver {
    /// Snapshot of the recorded notifications.
    #[must_use]
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .clone()
    }

    /// Kinds of the recorded notifications, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(ObservedEvent::kind).collect()
    }

    /// Waits until a notification of `kind` is recorded.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub fn wait_for(&self, kind: &str, timeout: Duration) -> bool {
        let events = self.events.lock().expect("observer mutex poisoned");
        let (_events, result) = self
            .changed
            .wait_timeout_while(events, timeout, |events| {
                !events.iter().any(|event| event.kind() == kind)
            })
            .expect("observer mutex poisoned");
        !result.timed_out()
    }

    fn record(&self, event: ObservedEvent) {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .push(event);
        self.changed.notify_all();
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_booting(&self) {
        self.record(ObservedEvent::Booting);
    }

    fn on_sync_progress(&self, progress: f32, tip: OffsetDateTime) {
        self.record(ObservedEvent::SyncProgress {
            progress,
            tip: tip.unix_timestamp(),
        });
    }

    fn on_scan_progress(&self, progress: f32, eta: Duration) {
        self.record(ObservedEvent::ScanProgress {
            progress,
            eta_secs: eta.as_secs(),
        });
    }

    fn on_ready(&self) {
        self.record(ObservedEvent::Ready);
    }
}
