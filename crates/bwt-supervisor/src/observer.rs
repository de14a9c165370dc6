//! Caller-facing notifications for daemon start-up.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

/// Hooks invoked as the supervised daemon starts.
///
/// Every method defaults to a no-op, so implementors override only what they
/// need. Hooks run synchronously on whichever thread the daemon used to
/// deliver the underlying event, never on the caller's thread.
pub trait ProgressObserver: Send + Sync {
    /// The daemon accepted its configuration and can now be shut down.
    fn on_booting(&self) {}

    /// Bitcoin Core block download progress.
    ///
    /// `progress` is within `[0, 1]`; `tip` is the time of the node's chain tip.
    fn on_sync_progress(&self, _progress: f32, _tip: OffsetDateTime) {}

    /// Wallet rescan progress, with an estimate of the time remaining.
    fn on_scan_progress(&self, _progress: f32, _eta: Duration) {}

    /// Start-up completed and the daemon's servers are running.
    fn on_ready(&self) {}
}

impl<T> ProgressObserver for Arc<T>
where
    T: ProgressObserver + ?Sized,
{
    fn on_booting(&self) {
        (**self).on_booting();
    }

    fn on_sync_progress(&self, progress: f32, tip: OffsetDateTime) {
        (**self).on_sync_progress(progress, tip);
    }

    fn on_scan_progress(&self, progress: f32, eta: Duration) {
        (**self).on_scan_progress(progress, eta);
    }

    fn on_ready(&self) {
        (**self).on_ready();
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressObserver;

impl ProgressObserver for NoopProgressObserver {}

/// Observer that records notifications using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredProgressObserver;

impl StructuredProgressObserver {
    /// Builds a new observer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProgressObserver for StructuredProgressObserver {
    fn on_booting(&self) {
        tracing::info!(
            target: "bwt_supervisor::progress",
            event = "booting",
            "daemon booting"
        );
    }

    fn on_sync_progress(&self, progress: f32, tip: OffsetDateTime) {
        tracing::info!(
            target: "bwt_supervisor::progress",
            event = "sync_progress",
            progress,
            tip = %tip,
            "node sync progress"
        );
    }

    fn on_scan_progress(&self, progress: f32, eta: Duration) {
        tracing::info!(
            target: "bwt_supervisor::progress",
            event = "scan_progress",
            progress,
            eta_secs = eta.as_secs(),
            "wallet scan progress"
        );
    }

    fn on_ready(&self) {
        tracing::info!(
            target: "bwt_supervisor::progress",
            event = "ready",
            "daemon ready"
        );
    }
}
