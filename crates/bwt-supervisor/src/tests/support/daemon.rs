//! Test daemon: records start and teardown calls and lets steps replay
//! lifecycle events into the sink it was handed.

use std::sync::Mutex;

use bwt_daemon_types::{DaemonEvent, RawHandle};

use crate::external::{ExternalDaemon, ExternalDaemonError, NotificationSink};
use crate::handle::ShutdownHandle;

/// Daemon double that never runs anything on its own.
#[derive(Default)]
pub struct RecordingDaemon {
    state: Mutex<DaemonCalls>,
}

#[derive(Default)]
struct DaemonCalls {
    starts: Vec<String>,
    teardowns: Vec<RawHandle>,
    sink: Option<NotificationSink>,
    start_failure: Option<String>,
    rpc_failure: Option<String>,
    rpc_checks: usize,
}

impl RecordingDaemon {
    /// Makes subsequent `start` calls fail with `message`.
    pub fn fail_start_with(&self, message: impl Into<String>) {
        let mut state = self.state.lock().expect("daemon state mutex poisoned");
        state.start_failure = Some(message.into());
    }

    /// Makes subsequent `test_rpc` calls fail with `message`.
    pub fn fail_rpc_with(&self, message: impl Into<String>) {
        let mut state = self.state.lock().expect("daemon state mutex poisoned");
        state.rpc_failure = Some(message.into());
    }

    /// Number of `test_rpc` calls received.
    #[must_use]
    pub fn rpc_checks(&self) -> usize {
        let state = self.state.lock().expect("daemon state mutex poisoned");
        state.rpc_checks
    }

    /// Encoded configurations passed to `start`, in call order.
    #[must_use]
    pub fn start_calls(&self) -> Vec<String> {
        let state = self.state.lock().expect("daemon state mutex poisoned");
        state.starts.clone()
    }

    /// Raw handles passed to `shutdown`, in call order.
    #[must_use]
    pub fn teardowns(&self) -> Vec<RawHandle> {
        let state = self.state.lock().expect("daemon state mutex poisoned");
        state.teardowns.clone()
    }

    /// Delivers `event` as if the daemon emitted it.
    ///
    /// # Panics
    ///
    /// Panics when the daemon was never started.
    pub fn emit(&self, event: DaemonEvent) {
        // Clone outside the delivery: the controller may call back into
        // `shutdown`, which takes the same lock.
        let sink = {
            let state = self.state.lock().expect("daemon state mutex poisoned");
            state.sink.clone()
        };
        sink.expect("daemon was not started").deliver(event);
    }
}

impl ExternalDaemon for RecordingDaemon {
    fn start(
        &self,
        config_json: String,
        sink: NotificationSink,
    ) -> Result<(), ExternalDaemonError> {
        let mut state = self.state.lock().expect("daemon state mutex poisoned");
        state.starts.push(config_json);
        if let Some(message) = state.start_failure.clone() {
            return Err(ExternalDaemonError::new(message));
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn shutdown(&self, handle: ShutdownHandle) {
        let mut state = self.state.lock().expect("daemon state mutex poisoned");
        state.teardowns.push(handle.into_raw());
    }

    fn test_rpc(&self, _config_json: &str) -> Result<(), ExternalDaemonError> {
        let mut state = self.state.lock().expect("daemon state mutex poisoned");
        state.rpc_checks += 1;
        match state.rpc_failure.clone() {
            Some(message) => Err(ExternalDaemonError::new(message)),
            None => Ok(()),
        }
    }
}
