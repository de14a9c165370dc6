//! Boundary with the native daemon the controller supervises.

use std::sync::Arc;

use bwt_daemon_types::DaemonEvent;
use thiserror::Error;

use crate::controller::Shared;
use crate::handle::ShutdownHandle;

/// Entry points exposed by a daemon implementation.
pub trait ExternalDaemon: Send + Sync {
    /// Begins an asynchronous run with the encoded configuration.
    ///
    /// Implementations deliver lifecycle events to `sink` from their own
    /// thread. A run must report [`DaemonEvent::Booting`] before
    /// [`DaemonEvent::Ready`] and must stop reporting once torn down.
    fn start(
        &self,
        config_json: String,
        sink: NotificationSink,
    ) -> Result<(), ExternalDaemonError>;

    /// Requests teardown of the run identified by `handle`. Fire-and-forget.
    fn shutdown(&self, handle: ShutdownHandle);

    /// Checks that the node RPC described by the configuration is reachable.
    ///
    /// Must not start a run. Implementations that cannot check connectivity
    /// return an error rather than reporting success.
    fn test_rpc(&self, config_json: &str) -> Result<(), ExternalDaemonError>;
}

impl<T> ExternalDaemon for Arc<T>
where
    T: ExternalDaemon + ?Sized,
{
    fn start(
        &self,
        config_json: String,
        sink: NotificationSink,
    ) -> Result<(), ExternalDaemonError> {
        (**self).start(config_json, sink)
    }

    fn shutdown(&self, handle: ShutdownHandle) {
        (**self).shutdown(handle);
    }

    fn test_rpc(&self, config_json: &str) -> Result<(), ExternalDaemonError> {
        (**self).test_rpc(config_json)
    }
}

/// Receiver for the lifecycle events of one daemon run.
///
/// Cloning is cheap; every clone feeds the same controller.
#[derive(Clone)]
pub struct NotificationSink {
    shared: Arc<Shared>,
}

impl NotificationSink {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Routes an event through the controller's filtering policy.
    pub fn deliver(&self, event: DaemonEvent) {
        self.shared.handle_event(event);
    }
}

/// Error reported by a daemon implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExternalDaemonError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExternalDaemonError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}
