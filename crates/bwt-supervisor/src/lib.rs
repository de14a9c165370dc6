//! Lifecycle supervision for the bwt daemon.
//!
//! The native daemon does the real work: node sync, wallet scanning, and the
//! Electrum and HTTP servers. This crate wraps one run of it. A
//! [`DaemonController`] encodes the [`bwt_config::DaemonConfig`], starts the
//! daemon through the [`ExternalDaemon`] seam, and relays its lifecycle
//! events to a caller-supplied [`ProgressObserver`].
//!
//! ## Shutdown semantics
//!
//! [`DaemonController::shutdown`] may be called at any time and any number of
//! times. The daemon's teardown entry point is invoked exactly once per
//! handle:
//!
//! - if the daemon is already booting, its handle is torn down immediately;
//! - otherwise teardown is deferred until the booting event arrives, and
//!   that event is swallowed instead of reaching the observer.
//!
//! Once shutdown is requested, progress and readiness notifications are
//! dropped at dispatch time. Progress notifications also stop once the daemon
//! is ready.
//!
//! [`EmbeddedDaemon`] provides an in-process [`ExternalDaemon`] that hosts a
//! [`DaemonRuntime`] on a background thread.

mod controller;
mod embedded;
mod external;
mod handle;
mod observer;
pub mod telemetry;

pub use controller::{DaemonController, LifecyclePhase, StartError, TestRpcError};
pub use embedded::{DaemonRuntime, EmbeddedDaemon, RunContext, RuntimeError};
pub use external::{ExternalDaemon, ExternalDaemonError, NotificationSink};
pub use handle::ShutdownHandle;
pub use observer::{NoopProgressObserver, ProgressObserver, StructuredProgressObserver};
pub use telemetry::{TelemetryError, run_span};

#[cfg(test)]
mod tests;
