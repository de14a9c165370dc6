//! In-process daemon runner.
//!
//! [`EmbeddedDaemon`] hosts a [`DaemonRuntime`] on a dedicated thread and
//! exposes it through [`ExternalDaemon`]. Each run is registered in a handle
//! table holding the sending half of a shutdown channel. Teardown removes the
//! entry, dropping the sender, which disconnects the channel the run watches.

use std::any::Any;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::iter;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use bwt_config::DaemonConfig;
use bwt_daemon_types::{DaemonEvent, RawHandle};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::external::{ExternalDaemon, ExternalDaemonError, NotificationSink};
use crate::handle::ShutdownHandle;
use crate::telemetry::run_span;

const EMBEDDED_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::embedded");

/// Work performed by one daemon run.
pub trait DaemonRuntime: Send + Sync + 'static {
    /// Runs the daemon until it finishes or `ctx` reports a shutdown request.
    ///
    /// The booting event has already been delivered when this is called.
    fn run(&self, config: DaemonConfig, ctx: &RunContext) -> Result<(), RuntimeError>;

    /// Checks node RPC connectivity without starting a run.
    ///
    /// Runtimes that do not override this report
    /// [`RuntimeError::Unsupported`].
    fn test_rpc(&self, _config: &DaemonConfig) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unsupported("node rpc check"))
    }
}

/// Errors returned by a [`DaemonRuntime`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The run stopped because shutdown was requested. Not a failure.
    #[error("daemon run was canceled")]
    Canceled,
    /// The runtime does not implement the requested operation.
    #[error("{0} is not supported by this runtime")]
    Unsupported(&'static str),
    /// The run failed.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RuntimeError {
    /// Builds a failure without an underlying source.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a failure wrapping an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Per-run view handed to a [`DaemonRuntime`].
///
/// Emitters become no-ops once shutdown has been requested.
pub struct RunContext {
    handle: RawHandle,
    sink: NotificationSink,
    shutdown_rx: Receiver<()>,
}

impl RunContext {
    /// Raw handle identifying this run.
    #[must_use]
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Reports block download progress; `tip` is in UNIX seconds.
    pub fn sync_progress(&self, progress: f32, tip: u32) {
        self.emit(DaemonEvent::SyncProgress { progress, tip });
    }

    /// Reports rescan progress; `eta` is in seconds.
    pub fn scan_progress(&self, progress: f32, eta: u32) {
        self.emit(DaemonEvent::ScanProgress { progress, eta });
    }

    /// Reports the Electrum server's bound address.
    pub fn electrum_ready(&self, addr: impl ToString) {
        self.emit(DaemonEvent::ElectrumReady {
            addr: addr.to_string(),
        });
    }

    /// Reports the HTTP API's bound address.
    pub fn http_ready(&self, addr: impl ToString) {
        self.emit(DaemonEvent::HttpReady {
            addr: addr.to_string(),
        });
    }

    /// Reports that start-up completed.
    pub fn ready(&self) {
        self.emit(DaemonEvent::Ready);
    }

    /// Whether this run has been torn down.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        matches!(self.shutdown_rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Returns [`RuntimeError::Canceled`] once this run has been torn down.
    ///
    /// Intended for `?` between start-up stages.
    pub fn ensure_running(&self) -> Result<(), RuntimeError> {
        if self.is_shutdown_requested() {
            Err(RuntimeError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Blocks until this run is torn down.
    pub fn wait_for_shutdown(&self) {
        while self.shutdown_rx.recv().is_ok() {}
    }

    /// Blocks for at most `timeout`; returns `true` if the run was torn down.
    #[must_use]
    pub fn wait_for_shutdown_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.shutdown_rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    fn emit(&self, event: DaemonEvent) {
        if self.is_shutdown_requested() {
            trace!(
                target: EMBEDDED_TARGET,
                handle = self.handle,
                event = event.kind(),
                "dropping event after teardown"
            );
            return;
        }
        self.sink.deliver(event);
    }
}

struct Registry<R> {
    runtime: R,
    next_handle: AtomicU64,
    runs: Mutex<HashMap<RawHandle, SyncSender<()>>>,
}

impl<R> Registry<R>
where
    R: DaemonRuntime,
{
    fn lock_runs(&self) -> MutexGuard<'_, HashMap<RawHandle, SyncSender<()>>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, config: DaemonConfig, ctx: &RunContext) {
        let _run = run_span(ctx.handle).entered();
        ctx.sink.deliver(DaemonEvent::Booting { handle: ctx.handle });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.runtime.run(config, ctx)));
        self.lock_runs().remove(&ctx.handle);

        match outcome {
            Ok(Ok(())) => {
                debug!(target: EMBEDDED_TARGET, handle = ctx.handle, "daemon run finished");
            }
            Ok(Err(RuntimeError::Canceled)) => {
                debug!(target: EMBEDDED_TARGET, handle = ctx.handle, "daemon run canceled");
            }
            Ok(Err(failure)) => {
                warn!(
                    target: EMBEDDED_TARGET,
                    handle = ctx.handle,
                    error = %error_chain(&failure),
                    "daemon run failed"
                );
            }
            Err(payload) => {
                error!(
                    target: EMBEDDED_TARGET,
                    handle = ctx.handle,
                    panic = panic_message(payload.as_ref()),
                    "daemon run panicked"
                );
            }
        }
    }
}

/// Renders `error` followed by each of its sources as `outer: inner: root`.
pub(crate) fn error_chain(error: &(dyn StdError + 'static)) -> String {
    iter::successors(Some(error), |&current| current.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// [`ExternalDaemon`] that runs a [`DaemonRuntime`] on background threads.
pub struct EmbeddedDaemon<R> {
    registry: Arc<Registry<R>>,
}

impl<R> EmbeddedDaemon<R>
where
    R: DaemonRuntime,
{
    /// Wraps `runtime`; each `start` spawns one run of it.
    #[must_use]
    pub fn new(runtime: R) -> Self {
        Self {
            registry: Arc::new(Registry {
                runtime,
                next_handle: AtomicU64::new(1),
                runs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of runs that have not finished or been torn down.
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.registry.lock_runs().len()
    }
}

impl<R> ExternalDaemon for EmbeddedDaemon<R>
where
    R: DaemonRuntime,
{
    fn start(
        &self,
        config_json: String,
        sink: NotificationSink,
    ) -> Result<(), ExternalDaemonError> {
        let config = DaemonConfig::from_json(&config_json)
            .map_err(|source| ExternalDaemonError::with_source("invalid config", source))?;

        let handle = self.registry.next_handle.fetch_add(1, Ordering::Relaxed);
        let (shutdown_tx, shutdown_rx) = mpsc::sync_channel(1);
        self.registry.lock_runs().insert(handle, shutdown_tx);

        let registry = Arc::clone(&self.registry);
        let ctx = RunContext {
            handle,
            sink,
            shutdown_rx,
        };
        let spawned = thread::Builder::new()
            .name(format!("bwt-daemon-{handle}"))
            .spawn(move || registry.run(config, &ctx));
        if let Err(source) = spawned {
            self.registry.lock_runs().remove(&handle);
            return Err(ExternalDaemonError::with_source(
                "failed to spawn daemon thread",
                source,
            ));
        }
        info!(target: EMBEDDED_TARGET, handle, "daemon run spawned");
        Ok(())
    }

    fn shutdown(&self, handle: ShutdownHandle) {
        let raw = handle.into_raw();
        let removed = self.registry.lock_runs().remove(&raw);
        match removed {
            Some(shutdown_tx) => {
                drop(shutdown_tx);
                info!(target: EMBEDDED_TARGET, handle = raw, "daemon run torn down");
            }
            None => {
                warn!(
                    target: EMBEDDED_TARGET,
                    handle = raw,
                    "teardown requested for unknown or finished run"
                );
            }
        }
    }

    fn test_rpc(&self, config_json: &str) -> Result<(), ExternalDaemonError> {
        let config = DaemonConfig::from_json(config_json)
            .map_err(|source| ExternalDaemonError::with_source("invalid config", source))?;
        self.registry
            .runtime
            .test_rpc(&config)
            .map_err(|source| ExternalDaemonError::with_source("node rpc check failed", source))
    }
}
