//! Lifecycle controller for one supervised daemon run.
//!
//! The controller owns four pieces of state: whether it has been started,
//! whether the daemon reported readiness, whether a shutdown was requested,
//! and the teardown handle once the daemon is booting. Two paths contend for
//! the handle: the daemon's booting event and the caller's `shutdown`. Both
//! claim it inside the same critical section, so exactly one of them hands it
//! to the daemon's teardown entry point.
//!
//! Observer hooks and teardown calls run after the lock is released. An
//! observer may therefore call [`DaemonController::shutdown`] from inside a
//! hook without deadlocking.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bwt_config::{DaemonConfig, DaemonConfigError};
use bwt_daemon_types::DaemonEvent;
use once_cell::sync::OnceCell;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, trace, warn};

use crate::external::{ExternalDaemon, ExternalDaemonError, NotificationSink};
use crate::handle::ShutdownHandle;
use crate::observer::ProgressObserver;

const CONTROLLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::controller");

/// Errors returned by [`DaemonController::start`].
#[derive(Debug, Error)]
pub enum StartError {
    /// The controller was already started; a fresh instance is required.
    #[error("daemon controller was already started")]
    AlreadyStarted,
    /// The configuration could not be encoded for the daemon.
    #[error("failed to encode daemon configuration: {source}")]
    Serialise {
        /// Underlying encoding error.
        #[source]
        source: DaemonConfigError,
    },
    /// The daemon refused to start.
    #[error("daemon failed to start: {source}")]
    Launch {
        /// Error reported by the daemon.
        #[source]
        source: ExternalDaemonError,
    },
}

/// Errors returned by [`DaemonController::test_rpc`].
#[derive(Debug, Error)]
pub enum TestRpcError {
    /// The configuration could not be encoded for the daemon.
    #[error("failed to encode daemon configuration: {source}")]
    Serialise {
        /// Underlying encoding error.
        #[source]
        source: DaemonConfigError,
    },
    /// The daemon could not reach the node.
    #[error("node rpc check failed: {source}")]
    Daemon {
        /// Error reported by the daemon.
        #[source]
        source: ExternalDaemonError,
    },
}

/// Coarse lifecycle position derived from the controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// `start` has not been called.
    Unstarted,
    /// Started, waiting for the daemon to report booting.
    Starting,
    /// The daemon is booting and the controller holds its handle.
    Booting,
    /// The daemon reported readiness.
    Ready,
    /// The handle was passed to the daemon's teardown entry point.
    ShutDown,
}

#[derive(Debug, Default)]
struct LifecycleState {
    started: bool,
    ready: bool,
    terminate_requested: bool,
    handle: Option<ShutdownHandle>,
    torn_down: bool,
    electrum_addr: Option<SocketAddr>,
    http_addr: Option<SocketAddr>,
}

impl LifecycleState {
    fn phase(&self) -> LifecyclePhase {
        if !self.started {
            LifecyclePhase::Unstarted
        } else if self.torn_down {
            LifecyclePhase::ShutDown
        } else if self.ready {
            LifecyclePhase::Ready
        } else if self.handle.is_some() {
            LifecyclePhase::Booting
        } else {
            LifecyclePhase::Starting
        }
    }

    const fn forwards_progress(&self) -> bool {
        !self.ready && !self.terminate_requested
    }

    fn claim_handle(&mut self) -> Option<ShutdownHandle> {
        let handle = self.handle.take();
        if handle.is_some() {
            self.torn_down = true;
        }
        handle
    }
}

enum BootingOutcome {
    Forward,
    Terminate(ShutdownHandle),
    Duplicate(ShutdownHandle),
}

/// State shared between the controller and the sinks it hands out.
pub(crate) struct Shared {
    daemon: Box<dyn ExternalDaemon>,
    observer: OnceCell<Box<dyn ProgressObserver>>,
    state: Mutex<LifecycleState>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        // Nothing panics while the lock is held, so a poisoned guard still
        // protects consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, hook: impl FnOnce(&dyn ProgressObserver)) {
        if let Some(observer) = self.observer.get() {
            hook(observer.as_ref());
        }
    }

    pub(crate) fn handle_event(&self, event: DaemonEvent) {
        trace!(
            target: CONTROLLER_TARGET,
            event = event.kind(),
            "daemon event received"
        );
        match event {
            DaemonEvent::Booting { handle } => self.booting(ShutdownHandle::new(handle)),
            DaemonEvent::SyncProgress { progress, tip } => self.sync_progress(progress, tip),
            DaemonEvent::ScanProgress { progress, eta } => self.scan_progress(progress, eta),
            DaemonEvent::ElectrumReady { addr } => self.electrum_ready(&addr),
            DaemonEvent::HttpReady { addr } => self.http_ready(&addr),
            DaemonEvent::Ready => self.ready(),
        }
    }

    fn booting(&self, handle: ShutdownHandle) {
        let outcome = {
            let mut state = self.lock_state();
            if state.terminate_requested {
                state.torn_down = true;
                BootingOutcome::Terminate(handle)
            } else if state.handle.is_some() {
                BootingOutcome::Duplicate(handle)
            } else {
                state.handle = Some(handle);
                BootingOutcome::Forward
            }
        };

        match outcome {
            BootingOutcome::Forward => {
                info!(target: CONTROLLER_TARGET, "daemon booting");
                self.notify(|observer| observer.on_booting());
            }
            BootingOutcome::Terminate(handle) => {
                info!(
                    target: CONTROLLER_TARGET,
                    %handle,
                    "shutdown was requested before boot, tearing down"
                );
                self.daemon.shutdown(handle);
            }
            BootingOutcome::Duplicate(handle) => {
                // Only the first handle is tracked; a second one is released at
                // once so no run is left without an owner.
                warn!(
                    target: CONTROLLER_TARGET,
                    %handle,
                    "duplicate booting event, tearing down its handle"
                );
                self.daemon.shutdown(handle);
            }
        }
    }

    fn sync_progress(&self, progress: f32, tip: u32) {
        if !self.lock_state().forwards_progress() {
            trace!(target: CONTROLLER_TARGET, "sync progress suppressed");
            return;
        }
        let tip_time = match OffsetDateTime::from_unix_timestamp(i64::from(tip)) {
            Ok(tip_time) => tip_time,
            Err(error) => {
                warn!(
                    target: CONTROLLER_TARGET,
                    tip,
                    error = %error,
                    "dropping sync progress with unrepresentable tip"
                );
                return;
            }
        };
        debug!(target: CONTROLLER_TARGET, progress, tip, "sync progress");
        self.notify(|observer| observer.on_sync_progress(clamp_fraction(progress), tip_time));
    }

    fn scan_progress(&self, progress: f32, eta: u32) {
        if !self.lock_state().forwards_progress() {
            trace!(target: CONTROLLER_TARGET, "scan progress suppressed");
            return;
        }
        debug!(target: CONTROLLER_TARGET, progress, eta, "scan progress");
        let eta = Duration::from_secs(u64::from(eta));
        self.notify(|observer| observer.on_scan_progress(clamp_fraction(progress), eta));
    }

    fn electrum_ready(&self, addr: &str) {
        if let Some(parsed) = parse_server_addr("electrum", addr) {
            info!(target: CONTROLLER_TARGET, addr = %parsed, "electrum server ready");
            self.lock_state().electrum_addr = Some(parsed);
        }
    }

    fn http_ready(&self, addr: &str) {
        if let Some(parsed) = parse_server_addr("http", addr) {
            info!(target: CONTROLLER_TARGET, addr = %parsed, "http server ready");
            self.lock_state().http_addr = Some(parsed);
        }
    }

    fn ready(&self) {
        let forward = {
            let mut state = self.lock_state();
            state.ready = true;
            !state.terminate_requested
        };
        if forward {
            info!(target: CONTROLLER_TARGET, "daemon ready");
            self.notify(|observer| observer.on_ready());
        } else {
            debug!(target: CONTROLLER_TARGET, "ready suppressed during shutdown");
        }
    }

    fn shutdown(&self) {
        let claimed = {
            let mut state = self.lock_state();
            state.terminate_requested = true;
            state.claim_handle()
        };
        match claimed {
            Some(handle) => {
                info!(target: CONTROLLER_TARGET, %handle, "tearing down daemon");
                self.daemon.shutdown(handle);
            }
            None => {
                debug!(
                    target: CONTROLLER_TARGET,
                    "no handle held, teardown deferred until booting or already done"
                );
            }
        }
    }
}

fn parse_server_addr(server: &str, addr: &str) -> Option<SocketAddr> {
    match addr.parse() {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(
                target: CONTROLLER_TARGET,
                server,
                addr,
                error = %error,
                "ignoring unparsable server address"
            );
            None
        }
    }
}

fn clamp_fraction(progress: f32) -> f32 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// Supervises a single run of an external daemon.
///
/// A controller starts at most once. To run the daemon again, build a new
/// controller.
pub struct DaemonController {
    config: DaemonConfig,
    shared: Arc<Shared>,
}

impl DaemonController {
    /// Creates an unstarted controller for `config`.
    pub fn new(config: DaemonConfig, daemon: impl ExternalDaemon + 'static) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                daemon: Box::new(daemon),
                observer: OnceCell::new(),
                state: Mutex::new(LifecycleState::default()),
            }),
        }
    }

    /// The configuration submitted at construction.
    #[must_use]
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Starts the daemon, routing its notifications to `observer`.
    ///
    /// The controller is marked as started before the daemon is contacted,
    /// so a failed start still consumes the controller.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::AlreadyStarted`] on every call after the first,
    /// without contacting the daemon.
    pub fn start(&self, observer: impl ProgressObserver + 'static) -> Result<(), StartError> {
        {
            let mut state = self.shared.lock_state();
            if state.started {
                warn!(target: CONTROLLER_TARGET, "rejecting second start");
                return Err(StartError::AlreadyStarted);
            }
            state.started = true;
        }
        if self.shared.observer.set(Box::new(observer)).is_err() {
            return Err(StartError::AlreadyStarted);
        }

        let config_json = self
            .config
            .to_json()
            .map_err(|source| StartError::Serialise { source })?;
        info!(target: CONTROLLER_TARGET, "starting daemon");
        let sink = NotificationSink::new(Arc::clone(&self.shared));
        self.shared
            .daemon
            .start(config_json, sink)
            .map_err(|source| StartError::Launch { source })
    }

    /// Requests shutdown. Safe to call any number of times, from any thread.
    ///
    /// When the daemon is already booting its handle is torn down now.
    /// Otherwise teardown happens as soon as the booting event arrives, and
    /// that event is not forwarded to the observer.
    ///
    /// Notifications are suppressed from the moment this call takes the state
    /// lock. A hook whose forwarding was decided just before that, on the
    /// daemon's thread, may still be running or about to run when this call
    /// returns, so a caller on another thread can observe at most one progress
    /// or ready hook after requesting shutdown.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    /// Asks the daemon to verify node RPC connectivity without starting a run.
    ///
    /// # Errors
    ///
    /// Returns [`TestRpcError`] when encoding fails or the daemon reports a
    /// connectivity problem.
    pub fn test_rpc(&self) -> Result<(), TestRpcError> {
        let config_json = self
            .config
            .to_json()
            .map_err(|source| TestRpcError::Serialise { source })?;
        self.shared
            .daemon
            .test_rpc(&config_json)
            .map_err(|source| TestRpcError::Daemon { source })
    }

    /// Address the Electrum server bound to, once reported.
    #[must_use]
    pub fn electrum_addr(&self) -> Option<SocketAddr> {
        self.shared.lock_state().electrum_addr
    }

    /// Address the HTTP API bound to, once reported.
    #[must_use]
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.shared.lock_state().http_addr
    }

    /// Whether `start` has been called.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.shared.lock_state().started
    }

    /// Whether the daemon reported readiness.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.lock_state().ready
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_terminate_requested(&self) -> bool {
        self.shared.lock_state().terminate_requested
    }

    /// Whether the controller currently owns a teardown handle.
    #[must_use]
    pub fn holds_handle(&self) -> bool {
        self.shared.lock_state().handle.is_some()
    }

    /// Current lifecycle position.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        self.shared.lock_state().phase()
    }
}
