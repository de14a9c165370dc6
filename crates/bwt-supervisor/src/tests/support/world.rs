//! BDD test world: a controller wired to recording doubles, plus the results
//! of the calls made by step functions.

use std::cell::RefCell;
use std::sync::Arc;

use bwt_config::{DaemonConfig, Network};

use crate::controller::{DaemonController, StartError};

use super::daemon::RecordingDaemon;
use super::observer::RecordingObserver;

/// Scenario world shared across BDD steps.
pub struct ControllerWorld {
    pub daemon: Arc<RecordingDaemon>,
    pub observer: Arc<RecordingObserver>,
    pub controller: DaemonController,
    start_results: Vec<Result<(), StartError>>,
}

impl ControllerWorld {
    /// Builds a world around an unstarted controller.
    #[must_use]
    pub fn new() -> Self {
        let daemon = Arc::new(RecordingDaemon::default());
        let controller = DaemonController::new(test_config(), Arc::clone(&daemon));
        Self {
            daemon,
            observer: Arc::new(RecordingObserver::default()),
            controller,
            start_results: Vec::new(),
        }
    }

    /// Calls `start` and keeps the result for later assertions.
    pub fn start(&mut self) {
        let result = self.controller.start(Arc::clone(&self.observer));
        self.start_results.push(result);
    }

    /// Results of every `start` call, in order.
    #[must_use]
    pub fn start_results(&self) -> &[Result<(), StartError>] {
        &self.start_results
    }
}

impl Default for ControllerWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Small watch-only configuration used across suites.
#[must_use]
pub fn test_config() -> DaemonConfig {
    DaemonConfig {
        network: Some(Network::Regtest),
        bitcoind_url: Some("http://127.0.0.1:18443/".to_owned()),
        xpubs: vec![
            concat!(
                "tpubD6NzVbkrYhZ4XgiXtGrdW5XDAPFCL9h7we1vwNCpn8tGbBcgfVYjXyhWo4E1xkh56",
                "hjod1RhGjxbaTLV3X4FyWuejifB9jusQ46QzG87VKp"
            )
            .to_owned(),
        ],
        ..DaemonConfig::default()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<ControllerWorld> {
    RefCell::new(ControllerWorld::new())
}
