//! Test doubles shared by the controller and embedded-runner suites.

mod daemon;
mod observer;
mod world;

pub use daemon::RecordingDaemon;
pub use observer::{ObservedEvent, RecordingObserver};
pub use world::{ControllerWorld, test_config, world};
