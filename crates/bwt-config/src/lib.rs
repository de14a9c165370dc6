//! Configuration types for the bwt daemon supervisor.
//!
//! Two kinds of configuration live here. [`DaemonConfig`] is the opaque
//! startup record encoded to JSON and handed to the native daemon; the
//! supervisor never reads it back. [`SupervisorConfig`] holds the host's own
//! settings, currently telemetry, and is resolved through `ortho_config`.

mod daemon;
mod defaults;
mod logging;
mod network;
mod supervisor;

pub use daemon::{DaemonConfig, DaemonConfigError};
pub use defaults::{
    DEFAULT_LOG_FILTER, default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use network::{Network, NetworkParseError};
pub use supervisor::SupervisorConfig;
