use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::defaults::{default_log_filter_string, default_log_format};
use crate::logging::LogFormat;

/// Settings owned by the supervising host rather than the daemon.
///
/// Values are layered by `ortho_config`: built-in defaults, then a
/// configuration file, then `BWT_*` environment variables, then CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "BWT")]
pub struct SupervisorConfig {
    /// `tracing` filter expression, e.g. `info` or `bwt_supervisor=debug`.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for telemetry.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl SupervisorConfig {
    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured telemetry format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}
