use crate::logging::LogFormat;

/// Log filter applied when neither a file, the environment, nor a flag sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned default log filter, for serde and `ortho_config` defaults.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default telemetry output format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
