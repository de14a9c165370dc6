//! Tracing setup for hosts that let the supervisor own the global subscriber.
//!
//! Each embedded daemon run executes inside a `daemon_run` span carrying its
//! handle. JSON output attaches that span to every event, and compact output
//! prefixes events with it, so controller and runtime events can be traced
//! back to the run that produced them.

use std::io::{self, IsTerminal};

use bwt_config::{LogFormat, SupervisorConfig};
use bwt_daemon_types::RawHandle;
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::Span;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

static INSTALLED: OnceCell<()> = OnceCell::new();

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while installing the supervisor's subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter is not a valid `EnvFilter` directive list.
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidFilter {
        /// Filter as configured.
        filter: String,
        /// Parser message.
        reason: String,
    },
    /// Another global subscriber was installed first.
    #[error("could not install the supervisor subscriber")]
    Install(#[source] TryInitError),
}

/// Installs the global subscriber described by `config`.
///
/// Only the first successful call installs anything; later calls return
/// `Ok(())` without touching the active subscriber. Hosts that already own a
/// subscriber should not call this, the supervisor only emits `tracing`
/// events.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter does not parse or another
/// subscriber is already active.
///
/// # Examples
///
/// ```rust
/// use bwt_config::SupervisorConfig;
/// use bwt_supervisor::telemetry;
///
/// # fn main() -> Result<(), bwt_supervisor::telemetry::TelemetryError> {
/// let config = SupervisorConfig::default();
/// telemetry::initialise(&config)?;
/// telemetry::initialise(&config)?;
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &SupervisorConfig) -> Result<(), TelemetryError> {
    INSTALLED.get_or_try_init(|| install(config)).map(|_| ())
}

/// Span enclosing everything that happens on behalf of one daemon run.
#[must_use]
pub fn run_span(handle: RawHandle) -> Span {
    tracing::info_span!("daemon_run", handle)
}

fn install(config: &SupervisorConfig) -> Result<(), TelemetryError> {
    let filter = parse_filter(config.log_filter())?;
    let output = output_layer(config.log_format());

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(TelemetryError::Install)
}

fn parse_filter(filter: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(filter).map_err(|error| TelemetryError::InvalidFilter {
        filter: filter.to_owned(),
        reason: error.to_string(),
    })
}

fn output_layer(format: LogFormat) -> OutputLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_thread_names(true)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(UtcTime::rfc_3339())
            .with_writer(io::stderr)
            .boxed(),
    }
}
