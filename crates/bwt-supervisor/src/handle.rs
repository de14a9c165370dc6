//! Single-use teardown token for a running daemon.

use std::fmt;

use bwt_daemon_types::RawHandle;

/// Ownership of one daemon run, required to tear it down.
///
/// The token is neither `Clone` nor `Copy`: handing it to
/// [`ExternalDaemon::shutdown`](crate::ExternalDaemon::shutdown) moves it out
/// of the caller, so the same run cannot be torn down twice through one
/// token.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ShutdownHandle(RawHandle);

impl ShutdownHandle {
    /// Wraps the raw value reported by the daemon's booting event.
    #[must_use]
    pub const fn new(raw: RawHandle) -> Self {
        Self(raw)
    }

    /// Raw value, for logging and diagnostics.
    #[must_use]
    pub const fn raw(&self) -> RawHandle {
        self.0
    }

    /// Consumes the token, yielding the raw value for the daemon's teardown call.
    #[must_use]
    pub const fn into_raw(self) -> RawHandle {
        self.0
    }
}

impl fmt::Display for ShutdownHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "handle#{}", self.0)
    }
}
