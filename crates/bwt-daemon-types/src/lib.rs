//! Lifecycle event vocabulary shared by the supervisor and daemon runners.
//!
//! A daemon run reports exactly one [`DaemonEvent::Booting`] first, then any
//! number of progress events, then the server addresses, then exactly one
//! [`DaemonEvent::Ready`].

use serde::{Deserialize, Serialize};

/// Opaque value identifying one daemon run for teardown purposes.
pub type RawHandle = u64;

/// Notification emitted by a daemon during a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// The daemon accepted the configuration and can now be torn down.
    Booting {
        /// Teardown handle for this run.
        handle: RawHandle,
    },
    /// Bitcoin Core block download progress.
    SyncProgress {
        /// Completed fraction in `[0, 1]`.
        progress: f32,
        /// Timestamp of the node's chain tip, in UNIX seconds.
        tip: u32,
    },
    /// Wallet rescan progress.
    ScanProgress {
        /// Completed fraction in `[0, 1]`.
        progress: f32,
        /// Estimated seconds remaining.
        eta: u32,
    },
    /// The Electrum server is listening.
    ElectrumReady {
        /// Bound socket address.
        addr: String,
    },
    /// The HTTP API is listening.
    HttpReady {
        /// Bound socket address.
        addr: String,
    },
    /// Start-up finished and all servers are running.
    Ready,
}

impl DaemonEvent {
    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Booting { .. } => "booting",
            Self::SyncProgress { .. } => "sync_progress",
            Self::ScanProgress { .. } => "scan_progress",
            Self::ElectrumReady { .. } => "electrum_ready",
            Self::HttpReady { .. } => "http_ready",
            Self::Ready => "ready",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DaemonEvent;

    #[test]
    fn events_are_tagged_by_kind() {
        let event: DaemonEvent =
            serde_json::from_str(r#"{"event":"scan_progress","progress":0.25,"eta":90}"#)
                .unwrap_or_else(|error| panic!("event should decode: {error}"));
        assert_eq!(
            event,
            DaemonEvent::ScanProgress {
                progress: 0.25,
                eta: 90
            }
        );
        assert_eq!(event.kind(), "scan_progress");
    }

    #[test]
    fn ready_carries_no_payload() {
        let json = serde_json::to_string(&DaemonEvent::Ready)
            .unwrap_or_else(|error| panic!("event should encode: {error}"));
        assert_eq!(json, r#"{"event":"ready"}"#);
    }
}
