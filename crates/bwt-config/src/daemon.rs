//! Startup parameters handed to the native daemon.
//!
//! The supervisor never interprets these values. They are encoded once, at
//! start, and the daemon applies its own defaults for anything left unset.

use std::net::SocketAddr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::Network;

/// Configuration record forwarded verbatim to the daemon.
///
/// Every field is optional. Unset fields are omitted from the encoded JSON
/// rather than written as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Network to operate on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    /// Bitcoin Core RPC endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoind_url: Option<String>,
    /// RPC credentials in `user:password` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoind_auth: Option<String>,
    /// Bitcoin Core data directory, used to locate the cookie file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoind_dir: Option<Utf8PathBuf>,
    /// Explicit path to the RPC cookie file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoind_cookie: Option<Utf8PathBuf>,
    /// Bitcoin Core wallet used for address imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoind_wallet: Option<String>,
    /// Output script descriptors to track.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptors: Vec<String>,
    /// Extended public keys to track.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xpubs: Vec<String>,
    /// UNIX timestamp to start rescanning from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescan_since: Option<u64>,
    /// Number of unused addresses to watch past the last used one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_limit: Option<u32>,
    /// Batch size for the first address import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_import_size: Option<u32>,
    /// Lower and upper polling interval bounds, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<(u64, u64)>,
    /// Daemon log verbosity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<u8>,
    /// Custom command used to broadcast transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_broadcast_cmd: Option<String>,
    /// Bind address for the Electrum server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electrum_addr: Option<SocketAddr>,
    /// Skip merkle proof generation in the Electrum server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electrum_skip_merkle: Option<bool>,
    /// Bind address for the HTTP API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_addr: Option<SocketAddr>,
    /// Allow cross-origin requests to the HTTP API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_cors: Option<bool>,
    /// Endpoints notified of wallet events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhooks_urls: Vec<String>,
    /// Path of the local IPC listener socket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_listener_path: Option<Utf8PathBuf>,
    /// Refuse to start without at least one tracked address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_addresses: Option<bool>,
    /// Let the daemon install its own logger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_logger: Option<bool>,
    /// Rescan from `rescan_since` even when history already exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_rescan: Option<bool>,
}

impl DaemonConfig {
    /// Encodes the record as the JSON document the daemon expects.
    pub fn to_json(&self) -> Result<String, DaemonConfigError> {
        serde_json::to_string(self).map_err(|source| DaemonConfigError::Encode { source })
    }

    /// Decodes a JSON document produced by [`DaemonConfig::to_json`] or a host.
    pub fn from_json(json: &str) -> Result<Self, DaemonConfigError> {
        serde_json::from_str(json).map_err(|source| DaemonConfigError::Decode { source })
    }
}

/// Errors raised while encoding or decoding a [`DaemonConfig`].
#[derive(Debug, Error)]
pub enum DaemonConfigError {
    /// The record could not be encoded.
    #[error("failed to encode daemon configuration: {source}")]
    Encode {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// The document was not a valid daemon configuration.
    #[error("invalid daemon configuration: {source}")]
    Decode {
        /// Underlying deserialisation error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    #[fixture]
    fn watch_only() -> DaemonConfig {
        DaemonConfig {
            network: Some(Network::Regtest),
            bitcoind_url: Some("http://127.0.0.1:18443/".to_owned()),
            bitcoind_auth: Some("satoshi:secret".to_owned()),
            descriptors: vec!["wpkh(tpubD6NzVbkrYhZ4Wa/0/*)".to_owned()],
            gap_limit: Some(20),
            poll_interval: Some((1, 5)),
            electrum_addr: Some("127.0.0.1:50001".parse().expect("socket address")),
            http_cors: Some(true),
            ..DaemonConfig::default()
        }
    }

    #[test]
    fn empty_config_encodes_as_empty_object() {
        let json = DaemonConfig::default().to_json().expect("encode");
        assert_eq!(json, "{}");
    }

    #[rstest]
    fn encodes_with_native_field_names(watch_only: DaemonConfig) {
        let json = watch_only.to_json().expect("encode");
        let value: Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(
            value,
            json!({
                "network": "regtest",
                "bitcoind_url": "http://127.0.0.1:18443/",
                "bitcoind_auth": "satoshi:secret",
                "descriptors": ["wpkh(tpubD6NzVbkrYhZ4Wa/0/*)"],
                "gap_limit": 20,
                "poll_interval": [1, 5],
                "electrum_addr": "127.0.0.1:50001",
                "http_cors": true,
            })
        );
    }

    #[rstest]
    fn decodes_what_it_encodes(watch_only: DaemonConfig) {
        let json = watch_only.to_json().expect("encode");
        let decoded = DaemonConfig::from_json(&json).expect("decode");
        assert_eq!(decoded, watch_only);
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = DaemonConfig::from_json(r#"{"gap_limt": 10}"#).expect_err("typo must fail");
        assert!(matches!(error, DaemonConfigError::Decode { .. }));
        assert!(error.to_string().contains("gap_limt"), "got {error}");
    }

    #[test]
    fn rejects_unknown_network() {
        let error =
            DaemonConfig::from_json(r#"{"network": "liquid"}"#).expect_err("network must fail");
        assert!(matches!(error, DaemonConfigError::Decode { .. }));
    }
}
