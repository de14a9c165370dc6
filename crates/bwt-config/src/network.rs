use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Bitcoin network the daemon connects to.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Network {
    /// Bitcoin mainnet.
    Bitcoin,
    /// The public test network.
    Testnet,
    /// The default signet.
    Signet,
    /// A local regression-test chain.
    Regtest,
}

/// Error returned when a [`Network`] cannot be parsed from text.
pub type NetworkParseError = strum::ParseError;
