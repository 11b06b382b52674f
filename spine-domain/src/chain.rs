//! Chain selection.
//!
//! The facilitator network and the explorer link are derived solely from
//! the settlement chain id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cronos mainnet chain id.
pub const CRONOS_MAINNET_CHAIN_ID: u64 = 25;

/// Cronos testnet chain id.
pub const CRONOS_TESTNET_CHAIN_ID: u64 = 338;

/// Facilitator network identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CronosNetwork {
    /// Cronos mainnet
    #[serde(rename = "cronos")]
    Mainnet,
    /// Cronos testnet
    #[serde(rename = "cronos-testnet")]
    Testnet,
}

impl CronosNetwork {
    /// Chain 25 is mainnet; every other chain id targets the testnet.
    pub fn from_chain_id(chain_id: u64) -> Self {
        if chain_id == CRONOS_MAINNET_CHAIN_ID {
            CronosNetwork::Mainnet
        } else {
            CronosNetwork::Testnet
        }
    }

    /// Network name as used in payment requirements.
    pub fn as_str(&self) -> &'static str {
        match self {
            CronosNetwork::Mainnet => "cronos",
            CronosNetwork::Testnet => "cronos-testnet",
        }
    }

    /// USDC.e contract for the network.
    pub fn usdc_contract(&self) -> &'static str {
        match self {
            CronosNetwork::Mainnet => "0xf951eC28187D9E5Ca673Da8FE6757E6f0Be5F77C",
            CronosNetwork::Testnet => "0xc01efAaF7C5C61bEbFAeb358E1161b537b8bC0e0",
        }
    }
}

impl fmt::Display for CronosNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Block explorer link for a transaction, for known chains only.
pub fn explorer_url(chain_id: u64, tx_hash: &str) -> Option<String> {
    match chain_id {
        CRONOS_TESTNET_CHAIN_ID => {
            Some(format!("https://explorer.cronos.org/testnet/tx/{}", tx_hash))
        }
        CRONOS_MAINNET_CHAIN_ID => Some(format!("https://explorer.cronos.org/tx/{}", tx_hash)),
        _ => None,
    }
}
