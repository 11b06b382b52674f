//! Settlement adapter selection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use spine_connectors::{FacilitatorClient, DEFAULT_FACILITATOR_URL};

use crate::error::ExecError;
use crate::facilitator::FacilitatorSettlement;
use crate::ports::SettlementAdapter;
use crate::stub::MockSettlement;

/// Which settlement adapter to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettlementMode {
    /// Local mock, no network
    #[default]
    Mock,
    /// External x402 facilitator
    Facilitator,
}

impl fmt::Display for SettlementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementMode::Mock => write!(f, "mock"),
            SettlementMode::Facilitator => write!(f, "facilitator"),
        }
    }
}

impl FromStr for SettlementMode {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(SettlementMode::Mock),
            "facilitator" => Ok(SettlementMode::Facilitator),
            other => Err(ExecError::Config(format!(
                "Unknown settlement mode '{}', expected mock or facilitator",
                other
            ))),
        }
    }
}

/// Settlement adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    /// Adapter variant
    pub mode: SettlementMode,
    /// Facilitator base URL (facilitator mode only)
    pub facilitator_url: Option<String>,
    /// Facilitator request deadline
    pub facilitator_timeout: Duration,
    /// Chain the adapter settles on
    pub chain_id: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            mode: SettlementMode::Mock,
            facilitator_url: None,
            facilitator_timeout: Duration::from_secs(30),
            chain_id: spine_domain::chain::CRONOS_TESTNET_CHAIN_ID,
        }
    }
}

/// Build the adapter selected by `config`.
pub fn create_settlement_adapter(config: &SettlementConfig) -> Arc<dyn SettlementAdapter> {
    match config.mode {
        SettlementMode::Mock => {
            info!(chain_id = config.chain_id, "Using mock settlement");
            Arc::new(MockSettlement::new(config.chain_id))
        }
        SettlementMode::Facilitator => {
            let url = config.facilitator_url.as_deref().unwrap_or(DEFAULT_FACILITATOR_URL);
            info!(
                chain_id = config.chain_id,
                facilitator_url = %url,
                "Using facilitator settlement"
            );
            let client = FacilitatorClient::new(url).with_timeout(config.facilitator_timeout);
            Arc::new(FacilitatorSettlement::new(client, config.chain_id))
        }
    }
}
