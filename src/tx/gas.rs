//! Gas limit policy and gas price oracle

use crate::chain::ChainClient;
use crate::config::{GasLimitConfig, GasOracleConfig};
use crate::error::RelayerResult;

use async_trait::async_trait;
use ethers::types::U256;
use std::sync::Arc;
use tracing::debug;

/// Two-band gas limit policy.
///
/// Votes need ~70k gas and vote+execute a little over 250k, while the first
/// side-token deployment needs ~3.15M. Node estimates are unreliable for the
/// latter, so anything at or above `minimum` gets the full `ceiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasLimitPolicy {
    pub minimum: U256,
    pub ceiling: U256,
}

/// Band a resolved gas limit fell into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasBand {
    Minimum,
    Ceiling,
}

impl GasBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            GasBand::Minimum => "minimum",
            GasBand::Ceiling => "ceiling",
        }
    }
}

impl GasLimitPolicy {
    pub const DEFAULT_MINIMUM: u64 = 300_000;
    pub const DEFAULT_CEILING: u64 = 3_500_000;

    pub fn new(minimum: u64, ceiling: u64) -> Self {
        Self {
            minimum: U256::from(minimum),
            ceiling: U256::from(ceiling),
        }
    }

    /// Band for a simulated estimate
    pub fn band(&self, estimate: U256) -> GasBand {
        if estimate < self.minimum {
            GasBand::Minimum
        } else {
            GasBand::Ceiling
        }
    }

    /// Gas limit to use for a simulated estimate. Never the estimate itself.
    pub fn resolve(&self, estimate: U256) -> U256 {
        match self.band(estimate) {
            GasBand::Minimum => self.minimum,
            GasBand::Ceiling => self.ceiling,
        }
    }
}

impl Default for GasLimitPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MINIMUM, Self::DEFAULT_CEILING)
    }
}

impl From<GasLimitConfig> for GasLimitPolicy {
    fn from(config: GasLimitConfig) -> Self {
        Self::new(config.minimum, config.ceiling)
    }
}

/// Source of gas prices, keyed by chain id. Queried on every transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GasPriceOracle: Send + Sync {
    async fn get_gas_price(&self, chain_id: u64) -> RelayerResult<U256>;
}

/// Oracle backed by the node's `eth_gasPrice`
pub struct NodeGasOracle {
    client: Arc<dyn ChainClient>,
    /// Buffer percentage added to the node price (e.g., 10 = 10%)
    buffer_percent: u64,
    /// Floor applied after the buffer
    min_gas_price: U256,
}

impl NodeGasOracle {
    pub fn new(client: Arc<dyn ChainClient>, config: &GasOracleConfig) -> Self {
        Self {
            client,
            buffer_percent: config.buffer_percent,
            min_gas_price: U256::from(config.min_gas_price_wei.unwrap_or_default()),
        }
    }
}

#[async_trait]
impl GasPriceOracle for NodeGasOracle {
    async fn get_gas_price(&self, chain_id: u64) -> RelayerResult<U256> {
        let price = self.client.gas_price().await?;
        let buffered = price + price * self.buffer_percent / 100;
        let price = std::cmp::max(buffered, self.min_gas_price);

        debug!("Gas price for chain {}: {}", chain_id, price);
        Ok(price)
    }
}
