//! Envelope construction: chain id, nonce, gas price and gas limit

use super::envelope::Envelope;
use super::gas::{GasLimitPolicy, GasPriceOracle};
use crate::chain::ChainClient;
use crate::error::{ConstructionStage, RelayerError, RelayerResult};

use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Builds fully-resolved envelopes.
///
/// The nonce is read from the node's pending view on every call and never
/// tracked locally, so callers must serialize sends per sender address.
pub struct TransactionBuilder {
    client: Arc<dyn ChainClient>,
    oracle: Arc<dyn GasPriceOracle>,
    gas_policy: GasLimitPolicy,
    /// Chain identity does not change during a run
    chain_id: OnceCell<u64>,
}

impl TransactionBuilder {
    pub fn new(
        client: Arc<dyn ChainClient>,
        oracle: Arc<dyn GasPriceOracle>,
        gas_policy: GasLimitPolicy,
    ) -> Self {
        Self {
            client,
            oracle,
            gas_policy,
            chain_id: OnceCell::new(),
        }
    }

    /// Chain id, queried once and memoized. Failures are not cached.
    pub async fn chain_id(&self) -> RelayerResult<u64> {
        let chain_id = self
            .chain_id
            .get_or_try_init(|| async {
                let chain_id = self
                    .client
                    .chain_id()
                    .await
                    .map_err(|e| RelayerError::construction(ConstructionStage::ChainId, e))?;
                debug!("Resolved chain id {}", chain_id);
                Ok::<_, RelayerError>(chain_id)
            })
            .await?;
        Ok(*chain_id)
    }

    /// Next unused nonce for `from`, from the node's pending view
    pub async fn nonce(&self, from: Address) -> RelayerResult<U256> {
        self.client
            .pending_nonce(from)
            .await
            .map_err(|e| RelayerError::construction(ConstructionStage::Nonce, e))
    }

    /// Simulate the call and apply the gas limit policy
    pub async fn gas_limit(&self, envelope: &Envelope) -> RelayerResult<U256> {
        let estimate = self
            .client
            .estimate_gas(&envelope.simulation_request())
            .await
            .map_err(|e| RelayerError::construction(ConstructionStage::GasEstimate, e))?;

        let band = self.gas_policy.band(estimate);
        let gas_limit = self.gas_policy.resolve(estimate);
        crate::metrics::record_gas_band(band);

        debug!(
            "Gas estimate {} resolved to {} ({} band)",
            estimate,
            gas_limit,
            band.as_str()
        );
        Ok(gas_limit)
    }

    /// Assemble an unsigned envelope for one send
    pub async fn build(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        value: Option<U256>,
    ) -> RelayerResult<Envelope> {
        let nonce = self.nonce(from).await?;
        let chain_id = self.chain_id().await?;
        let gas_price = self
            .oracle
            .get_gas_price(chain_id)
            .await
            .map_err(|e| RelayerError::construction(ConstructionStage::GasPrice, e))?;

        let mut envelope = Envelope::unsigned(from, to, data, value, nonce, gas_price, chain_id);
        envelope.gas_limit = self.gas_limit(&envelope).await?;

        debug!("Built envelope {}", envelope.to_json());
        Ok(envelope)
    }
}
