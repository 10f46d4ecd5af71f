//! Transaction sender: build, sign and submit one transaction per call

use super::builder::TransactionBuilder;
use super::gas::{GasLimitPolicy, GasPriceOracle, NodeGasOracle};
use super::manual_check::ManualCheckLog;
use super::signer::TxSigner;
use super::submitter::{Submission, Submitter};
use crate::chain::{ChainClient, ChainProvider};
use crate::config::Settings;
use crate::error::RelayerResult;

use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Sends already-decided transactions and reports what happened to them.
///
/// Nonces come from the node's pending view on every call. Two concurrent
/// sends for the same sender can pick the same nonce, so callers must queue
/// sends per sender address.
pub struct TransactionSender {
    client: Arc<dyn ChainClient>,
    builder: TransactionBuilder,
    signer: TxSigner,
    submitter: Submitter,
}

impl TransactionSender {
    /// Create a new transaction sender
    pub fn new(
        client: Arc<dyn ChainClient>,
        oracle: Arc<dyn GasPriceOracle>,
        signer: TxSigner,
        gas_policy: GasLimitPolicy,
        manual_check: ManualCheckLog,
    ) -> Self {
        Self {
            builder: TransactionBuilder::new(client.clone(), oracle, gas_policy),
            submitter: Submitter::new(client.clone(), manual_check),
            client,
            signer,
        }
    }

    /// Wire the node provider, gas oracle and signer from configuration
    pub fn from_settings(settings: &Settings) -> RelayerResult<Self> {
        let receipt_timeout = Duration::from_secs(settings.sender.receipt_timeout_secs);
        let client: Arc<dyn ChainClient> =
            Arc::new(ChainProvider::new(&settings.chain, receipt_timeout)?);
        let oracle: Arc<dyn GasPriceOracle> =
            Arc::new(NodeGasOracle::new(client.clone(), &settings.gas_oracle));
        let signer = TxSigner::from_private_key(settings.wallet.private_key().as_deref())?;
        let manual_check = ManualCheckLog::new(settings.sender.manual_check_path());

        info!(
            "Transaction sender initialized for chain {} (manually-check log: {:?})",
            settings.chain.name,
            manual_check.path()
        );

        Ok(Self::new(
            client,
            oracle,
            signer,
            settings.sender.gas_limit.into(),
            manual_check,
        ))
    }

    /// Node client the sender talks to
    pub fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }

    /// Address transactions are sent from
    pub async fn sender_address(&self) -> RelayerResult<Address> {
        self.signer.resolve_sender(self.client.as_ref()).await
    }

    /// Build, sign and submit one transaction
    pub async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        value: Option<U256>,
    ) -> RelayerResult<Submission> {
        let from = self.sender_address().await.map_err(|e| {
            error!("Failed to resolve sender for transaction to {:?}: {}", to, e);
            e
        })?;

        let mut envelope = self
            .builder
            .build(from, to, data.clone(), value)
            .await
            .map_err(|e| {
                error!(
                    "Failed to build transaction from {:?} to {:?} data {}: {}",
                    from, to, data, e
                );
                e
            })?;

        let payload = self.signer.prepare(&mut envelope).map_err(|e| {
            error!("Failed to sign transaction: {}", e);
            error!("RawTx that failed {}", envelope.to_json());
            e
        })?;

        self.submitter.submit(&envelope, payload).await
    }
}
