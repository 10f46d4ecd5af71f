//! Chain module - the node RPC boundary
//!
//! This module provides:
//! - The `ChainClient` trait every node interaction goes through
//! - An ethers-backed `ChainProvider` with multi-RPC failover for reads
//! - Receipt waiting bounded by the node wait window

pub mod provider;

pub use provider::ChainProvider;

use crate::error::RelayerResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// Result of waiting for a broadcast transaction to be mined
#[derive(Debug, Clone)]
pub enum ReceiptWait {
    /// The node returned a receipt
    Mined(Box<TransactionReceipt>),
    /// The wait window elapsed without a receipt; the transaction may still land
    Pending,
}

/// Conventional blockchain JSON-RPC surface used by the sender
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> RelayerResult<u64>;

    /// `eth_accounts`, used for node-side signing
    async fn accounts(&self) -> RelayerResult<Vec<Address>>;

    /// `eth_getTransactionCount(address, "pending")`
    async fn pending_nonce(&self, address: Address) -> RelayerResult<U256>;

    /// `eth_gasPrice`
    async fn gas_price(&self) -> RelayerResult<U256>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, tx: &TypedTransaction) -> RelayerResult<U256>;

    /// `eth_call` against the latest block
    async fn call_contract(&self, tx: &TypedTransaction) -> RelayerResult<Bytes>;

    /// `eth_sendRawTransaction`; resolves as soon as the node accepts the transaction
    async fn send_raw_transaction(&self, raw: Bytes) -> RelayerResult<H256>;

    /// `eth_sendTransaction` for node-managed accounts
    async fn send_transaction(&self, tx: TypedTransaction) -> RelayerResult<H256>;

    /// Wait for the receipt of `tx_hash` within the node wait window
    async fn wait_for_receipt(&self, tx_hash: H256) -> RelayerResult<ReceiptWait>;
}
