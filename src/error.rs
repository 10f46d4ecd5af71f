//! Error types for the federator transaction sender

use ethers::types::{TransactionReceipt, H256, U64};
use std::fmt;
use thiserror::Error;

/// Text nodes put in a receipt-wait error when the transaction may still land.
pub const STILL_MINING_SIGNAL: &str = "might still be mined";

/// Step of envelope construction that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionStage {
    ChainId,
    Sender,
    Nonce,
    GasPrice,
    GasEstimate,
}

impl fmt::Display for ConstructionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstructionStage::ChainId => "chain id",
            ConstructionStage::Sender => "sender address",
            ConstructionStage::Nonce => "nonce",
            ConstructionStage::GasPrice => "gas price",
            ConstructionStage::GasEstimate => "gas estimate",
        };
        f.write_str(name)
    }
}

/// Main error type for the relayer
#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC {method} failed: {message}")]
    Rpc {
        method: &'static str,
        message: String,
    },

    #[error("Failed to resolve {stage}: {message}")]
    Construction {
        stage: ConstructionStage,
        message: String,
    },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Transaction Failed: {message} (tx hash: {})", display_hash(.tx_hash))]
    Submission {
        tx_hash: Option<H256>,
        message: String,
        /// Call stack captured when the submission started
        trace: String,
    },

    #[error("Transaction Receipt Status Failed txHash:{tx_hash:?} blockNumber:{}", display_block(.block_number))]
    Reverted {
        tx_hash: H256,
        block_number: Option<U64>,
        receipt: Box<TransactionReceipt>,
    },

    #[error("Manually-check log error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

fn display_hash(hash: &Option<H256>) -> String {
    hash.map(|h| format!("{:?}", h))
        .unwrap_or_else(|| "unknown".to_string())
}

fn display_block(block: &Option<U64>) -> String {
    block
        .map(|b| b.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl RelayerError {
    pub fn construction(stage: ConstructionStage, err: impl fmt::Display) -> Self {
        RelayerError::Construction {
            stage,
            message: err.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayerError::Construction { .. } | RelayerError::Rpc { .. }
        )
    }

    /// Check if error should trigger an alert
    pub fn should_alert(&self) -> bool {
        matches!(
            self,
            RelayerError::Signing(_) | RelayerError::Submission { .. } | RelayerError::Io(_)
        )
    }

    /// Whether a transport error reports a receipt wait that ran out while the
    /// transaction may still be mined. Substring match on node wording.
    pub fn is_still_mining(&self) -> bool {
        match self {
            RelayerError::Rpc { message, .. } => message.contains(STILL_MINING_SIGNAL),
            _ => false,
        }
    }
}

/// Result type for relayer operations
pub type RelayerResult<T> = Result<T, RelayerError>;
