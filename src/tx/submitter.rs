//! Broadcast, receipt wait and outcome classification

use super::envelope::Envelope;
use super::manual_check::ManualCheckLog;
use super::signer::SignedPayload;
use crate::chain::{ChainClient, ReceiptWait};
use crate::error::{RelayerError, RelayerResult};

use chrono::{DateTime, Utc};
use ethers::types::{TransactionReceipt, H256, U64};
use serde::Serialize;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Progress of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Built,
    Broadcasting,
    HashKnown,
    Confirmed,
    Reverted,
    TimedOut,
    SendFailed,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::Built => "BUILT",
            SubmissionState::Broadcasting => "BROADCASTING",
            SubmissionState::HashKnown => "HASH_KNOWN",
            SubmissionState::Confirmed => "CONFIRMED",
            SubmissionState::Reverted => "REVERTED",
            SubmissionState::TimedOut => "TIMED_OUT",
            SubmissionState::SendFailed => "SEND_FAILED",
        };
        f.write_str(name)
    }
}

/// Non-error result of a submission
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Mined with a success status
    Confirmed {
        #[serde(rename = "blockNumber")]
        block_number: Option<U64>,
        #[serde(skip)]
        receipt: Box<TransactionReceipt>,
    },
    /// Not mined within the wait window; an operator has to verify it
    Unresolved,
}

/// A transaction the node accepted
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub transaction_hash: H256,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
}

impl Submission {
    pub fn is_confirmed(&self) -> bool {
        matches!(self.outcome, SubmissionOutcome::Confirmed { .. })
    }
}

/// Hands transactions to the node and decides what happened to them.
///
/// Nothing here is retried: every submission ends confirmed, reported as
/// failed, or recorded for an operator.
pub struct Submitter {
    client: Arc<dyn ChainClient>,
    manual_check: ManualCheckLog,
}

impl Submitter {
    pub fn new(client: Arc<dyn ChainClient>, manual_check: ManualCheckLog) -> Self {
        Self {
            client,
            manual_check,
        }
    }

    pub fn manual_check(&self) -> &ManualCheckLog {
        &self.manual_check
    }

    /// Submit a prepared payload built from `envelope`
    pub async fn submit(
        &self,
        envelope: &Envelope,
        payload: SignedPayload,
    ) -> RelayerResult<Submission> {
        let trace = Backtrace::force_capture();
        let chain_id = envelope.chain_id;
        let started = Instant::now();

        debug!(
            "{} -> {} nonce {}",
            SubmissionState::Built,
            SubmissionState::Broadcasting,
            envelope.nonce
        );
        let broadcast = match payload {
            SignedPayload::Raw(raw) => self.client.send_raw_transaction(raw).await,
            SignedPayload::Unsigned(tx) => self.client.send_transaction(tx).await,
        };

        let tx_hash = match broadcast {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                let message = format!("Send Signed Transaction Failed: {}", e);
                return Err(self.send_failed(envelope, None, message, &trace));
            }
        };

        // Kept from here on, whatever the receipt wait does
        let submitted_at = Utc::now();
        crate::metrics::record_tx_submitted(chain_id);
        info!("Transaction sent: {:?} ({})", tx_hash, SubmissionState::HashKnown);

        let result = match self.client.wait_for_receipt(tx_hash).await {
            Ok(ReceiptWait::Mined(receipt)) => {
                self.classify_receipt(envelope, tx_hash, submitted_at, receipt)
            }
            Ok(ReceiptWait::Pending) => self.unresolved(envelope, tx_hash, submitted_at).await,
            Err(e) if e.is_still_mining() => {
                self.unresolved(envelope, tx_hash, submitted_at).await
            }
            Err(e) => {
                let message = format!("Send Signed Transaction Failed TxHash:{:?}: {}", tx_hash, e);
                Err(self.send_failed(envelope, Some(tx_hash), message, &trace))
            }
        };

        crate::metrics::record_tx_latency(chain_id, started.elapsed().as_secs_f64());
        result
    }

    fn classify_receipt(
        &self,
        envelope: &Envelope,
        tx_hash: H256,
        submitted_at: DateTime<Utc>,
        receipt: Box<TransactionReceipt>,
    ) -> RelayerResult<Submission> {
        let block_number = receipt.block_number;

        if receipt.status == Some(U64::one()) {
            info!(
                "Transaction Successful txHash:{:?} blockNumber:{} ({})",
                tx_hash,
                block_number.map(|b| b.to_string()).unwrap_or_default(),
                SubmissionState::Confirmed
            );
            crate::metrics::record_outcome(envelope.chain_id, SubmissionState::Confirmed);
            return Ok(Submission {
                transaction_hash: tx_hash,
                submitted_at,
                outcome: SubmissionOutcome::Confirmed {
                    block_number,
                    receipt,
                },
            });
        }

        error!(
            "Transaction Receipt Status Failed ({}) receipt: {}",
            SubmissionState::Reverted,
            serde_json::to_string(&receipt).unwrap_or_else(|_| format!("{:?}", receipt))
        );
        error!("RawTx that failed {}", envelope.to_json());
        crate::metrics::record_outcome(envelope.chain_id, SubmissionState::Reverted);

        Err(RelayerError::Reverted {
            tx_hash,
            block_number,
            receipt,
        })
    }

    async fn unresolved(
        &self,
        envelope: &Envelope,
        tx_hash: H256,
        submitted_at: DateTime<Utc>,
    ) -> RelayerResult<Submission> {
        warn!(
            "Transaction was not mined within the wait window, please make sure your transaction \
             was properly sent. Be aware that it might still be mined. transactionHash:{:?} ({})",
            tx_hash,
            SubmissionState::TimedOut
        );

        if let Err(e) = self
            .manual_check
            .append(tx_hash, envelope.to, &envelope.data)
            .await
        {
            // The hash is still returned; the operator must get it from this log line
            error!(
                "Failed to write {:?} to {:?}: {}. {}",
                tx_hash,
                self.manual_check.path(),
                e,
                ManualCheckLog::format_record(tx_hash, envelope.to, &envelope.data).trim_end()
            );
        }
        crate::metrics::record_outcome(envelope.chain_id, SubmissionState::TimedOut);

        Ok(Submission {
            transaction_hash: tx_hash,
            submitted_at,
            outcome: SubmissionOutcome::Unresolved,
        })
    }

    fn send_failed(
        &self,
        envelope: &Envelope,
        tx_hash: Option<H256>,
        message: String,
        trace: &Backtrace,
    ) -> RelayerError {
        let trace = trace.to_string();
        error!("{} ({})\n{}", message, SubmissionState::SendFailed, trace);
        error!("RawTx that failed {}", envelope.to_json());
        crate::metrics::record_outcome(envelope.chain_id, SubmissionState::SendFailed);

        RelayerError::Submission {
            tx_hash,
            message,
            trace,
        }
    }
}
