//! Transaction submission: envelope building, signing and outcome classification

mod builder;
mod envelope;
mod gas;
mod manual_check;
mod sender;
mod signer;
mod submitter;

pub use builder::TransactionBuilder;
pub use envelope::{parse_data, parse_quantity, to_hex_quantity, Envelope};
pub use gas::{GasBand, GasLimitPolicy, GasPriceOracle, NodeGasOracle};
pub use manual_check::ManualCheckLog;
pub use sender::TransactionSender;
pub use signer::{SignedPayload, TxSigner};
pub use submitter::{Submission, SubmissionOutcome, SubmissionState, Submitter};
