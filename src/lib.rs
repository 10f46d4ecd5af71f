//! Bridge Federator - transaction submission core
//!
//! Turns an already-decided contract call into a priced, nonced and signed
//! transaction, broadcasts it and classifies the outcome as confirmed,
//! reverted, failed, or unresolved (handed to an operator).

pub mod chain;
pub mod config;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod tx;

pub use config::Settings;
pub use error::{RelayerError, RelayerResult};
pub use tx::{Submission, SubmissionOutcome, TransactionSender, TxSigner};

/// Environment variable selecting the log format (`json` or anything else for text)
pub const LOG_FORMAT_ENV_VAR: &str = "FEDERATOR_LOG_FORMAT";

/// Initialize logging for the binaries. Logs go to stderr, stdout carries results.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_federator=debug,hyper=warn"));

    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
