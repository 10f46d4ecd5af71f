//! Bridge Federator - transaction submission CLI
//!
//! Sends already-decided contract calls through the submission core, either
//! one at a time from the command line or as a stream of requests on stdin.

use anyhow::{Context, Result};
use bridge_federator::metrics::MetricsServer;
use bridge_federator::tx::{parse_data, parse_quantity};
use bridge_federator::{init_logging, Settings, Submission, TransactionSender};
use clap::{Parser, Subcommand};
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{error, info, Instrument};

#[derive(Parser)]
#[command(name = "bridge-federator")]
#[command(about = "Submit federator transactions and report their outcome", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $FEDERATOR_CONFIG or config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one transaction and wait for its outcome
    Send {
        /// Destination contract or account
        #[arg(long)]
        to: String,
        /// ABI-encoded call data as hex
        #[arg(long, default_value = "0x")]
        data: String,
        /// Native value, decimal or 0x-prefixed hex
        #[arg(long)]
        value: Option<String>,
    },
    /// Read newline-delimited JSON requests from stdin and send them in order
    Serve,
    /// Print the address transactions are sent from
    Address,
}

/// One line of `serve` input
#[derive(Debug, Deserialize)]
struct SendRequest {
    id: Option<String>,
    to: Address,
    #[serde(default)]
    data: Bytes,
    value: Option<String>,
}

/// One line of `serve` output
#[derive(Debug, Serialize)]
struct SendResponse {
    id: String,
    #[serde(flatten)]
    submission: Option<Submission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    info!("Starting Bridge Federator v{}", env!("CARGO_PKG_VERSION"));

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let sender = TransactionSender::from_settings(&settings)?;

    match cli.command {
        Commands::Send { to, data, value } => {
            let to: Address = to
                .parse()
                .with_context(|| format!("Invalid destination address: {}", to))?;
            let data = parse_data(&data).map_err(anyhow::Error::msg)?;
            let value = parse_value(value.as_deref())?;

            let submission = sender.send_transaction(to, data, value).await?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
        }
        Commands::Serve => serve(&settings, &sender).await?,
        Commands::Address => {
            println!("{:?}", sender.sender_address().await?);
        }
    }

    Ok(())
}

fn parse_value(value: Option<&str>) -> Result<Option<U256>> {
    value
        .map(|v| parse_quantity(v).map_err(|e| anyhow::anyhow!("Invalid value {}", e)))
        .transpose()
}

/// Process requests one at a time so nonces for our single sender never race
async fn serve(settings: &Settings, sender: &TransactionSender) -> Result<()> {
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Sending from {:?}", sender.sender_address().await?);
    info!("Bridge Federator is reading requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read request")?,
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping...");
                break;
            }
        };

        let Some(line) = line else {
            info!("End of input");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        // A send that started always runs to its terminal state
        let response = handle_request(sender, &line).await;
        let mut output = serde_json::to_vec(&response)?;
        output.push(b'\n');
        stdout.write_all(&output).await?;
        stdout.flush().await?;
    }

    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Bridge Federator stopped");
    Ok(())
}

async fn handle_request(sender: &TransactionSender, line: &str) -> SendResponse {
    let request: SendRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return SendResponse {
                id: uuid::Uuid::new_v4().to_string(),
                submission: None,
                error: Some(format!("Invalid request: {}", e)),
            }
        }
    };

    let id = request
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let span = tracing::info_span!("request", id = %id);

    let result = async {
        let value = parse_value(request.value.as_deref())?;
        let submission = sender
            .send_transaction(request.to, request.data, value)
            .await?;
        Ok::<_, anyhow::Error>(submission)
    }
    .instrument(span)
    .await;

    match result {
        Ok(submission) => SendResponse {
            id,
            submission: Some(submission),
            error: None,
        },
        Err(e) => SendResponse {
            id,
            submission: None,
            error: Some(e.to_string()),
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
