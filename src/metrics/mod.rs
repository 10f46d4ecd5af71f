//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Transaction submissions and their outcomes
//! - Gas limit band selection
//! - Submission latency

use crate::error::{RelayerError, RelayerResult};
use crate::tx::{GasBand, SubmissionState};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "federator_transactions_submitted_total",
        "Transactions accepted by the node",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_OUTCOMES: CounterVec = register_counter_vec!(
        "federator_transaction_outcomes_total",
        "Terminal submission states",
        &["chain_id", "outcome"]
    ).unwrap();

    pub static ref GAS_LIMIT_BAND: CounterVec = register_counter_vec!(
        "federator_gas_limit_band_total",
        "Gas limit band chosen for each transaction",
        &["band"]
    ).unwrap();

    pub static ref TX_LATENCY: HistogramVec = register_histogram_vec!(
        "federator_transaction_latency_seconds",
        "Time from broadcast to terminal state",
        &["chain_id"],
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> RelayerResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayerError::Metrics(format!("Failed to bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| RelayerError::Metrics(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    render().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Text exposition of every registered metric
pub fn render() -> RelayerResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| RelayerError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| RelayerError::Metrics(e.to_string()))
}

// Helper functions to record metrics

pub fn record_tx_submitted(chain_id: u64) {
    TX_SUBMITTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_outcome(chain_id: u64, state: SubmissionState) {
    TX_OUTCOMES
        .with_label_values(&[&chain_id.to_string(), &state.to_string()])
        .inc();
}

pub fn record_gas_band(band: GasBand) {
    GAS_LIMIT_BAND.with_label_values(&[band.as_str()]).inc();
}

pub fn record_tx_latency(chain_id: u64, latency_secs: f64) {
    TX_LATENCY
        .with_label_values(&[&chain_id.to_string()])
        .observe(latency_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_outcomes() {
        record_outcome(5_555, SubmissionState::TimedOut);
        record_gas_band(GasBand::Ceiling);

        let text = render().unwrap();
        assert!(text.contains("federator_transaction_outcomes_total"));
        assert!(text.contains("outcome=\"TIMED_OUT\""));
        assert!(text.contains("band=\"ceiling\""));
    }
}
