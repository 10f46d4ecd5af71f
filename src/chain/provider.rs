//! Chain provider with multi-RPC support and automatic failover

use super::{ChainClient, ReceiptWait};
use crate::config::ChainConfig;
use crate::error::{RelayerError, RelayerResult};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, BlockNumber, Bytes, H256, U256};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    /// Chain name, for logs
    name: String,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
    /// Receipt polling interval
    poll_interval: Duration,
    /// Node wait window for receipts
    receipt_timeout: Duration,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(config: &ChainConfig, receipt_timeout: Duration) -> RelayerResult<Self> {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let mut http_providers = Vec::new();

        // Initialize HTTP providers
        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    http_providers.push(provider.interval(poll_interval));
                    debug!("Added HTTP provider for chain {}: {}", config.name, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(RelayerError::Config(format!(
                "No valid RPC providers for chain {}",
                config.name
            )));
        }

        info!(
            "Chain provider for {} initialized with {} endpoint(s)",
            config.name,
            http_providers.len()
        );

        Ok(Self {
            name: config.name.clone(),
            http_providers,
            current_provider: AtomicUsize::new(0),
            poll_interval,
            receipt_timeout,
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.name, next);
    }

    /// Run a read-only query, rotating through the endpoints on failure
    async fn with_failover<'a, T, F, Fut>(
        &'a self,
        method: &'static str,
        query: F,
    ) -> RelayerResult<T>
    where
        F: Fn(&'a Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;

        for _ in 0..self.http_providers.len() {
            match query(self.http()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("{} failed on chain {}: {}", method, self.name, e);
                    last_error = Some(e.to_string());
                    self.failover();
                }
            }
        }

        Err(RelayerError::Rpc {
            method,
            message: last_error.unwrap_or_else(|| "All providers failed".to_string()),
        })
    }
}

fn rpc_error(method: &'static str) -> impl Fn(ProviderError) -> RelayerError {
    move |e| RelayerError::Rpc {
        method,
        message: e.to_string(),
    }
}

#[async_trait]
impl ChainClient for ChainProvider {
    async fn chain_id(&self) -> RelayerResult<u64> {
        let chain_id = self
            .with_failover("eth_chainId", |p| p.get_chainid())
            .await?;
        Ok(chain_id.as_u64())
    }

    async fn accounts(&self) -> RelayerResult<Vec<Address>> {
        self.with_failover("eth_accounts", |p| p.get_accounts())
            .await
    }

    async fn pending_nonce(&self, address: Address) -> RelayerResult<U256> {
        let block = Some(BlockId::Number(BlockNumber::Pending));
        self.with_failover("eth_getTransactionCount", move |p| {
            p.get_transaction_count(address, block)
        })
        .await
    }

    async fn gas_price(&self) -> RelayerResult<U256> {
        self.with_failover("eth_gasPrice", |p| p.get_gas_price())
            .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> RelayerResult<U256> {
        self.with_failover("eth_estimateGas", |p| p.estimate_gas(tx, None))
            .await
    }

    async fn call_contract(&self, tx: &TypedTransaction) -> RelayerResult<Bytes> {
        self.with_failover("eth_call", |p| p.call(tx, None)).await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> RelayerResult<H256> {
        // Broadcasts are never replayed on another endpoint
        let pending = self
            .http()
            .send_raw_transaction(raw)
            .await
            .map_err(rpc_error("eth_sendRawTransaction"))?;
        Ok(pending.tx_hash())
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> RelayerResult<H256> {
        let pending = self
            .http()
            .send_transaction(tx, None)
            .await
            .map_err(rpc_error("eth_sendTransaction"))?;
        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> RelayerResult<ReceiptWait> {
        let result = timeout(self.receipt_timeout, async {
            let mut ticker = interval(self.poll_interval);

            loop {
                ticker.tick().await;

                match self.http().get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {
                        debug!("Transaction {:?} pending on chain {}", tx_hash, self.name);
                    }
                    Err(e) => {
                        warn!(
                            "Receipt query for {:?} failed on chain {}: {}",
                            tx_hash, self.name, e
                        );
                        self.failover();
                    }
                }
            }
        })
        .await;

        match result {
            Ok(receipt) => Ok(ReceiptWait::Mined(Box::new(receipt))),
            Err(_) => Ok(ReceiptWait::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_config(rpc_urls: Vec<&str>) -> ChainConfig {
        ChainConfig {
            name: "rsk-regtest".to_string(),
            rpc_urls: rpc_urls.into_iter().map(String::from).collect(),
            poll_interval_ms: 10,
        }
    }

    #[test]
    fn test_rejects_when_no_url_parses() {
        let config = chain_config(vec!["not a url"]);
        let err = ChainProvider::new(&config, Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, RelayerError::Config(_)));
    }

    #[test]
    fn test_failover_rotates_endpoints() {
        let config = chain_config(vec!["http://127.0.0.1:4444", "http://127.0.0.1:4445"]);
        let provider = ChainProvider::new(&config, Duration::from_secs(1)).unwrap();

        assert_eq!(provider.current_provider.load(Ordering::Relaxed), 0);
        provider.failover();
        assert_eq!(provider.current_provider.load(Ordering::Relaxed), 1);
        provider.failover();
        assert_eq!(provider.current_provider.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_rpc_error() {
        // Nothing listens on port 9 (discard) locally
        let config = chain_config(vec!["http://127.0.0.1:9"]);
        let provider = ChainProvider::new(&config, Duration::from_secs(1)).unwrap();

        let err = provider.chain_id().await.unwrap_err();
        assert!(matches!(
            err,
            RelayerError::Rpc {
                method: "eth_chainId",
                ..
            }
        ));
        assert!(err.is_retryable());
    }
}
