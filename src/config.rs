//! Configuration management for the federator transaction sender
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable pointing at the configuration file
pub const CONFIG_ENV_VAR: &str = "FEDERATOR_CONFIG";

/// File name of the manually-check log inside the storage directory
pub const MANUAL_CHECK_FILE_NAME: &str = "manuallyCheck.txt";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub chain: ChainConfig,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub gas_oracle: GasOracleConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub federation: Option<FederationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub rpc_urls: Vec<String>,
    /// Receipt polling interval while waiting for a transaction to be mined
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    /// Directory holding the manually-check log
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Explicit manually-check log path, overrides `storage_path`
    pub manual_check_file: Option<PathBuf>,
    /// How long to wait for a receipt before handing the transaction to an operator
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default)]
    pub gas_limit: GasLimitConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GasLimitConfig {
    /// Estimates below this use it as the limit
    #[serde(default = "default_gas_limit_minimum")]
    pub minimum: u64,
    /// Limit used for every estimate at or above `minimum`
    #[serde(default = "default_gas_limit_ceiling")]
    pub ceiling: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GasOracleConfig {
    /// Percentage added on top of the node's gas price
    #[serde(default)]
    pub buffer_percent: u64,
    /// Lowest gas price ever used, in wei
    pub min_gas_price_wei: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the hex private key.
    /// When unset or empty the node signs with its first unlocked account.
    pub private_key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    pub address: String,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_receipt_timeout_secs() -> u64 {
    750
}

fn default_gas_limit_minimum() -> u64 {
    300_000
}

fn default_gas_limit_ceiling() -> u64 {
    3_500_000
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            manual_check_file: None,
            receipt_timeout_secs: default_receipt_timeout_secs(),
            gas_limit: GasLimitConfig::default(),
        }
    }
}

impl Default for GasLimitConfig {
    fn default() -> Self {
        Self {
            minimum: default_gas_limit_minimum(),
            ceiling: default_gas_limit_ceiling(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl SenderConfig {
    /// Resolved location of the manually-check log
    pub fn manual_check_path(&self) -> PathBuf {
        self.manual_check_file
            .clone()
            .unwrap_or_else(|| self.storage_path.join(MANUAL_CHECK_FILE_NAME))
    }
}

impl WalletConfig {
    /// Read the private key from the configured environment variable
    pub fn private_key(&self) -> Option<String> {
        let var = self.private_key_env.as_deref()?;
        env::var(var).ok().filter(|key| !key.trim().is_empty())
    }
}

impl Settings {
    /// Load settings from the file named by `FEDERATOR_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.chain.rpc_urls.is_empty() {
            anyhow::bail!("Chain {} has no RPC URLs configured", self.chain.name);
        }

        let gas = &self.sender.gas_limit;
        if gas.minimum > gas.ceiling {
            anyhow::bail!(
                "Gas limit minimum {} is above the ceiling {}",
                gas.minimum,
                gas.ceiling
            );
        }

        if self.sender.receipt_timeout_secs == 0 {
            anyhow::bail!("receipt_timeout_secs must be positive");
        }

        if self.wallet.private_key_env.is_none() {
            tracing::warn!("No private key configured - transactions will be signed by the node");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [chain]
        name = "rsk-testnet"
        rpc_urls = ["http://localhost:4444"]
    "#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("FEDERATOR_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${FEDERATOR_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::parse(MINIMAL).unwrap();
        assert_eq!(settings.chain.poll_interval_ms, 1_000);
        assert_eq!(settings.sender.receipt_timeout_secs, 750);
        assert_eq!(settings.sender.gas_limit.minimum, 300_000);
        assert_eq!(settings.sender.gas_limit.ceiling, 3_500_000);
        assert_eq!(
            settings.sender.manual_check_path(),
            PathBuf::from("./manuallyCheck.txt")
        );
        assert!(!settings.metrics.enabled);
        assert!(settings.federation.is_none());
    }

    #[test]
    fn test_manual_check_override() {
        let settings = Settings::parse(
            r#"
            [chain]
            name = "rsk"
            rpc_urls = ["http://localhost:4444"]

            [sender]
            storage_path = "/var/lib/federator"
            manual_check_file = "/tmp/stuck.txt"
            "#,
        )
        .unwrap();
        assert_eq!(
            settings.sender.manual_check_path(),
            PathBuf::from("/tmp/stuck.txt")
        );
    }

    #[test]
    fn test_rejects_inverted_gas_bands() {
        let err = Settings::parse(
            r#"
            [chain]
            name = "rsk"
            rpc_urls = ["http://localhost:4444"]

            [sender.gas_limit]
            minimum = 4000000
            ceiling = 3500000
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("above the ceiling"));
    }

    #[test]
    fn test_rejects_missing_rpc_urls() {
        let err = Settings::parse(
            r#"
            [chain]
            name = "rsk"
            rpc_urls = []
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no RPC URLs"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.chain.name, "rsk-testnet");
    }

    #[test]
    fn test_private_key_from_env() {
        env::set_var("FEDERATOR_TEST_KEY", "0xabc");
        let wallet = WalletConfig {
            private_key_env: Some("FEDERATOR_TEST_KEY".to_string()),
        };
        assert_eq!(wallet.private_key().as_deref(), Some("0xabc"));

        env::set_var("FEDERATOR_TEST_EMPTY_KEY", "  ");
        let wallet = WalletConfig {
            private_key_env: Some("FEDERATOR_TEST_EMPTY_KEY".to_string()),
        };
        assert!(wallet.private_key().is_none());
        assert!(WalletConfig::default().private_key().is_none());
    }
}
