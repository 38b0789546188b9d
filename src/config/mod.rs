//! Configuration for the checkout session layer
//!
//! Defaults match the public LazorKit devnet deployment. A JSON file can
//! replace them wholesale and `LAZORPAY_*` environment variables override
//! individual endpoints on top.

pub mod cluster;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::audit::AuditLog;
use crate::sdk::SdkSettings;
use crate::{Error, Result};

pub use cluster::Cluster;

/// Environment variable names
pub mod env_vars {
    pub const CLUSTER: &str = "LAZORPAY_CLUSTER";
    pub const RPC_URL: &str = "LAZORPAY_RPC_URL";
    pub const PORTAL_URL: &str = "LAZORPAY_PORTAL_URL";
    pub const PAYMASTER_URL: &str = "LAZORPAY_PAYMASTER_URL";
    pub const STORAGE_DIR: &str = "LAZORPAY_STORAGE_DIR";
}

/// Key under which the wallet identity is persisted
pub const WALLET_INFO_KEY: &str = "lazor_wallet_info";

pub const DEFAULT_PORTAL_URL: &str = "https://portal.lazor.sh";
pub const DEFAULT_PAYMASTER_URL: &str = "https://kora.devnet.lazorkit.com";

/// Paymaster (fee sponsor) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymasterConfig {
    /// Kora paymaster endpoint that co-signs sponsored transactions
    pub url: String,
    /// Token the paymaster charges in, if any (e.g. "USDC")
    #[serde(default)]
    pub fee_token: Option<String>,
}

impl Default for PaymasterConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PAYMASTER_URL.to_string(),
            fee_token: None,
        }
    }
}

/// Where the session record lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON file per origin
    pub dir: PathBuf,
    /// Application origin; names the storage file
    pub origin: String,
    /// Key the identity record is stored under
    #[serde(default = "default_wallet_key")]
    pub key: String,
}

fn default_wallet_key() -> String {
    WALLET_INFO_KEY.to_string()
}

impl StorageConfig {
    /// Full path of the origin's storage file
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.origin))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("lazorpay"),
            origin: "lazorpay.vercel.app".to_string(),
            key: default_wallet_key(),
        }
    }
}

/// Transaction defaults applied by the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDefaults {
    /// Compute unit limit requested for every dispatched transaction
    pub compute_unit_limit: Option<u32>,
}

impl Default for TransactionDefaults {
    fn default() -> Self {
        Self {
            compute_unit_limit: Some(200_000),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cluster the wallet lives on
    pub cluster: Cluster,
    /// RPC endpoint; defaults to the cluster's public endpoint
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Passkey portal that hosts the biometric prompt
    pub portal_url: String,
    #[serde(default)]
    pub paymaster: PaymasterConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub transaction: TransactionDefaults,
    /// Background session re-check interval (milliseconds, 0 disables)
    pub refresh_interval_ms: u64,
    /// Path to the activity log file (JSONL)
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: Cluster::Devnet,
            rpc_url: None,
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            paymaster: PaymasterConfig::default(),
            storage: StorageConfig::default(),
            transaction: TransactionDefaults::default(),
            refresh_interval_ms: 5_000,
            audit_log_path: None,
        }
    }
}

impl Config {
    /// Read a JSON config file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Apply `LAZORPAY_*` environment overrides
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(cluster) = std::env::var(env_vars::CLUSTER) {
            self.cluster = cluster.parse().map_err(Error::Config)?;
            tracing::debug!(cluster = self.cluster.name(), "Using LAZORPAY_CLUSTER");
        }
        if let Ok(url) = std::env::var(env_vars::RPC_URL) {
            tracing::debug!("Using LAZORPAY_RPC_URL");
            self.rpc_url = Some(url);
        }
        if let Ok(url) = std::env::var(env_vars::PORTAL_URL) {
            tracing::debug!("Using LAZORPAY_PORTAL_URL");
            self.portal_url = url;
        }
        if let Ok(url) = std::env::var(env_vars::PAYMASTER_URL) {
            tracing::debug!("Using LAZORPAY_PAYMASTER_URL");
            self.paymaster.url = url;
        }
        if let Ok(dir) = std::env::var(env_vars::STORAGE_DIR) {
            tracing::debug!("Using LAZORPAY_STORAGE_DIR");
            self.storage.dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    /// Check that every endpoint parses as a URL and the storage names are usable
    pub fn validate(&self) -> Result<()> {
        check_url("rpc_url", self.rpc_url())?;
        check_url("portal_url", &self.portal_url)?;
        check_url("paymaster.url", &self.paymaster.url)?;

        if self.storage.key.trim().is_empty() {
            return Err(Error::Config("storage.key must not be empty".to_string()));
        }
        if self.storage.origin.trim().is_empty()
            || self.storage.origin.contains(|c| c == '/' || c == '\\')
        {
            return Err(Error::Config(format!(
                "storage.origin must be a bare host name, got {:?}",
                self.storage.origin
            )));
        }
        Ok(())
    }

    /// Effective RPC endpoint
    pub fn rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.cluster.default_rpc_url())
    }

    /// Endpoints a [`WalletSdk`](crate::sdk::WalletSdk) implementation connects with
    pub fn sdk_settings(&self) -> SdkSettings {
        SdkSettings {
            cluster: self.cluster,
            rpc_url: self.rpc_url().to_string(),
            portal_url: self.portal_url.clone(),
            paymaster_url: self.paymaster.url.clone(),
        }
    }

    /// Activity log at `audit_log_path`, if one is configured
    pub fn audit_log(&self) -> Option<AuditLog> {
        self.audit_log_path.as_deref().map(AuditLog::new)
    }

    /// Background refresh interval, if enabled
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_ms > 0).then(|| Duration::from_millis(self.refresh_interval_ms))
    }
}

fn check_url(field: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("{} is not a valid URL ({}): {}", field, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_devnet_deployment() {
        let config = Config::default();
        assert_eq!(config.cluster, Cluster::Devnet);
        assert_eq!(config.rpc_url(), "https://api.devnet.solana.com");
        assert_eq!(config.paymaster.url, DEFAULT_PAYMASTER_URL);
        assert_eq!(config.storage.key, WALLET_INFO_KEY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let value = serde_json::json!({
            "cluster": "mainnet-beta",
            "portal_url": "https://portal.lazor.sh",
            "refresh_interval_ms": 0
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(parsed.cluster, Cluster::MainnetBeta);
        assert_eq!(parsed.rpc_url(), "https://api.mainnet-beta.solana.com");
        assert_eq!(parsed.storage.key, WALLET_INFO_KEY);
        assert!(parsed.refresh_interval().is_none());
        assert!(parsed.paymaster.fee_token.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.paymaster.url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("paymaster.url"));
    }

    #[test]
    fn test_validate_rejects_path_like_origin() {
        let mut config = Config::default();
        config.storage.origin = "../escape".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_file_path_uses_origin() {
        let storage = StorageConfig {
            dir: PathBuf::from("/tmp/lp"),
            origin: "shop.example".to_string(),
            key: WALLET_INFO_KEY.to_string(),
        };
        assert_eq!(storage.file_path(), PathBuf::from("/tmp/lp/shop.example.json"));
    }

    #[test]
    fn test_sdk_settings_follow_overrides() {
        let mut config = Config::default();
        config.cluster = Cluster::Testnet;
        config.paymaster.url = "https://kora.example".to_string();

        let settings = config.sdk_settings();
        assert_eq!(settings.rpc_url, "https://api.testnet.solana.com");
        assert_eq!(settings.portal_url, DEFAULT_PORTAL_URL);
        assert_eq!(settings.paymaster_url, "https://kora.example");
    }

    #[test]
    fn test_audit_log_only_when_configured() {
        let mut config = Config::default();
        assert!(config.audit_log().is_none());

        config.audit_log_path = Some("/tmp/lazorpay-audit.jsonl".to_string());
        assert!(config.audit_log().is_some());
    }
}
