//! Solana cluster selection
//!
//! The cluster decides the default RPC endpoint and which network the wallet
//! SDK simulates dispatched transactions against.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Public RPC endpoints (rate limited, fine for demos)
mod public_rpcs {
    pub const DEVNET: &str = "https://api.devnet.solana.com";
    pub const TESTNET: &str = "https://api.testnet.solana.com";
    pub const MAINNET: &str = "https://api.mainnet-beta.solana.com";
}

/// Supported Solana clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
}

impl Cluster {
    pub fn name(&self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Cluster::Devnet => public_rpcs::DEVNET,
            Cluster::Testnet => public_rpcs::TESTNET,
            Cluster::MainnetBeta => public_rpcs::MAINNET,
        }
    }

    /// Explorer link for a submitted signature
    pub fn explorer_url(&self, signature: &str) -> String {
        self.solscan("tx", signature)
    }

    /// Explorer link for a wallet address
    pub fn account_url(&self, address: &str) -> String {
        self.solscan("account", address)
    }

    fn solscan(&self, section: &str, id: &str) -> String {
        match self {
            Cluster::MainnetBeta => format!("https://solscan.io/{}/{}", section, id),
            other => format!("https://solscan.io/{}/{}?cluster={}", section, id, other.name()),
        }
    }
}

impl FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet" | "mainnet-beta" => Ok(Cluster::MainnetBeta),
            other => Err(format!("Unknown cluster: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cluster_aliases() {
        assert_eq!("devnet".parse::<Cluster>().unwrap(), Cluster::Devnet);
        assert_eq!("Mainnet".parse::<Cluster>().unwrap(), Cluster::MainnetBeta);
        assert_eq!(
            "mainnet-beta".parse::<Cluster>().unwrap(),
            Cluster::MainnetBeta
        );
        assert!("localnet".parse::<Cluster>().is_err());
    }

    #[test]
    fn test_explorer_url_includes_cluster_off_mainnet() {
        assert_eq!(
            Cluster::Devnet.explorer_url("sig-xyz"),
            "https://solscan.io/tx/sig-xyz?cluster=devnet"
        );
        assert_eq!(
            Cluster::MainnetBeta.explorer_url("sig-xyz"),
            "https://solscan.io/tx/sig-xyz"
        );
    }

    #[test]
    fn test_account_url() {
        assert_eq!(
            Cluster::Testnet.account_url("ABC123"),
            "https://solscan.io/account/ABC123?cluster=testnet"
        );
    }
}
