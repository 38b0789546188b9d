//! Seam to the external passkey wallet SDK
//!
//! The SDK owns the biometric prompt, the smart wallet program and the
//! paymaster handshake. This crate only depends on the shape below; tests
//! and embedders supply their own implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Cluster;

/// Error raised by the SDK. Only the message is meaningful; it is classified
/// with [`crate::ErrorKind::classify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SdkError {
    pub message: String,
}

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for SdkError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for SdkError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// Who pays network fees by default for the connected wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeeMode {
    /// Paymaster sponsors fees (gasless)
    #[default]
    Paymaster,
    /// Wallet pays its own fees
    User,
}

/// Options passed to `connect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    pub fee_mode: FeeMode,
}

/// What `connect` resolves with. Every field is optional because the SDK
/// has been seen resolving with partial or empty payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayload {
    #[serde(default)]
    pub smart_wallet: Option<String>,
    #[serde(default)]
    pub credential_id: Option<String>,
    /// Raw public key as the SDK reports it (byte array, base64 string, ...)
    #[serde(default)]
    pub passkey_pubkey: Option<Value>,
    #[serde(default)]
    pub wallet_device: Option<String>,
}

/// One caller-built instruction, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(pub Value);

impl Operation {
    pub fn new(value: Value) -> Self {
        Self(value)
    }
}

impl From<Value> for Operation {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Operation> for Value {
    fn from(op: Operation) -> Self {
        op.0
    }
}

/// Network the SDK simulates the transaction against before sending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSimulation {
    Devnet,
    Mainnet,
}

/// Fee payer for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FeePayer {
    /// Paymaster at `url` co-signs and pays
    Paymaster { url: String },
    /// The smart wallet at `address` pays
    User { address: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOptions {
    pub cluster_simulation: ClusterSimulation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_unit_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_token: Option<String>,
}

/// Payload for `sign_and_submit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    pub instructions: Vec<Operation>,
    pub transaction_options: TransactionOptions,
    pub fee_payer: FeePayer,
}

/// Endpoints an SDK implementation is constructed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkSettings {
    pub cluster: Cluster,
    pub rpc_url: String,
    /// Passkey portal hosting the biometric prompt
    pub portal_url: String,
    pub paymaster_url: String,
}

/// The external passkey wallet SDK
#[async_trait]
pub trait WalletSdk: Send + Sync {
    /// Run the passkey prompt and connect a smart wallet.
    ///
    /// `Ok(None)` means the SDK resolved without a payload; it may still have
    /// recorded the session through its own storage.
    async fn connect(&self, options: ConnectOptions) -> Result<Option<ConnectPayload>, SdkError>;

    async fn disconnect(&self) -> Result<(), SdkError>;

    /// Sign with the passkey and broadcast. Returns the transaction signature.
    async fn sign_and_submit(&self, payload: SignPayload) -> Result<String, SdkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_payload_wire_shape() {
        let payload = SignPayload {
            instructions: vec![Operation::new(json!({"programId": "11111111111111111111111111111111"}))],
            transaction_options: TransactionOptions {
                cluster_simulation: ClusterSimulation::Devnet,
                compute_unit_limit: Some(200_000),
                fee_token: None,
            },
            fee_payer: FeePayer::Paymaster {
                url: "https://kora.devnet.lazorkit.com".to_string(),
            },
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "instructions": [{"programId": "11111111111111111111111111111111"}],
                "transactionOptions": {
                    "clusterSimulation": "devnet",
                    "computeUnitLimit": 200000
                },
                "feePayer": {"kind": "paymaster", "url": "https://kora.devnet.lazorkit.com"}
            })
        );
    }

    #[test]
    fn test_connect_payload_accepts_partial_json() {
        let payload: ConnectPayload =
            serde_json::from_value(json!({"smartWallet": "ABC123"})).unwrap();
        assert_eq!(payload.smart_wallet.as_deref(), Some("ABC123"));
        assert!(payload.credential_id.is_none());
        assert!(payload.passkey_pubkey.is_none());
    }

    #[test]
    fn test_connect_options_default_to_paymaster() {
        let value = serde_json::to_value(ConnectOptions::default()).unwrap();
        assert_eq!(value, json!({"feeMode": "paymaster"}));
    }
}
