//! Wallet identity produced by a successful passkey connect

use serde::{Deserialize, Serialize};

use crate::sdk::ConnectPayload;

pub const DEFAULT_DEVICE_CLASS: &str = "web";

/// One authenticated end-user binding.
///
/// Serialized with the field names the web checkout stores, so a record
/// written by either client loads in the other. Equality for reconciliation
/// purposes is by `wallet_address` only (see [`WalletIdentity::same_wallet`]);
/// `PartialEq` compares every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletIdentity {
    /// Credential handle issued by the passkey provider
    #[serde(rename = "credentialId", default)]
    pub credential_id: String,
    /// Serialized passkey public key (empty if the provider omitted it)
    #[serde(rename = "passkeyPubkey", default)]
    pub public_key_material: String,
    /// Smart wallet address on Solana
    #[serde(rename = "smartWallet")]
    pub wallet_address: String,
    /// Originating platform, informational only
    #[serde(rename = "walletDevice", default = "default_device_class")]
    pub device_class: String,
}

fn default_device_class() -> String {
    DEFAULT_DEVICE_CLASS.to_string()
}

impl WalletIdentity {
    pub fn new(
        wallet_address: impl Into<String>,
        credential_id: impl Into<String>,
        public_key_material: impl Into<String>,
        device_class: impl Into<String>,
    ) -> Self {
        Self {
            credential_id: credential_id.into(),
            public_key_material: public_key_material.into(),
            wallet_address: wallet_address.into(),
            device_class: device_class.into(),
        }
    }

    /// Build an identity from a connect payload.
    ///
    /// Returns `None` when the payload carries no wallet address.
    pub fn from_payload(payload: &ConnectPayload) -> Option<Self> {
        let wallet_address = payload
            .smart_wallet
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())?;

        let public_key_material = match &payload.passkey_pubkey {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Some(Self {
            credential_id: payload.credential_id.clone().unwrap_or_default(),
            public_key_material,
            wallet_address: wallet_address.to_string(),
            device_class: payload
                .wallet_device
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(default_device_class),
        })
    }

    /// Parse a persisted record; `None` if malformed or missing the address
    pub fn from_record(raw: &str) -> Option<Self> {
        serde_json::from_str::<Self>(raw)
            .ok()
            .filter(|identity| !identity.wallet_address.trim().is_empty())
    }

    /// Identities name the same wallet
    pub fn same_wallet(&self, other: &WalletIdentity) -> bool {
        self.wallet_address == other.wallet_address
    }

    /// Shortened address for display, e.g. `FvyY…GSiy`
    pub fn short_address(&self) -> String {
        let addr = &self.wallet_address;
        if addr.chars().count() <= 10 {
            return addr.clone();
        }
        let head: String = addr.chars().take(4).collect();
        let tail: String = addr
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}…{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_uses_web_field_names() {
        let identity = WalletIdentity::new("ABC123", "cred-1", "", "web");
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(
            value,
            json!({
                "credentialId": "cred-1",
                "passkeyPubkey": "",
                "smartWallet": "ABC123",
                "walletDevice": "web"
            })
        );
    }

    #[test]
    fn test_from_record_fills_optional_fields() {
        let identity = WalletIdentity::from_record(r#"{"smartWallet":"ABC123"}"#).unwrap();
        assert_eq!(identity.wallet_address, "ABC123");
        assert_eq!(identity.credential_id, "");
        assert_eq!(identity.device_class, "web");
    }

    #[test]
    fn test_from_record_rejects_malformed() {
        assert!(WalletIdentity::from_record("not json").is_none());
        assert!(WalletIdentity::from_record(r#"{"credentialId":"x"}"#).is_none());
        assert!(WalletIdentity::from_record(r#"{"smartWallet":"  "}"#).is_none());
        assert!(WalletIdentity::from_record("null").is_none());
    }

    #[test]
    fn test_from_payload_serializes_pubkey() {
        let payload = ConnectPayload {
            smart_wallet: Some("ABC123".to_string()),
            credential_id: None,
            passkey_pubkey: Some(json!([2, 17, 255])),
            wallet_device: None,
        };
        let identity = WalletIdentity::from_payload(&payload).unwrap();
        assert_eq!(identity.public_key_material, "[2,17,255]");
        assert_eq!(identity.credential_id, "");
        assert_eq!(identity.device_class, "web");
    }

    #[test]
    fn test_from_payload_requires_address() {
        let payload = ConnectPayload {
            smart_wallet: Some(String::new()),
            ..ConnectPayload::default()
        };
        assert!(WalletIdentity::from_payload(&payload).is_none());
        assert!(WalletIdentity::from_payload(&ConnectPayload::default()).is_none());
    }

    #[test]
    fn test_same_wallet_ignores_other_fields() {
        let a = WalletIdentity::new("ABC123", "cred-1", "", "web");
        let b = WalletIdentity::new("ABC123", "cred-2", "pk", "ios");
        assert!(a.same_wallet(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_address() {
        let identity = WalletIdentity::new(
            "FvyYz9tqnCmG4XYrRKFG4fCrsUwK7T3KJsd97MFWGSiy",
            "",
            "",
            "web",
        );
        assert_eq!(identity.short_address(), "FvyY…GSiy");
        assert_eq!(
            WalletIdentity::new("ABC123", "", "", "web").short_address(),
            "ABC123"
        );
    }
}
