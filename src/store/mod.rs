//! Persisted identity store
//!
//! The last connected wallet identity lives under one well-known key in a
//! synchronous key/value medium shared by every context of an origin. The
//! record survives restarts until it is cleared explicitly.

mod file;
mod memory;

pub use file::FileMedium;
pub use memory::MemoryMedium;

use std::sync::Arc;

use crate::config::WALLET_INFO_KEY;
use crate::identity::WalletIdentity;
use crate::Result;

/// Durable, synchronous string key/value storage scoped to one origin
pub trait KeyValueMedium: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Load/save/clear of the wallet identity record
#[derive(Clone)]
pub struct IdentityStore {
    medium: Arc<dyn KeyValueMedium>,
    key: String,
}

impl IdentityStore {
    pub fn new(medium: Arc<dyn KeyValueMedium>) -> Self {
        Self::with_key(medium, WALLET_INFO_KEY)
    }

    pub fn with_key(medium: Arc<dyn KeyValueMedium>, key: impl Into<String>) -> Self {
        Self {
            medium,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last saved identity. Absent, unreadable or malformed data is `None`.
    pub fn load(&self) -> Option<WalletIdentity> {
        let raw = match self.medium.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read stored session");
                return None;
            }
        };

        let identity = WalletIdentity::from_record(&raw);
        if identity.is_none() {
            tracing::warn!(key = %self.key, "Ignoring malformed stored session");
        }
        identity
    }

    /// Replace the stored record with `identity`
    pub fn save(&self, identity: &WalletIdentity) -> Result<()> {
        let raw = serde_json::to_string(identity)?;
        self.medium.set(&self.key, &raw)?;
        tracing::debug!(wallet = %identity.wallet_address, "Session saved");
        Ok(())
    }

    /// Remove the record entirely
    pub fn clear(&self) -> Result<()> {
        self.medium.remove(&self.key)?;
        tracing::debug!(key = %self.key, "Session cleared");
        Ok(())
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
