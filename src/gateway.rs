//! Authentication gateway
//!
//! Wraps the SDK's connect/disconnect calls and turns their results into
//! session changes. Cancellations are a normal user choice and end quietly;
//! "already connected" drift is healed by re-reading the session instead of
//! failing.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use crate::audit::{AuditEntry, AuditLog};
use crate::config::Config;
use crate::error::ErrorKind;
use crate::identity::WalletIdentity;
use crate::sdk::{ConnectOptions, FeeMode, WalletSdk};
use crate::session::SessionReconciler;
use crate::{Error, Result};

/// How a `connect_auth` call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The SDK returned a wallet and it was committed
    Connected(WalletIdentity),
    /// No usable payload (or drift); the session was re-read instead
    Reconciled(Option<WalletIdentity>),
    /// The user dismissed the passkey prompt
    Cancelled,
}

pub struct AuthGateway {
    sdk: Arc<dyn WalletSdk>,
    reconciler: Arc<SessionReconciler>,
    audit: Option<AuditLog>,
}

impl AuthGateway {
    pub fn new(sdk: Arc<dyn WalletSdk>, reconciler: Arc<SessionReconciler>) -> Self {
        Self {
            sdk,
            reconciler,
            audit: None,
        }
    }

    /// Gateway writing to the configured activity log, if any
    pub fn from_config(
        sdk: Arc<dyn WalletSdk>,
        reconciler: Arc<SessionReconciler>,
        config: &Config,
    ) -> Self {
        Self {
            sdk,
            reconciler,
            audit: config.audit_log(),
        }
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Run the passkey connect flow with fee sponsorship preferred
    pub async fn connect_auth(&self) -> Result<ConnectOutcome> {
        let started = Instant::now();
        tracing::info!("Initiating passkey handshake");

        let options = ConnectOptions {
            fee_mode: FeeMode::Paymaster,
        };

        let outcome = match self.sdk.connect(options).await {
            Ok(payload) => match payload.as_ref().and_then(WalletIdentity::from_payload) {
                Some(identity) => {
                    self.reconciler.commit(identity.clone());
                    tracing::info!(wallet = %identity.wallet_address, "Passkey verified");
                    ConnectOutcome::Connected(identity)
                }
                None => {
                    tracing::warn!("Connect resolved without a wallet, re-reading session");
                    self.reconciler.refresh();
                    ConnectOutcome::Reconciled(self.reconciler.identity())
                }
            },
            Err(e) => match ErrorKind::classify(&e.message) {
                ErrorKind::UserCancelled => {
                    tracing::info!(reason = %e.message, "Passkey prompt cancelled");
                    ConnectOutcome::Cancelled
                }
                ErrorKind::StateDrift => {
                    tracing::warn!(reason = %e.message, "SDK already connected, re-reading session");
                    self.reconciler.refresh();
                    ConnectOutcome::Reconciled(self.reconciler.identity())
                }
                kind => {
                    tracing::error!(%kind, error = %e.message, "Passkey connect failed");
                    self.log(
                        AuditEntry::new("connect", "error")
                            .error(e.message.clone())
                            .detail(json!({ "kind": kind }))
                            .duration(started.elapsed()),
                    )
                    .await;
                    return Err(Error::Auth {
                        kind,
                        message: e.message,
                    });
                }
            },
        };

        let mut entry = AuditEntry::new("connect", outcome_status(&outcome))
            .duration(started.elapsed());
        if let Some(identity) = outcome_identity(&outcome) {
            entry = entry.wallet(identity.wallet_address.clone());
        }
        self.log(entry).await;

        Ok(outcome)
    }

    /// Disconnect the SDK (best effort) and always clear the session
    pub async fn disconnect_auth(&self) {
        let wallet = self.reconciler.identity().map(|i| i.wallet_address);

        if let Err(e) = self.sdk.disconnect().await {
            tracing::warn!(error = %e.message, "SDK disconnect failed, clearing session anyway");
        }
        self.reconciler.reset();

        let mut entry = AuditEntry::new("disconnect", "success");
        if let Some(wallet) = wallet {
            entry = entry.wallet(wallet);
        }
        self.log(entry).await;
    }

    pub fn reconciler(&self) -> &Arc<SessionReconciler> {
        &self.reconciler
    }

    async fn log(&self, entry: AuditEntry) {
        if let Some(audit) = &self.audit {
            audit.record(entry).await;
        }
    }
}

fn outcome_status(outcome: &ConnectOutcome) -> &'static str {
    match outcome {
        ConnectOutcome::Connected(_) => "success",
        ConnectOutcome::Reconciled(_) => "reconciled",
        ConnectOutcome::Cancelled => "cancelled",
    }
}

fn outcome_identity(outcome: &ConnectOutcome) -> Option<&WalletIdentity> {
    match outcome {
        ConnectOutcome::Connected(identity) => Some(identity),
        ConnectOutcome::Reconciled(identity) => identity.as_ref(),
        ConnectOutcome::Cancelled => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::Notifier;
    use crate::sdk::{ConnectPayload, SdkError, SignPayload};
    use crate::session::SessionState;
    use crate::store::{IdentityStore, MemoryMedium};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// SDK stub replaying a fixed connect result
    struct StubSdk {
        connect: Mutex<Option<std::result::Result<Option<ConnectPayload>, SdkError>>>,
        disconnect_fails: bool,
        options_seen: Mutex<Option<ConnectOptions>>,
    }

    impl StubSdk {
        fn connecting(result: std::result::Result<Option<ConnectPayload>, SdkError>) -> Arc<Self> {
            Arc::new(Self {
                connect: Mutex::new(Some(result)),
                disconnect_fails: false,
                options_seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl WalletSdk for StubSdk {
        async fn connect(
            &self,
            options: ConnectOptions,
        ) -> std::result::Result<Option<ConnectPayload>, SdkError> {
            *self.options_seen.lock().unwrap() = Some(options);
            self.connect.lock().unwrap().take().unwrap_or(Ok(None))
        }

        async fn disconnect(&self) -> std::result::Result<(), SdkError> {
            if self.disconnect_fails {
                Err(SdkError::new("portal unreachable"))
            } else {
                Ok(())
            }
        }

        async fn sign_and_submit(&self, _payload: SignPayload) -> std::result::Result<String, SdkError> {
            Err(SdkError::new("not used"))
        }
    }

    fn payload(address: &str) -> ConnectPayload {
        ConnectPayload {
            smart_wallet: Some(address.to_string()),
            credential_id: Some("cred-1".to_string()),
            passkey_pubkey: None,
            wallet_device: None,
        }
    }

    fn mounted(medium: &MemoryMedium) -> Arc<SessionReconciler> {
        let reconciler = SessionReconciler::new(
            IdentityStore::new(Arc::new(medium.clone())),
            Notifier::local(),
        );
        reconciler.mount();
        reconciler
    }

    #[tokio::test]
    async fn test_connect_commits_identity() {
        let medium = MemoryMedium::new();
        let sdk = StubSdk::connecting(Ok(Some(payload("ABC123"))));
        let gateway = AuthGateway::new(sdk.clone(), mounted(&medium));

        let outcome = gateway.connect_auth().await.unwrap();
        let expected = WalletIdentity::new("ABC123", "cred-1", "", "web");
        assert_eq!(outcome, ConnectOutcome::Connected(expected.clone()));
        assert_eq!(gateway.reconciler().identity(), Some(expected.clone()));
        assert_eq!(gateway.reconciler().store().load(), Some(expected));
        assert_eq!(
            sdk.options_seen.lock().unwrap().clone().unwrap().fee_mode,
            FeeMode::Paymaster
        );
    }

    #[tokio::test]
    async fn test_cancellation_is_silent() {
        let medium = MemoryMedium::new();
        let reconciler = mounted(&medium);
        let mut rx = reconciler.subscribe_state();
        let sdk = StubSdk::connecting(Err(SdkError::new(
            "NotAllowedError: The operation either timed out or was not allowed",
        )));
        let gateway = AuthGateway::new(sdk, reconciler.clone());

        let outcome = gateway.connect_auth().await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Cancelled);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(reconciler.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_other_errors_surface_without_state_change() {
        let medium = MemoryMedium::new();
        let reconciler = mounted(&medium);
        let sdk = StubSdk::connecting(Err(SdkError::new("portal returned 502")));
        let gateway = AuthGateway::new(sdk, reconciler.clone());

        let err = gateway.connect_auth().await.unwrap_err();
        match err {
            Error::Auth { kind, message } => {
                assert_eq!(kind, ErrorKind::Unknown);
                assert_eq!(message, "portal returned 502");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(reconciler.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_missing_payload_falls_back_to_refresh() {
        let medium = MemoryMedium::new();
        let reconciler = mounted(&medium);
        // the SDK recorded the session through its own storage
        IdentityStore::new(Arc::new(medium.clone()))
            .save(&WalletIdentity::new("ABC123", "cred-1", "", "web"))
            .unwrap();
        let gateway = AuthGateway::new(StubSdk::connecting(Ok(None)), reconciler.clone());

        let outcome = gateway.connect_auth().await.unwrap();
        assert!(matches!(outcome, ConnectOutcome::Reconciled(Some(_))));
        assert!(reconciler.is_connected());
    }

    #[tokio::test]
    async fn test_already_connected_refreshes_instead_of_failing() {
        let medium = MemoryMedium::new();
        let reconciler = mounted(&medium);
        IdentityStore::new(Arc::new(medium.clone()))
            .save(&WalletIdentity::new("ABC123", "cred-1", "", "web"))
            .unwrap();
        let sdk = StubSdk::connecting(Err(SdkError::new("Wallet already connected")));
        let gateway = AuthGateway::new(sdk, reconciler.clone());

        let outcome = gateway.connect_auth().await.unwrap();
        assert_eq!(
            outcome,
            ConnectOutcome::Reconciled(Some(WalletIdentity::new("ABC123", "cred-1", "", "web")))
        );
    }

    #[tokio::test]
    async fn test_disconnect_resets_even_when_sdk_fails() {
        let medium = MemoryMedium::new();
        let reconciler = mounted(&medium);
        reconciler.commit(WalletIdentity::new("ABC123", "cred-1", "", "web"));
        let sdk = Arc::new(StubSdk {
            connect: Mutex::new(None),
            disconnect_fails: true,
            options_seen: Mutex::new(None),
        });
        let gateway = AuthGateway::new(sdk, reconciler.clone());

        gateway.disconnect_auth().await;
        assert_eq!(reconciler.state(), SessionState::Unauthenticated);
        assert!(reconciler.store().load().is_none());

        // nothing held: still safe
        gateway.disconnect_auth().await;
    }

    #[tokio::test]
    async fn test_connect_is_logged() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            audit_log_path: Some(temp_file.path().display().to_string()),
            ..Config::default()
        };
        let medium = MemoryMedium::new();
        let gateway = AuthGateway::from_config(
            StubSdk::connecting(Ok(Some(payload("ABC123")))),
            mounted(&medium),
            &config,
        );

        gateway.connect_auth().await.unwrap();
        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("\"entry_type\":\"connect\""));
        assert!(content.contains("ABC123"));
    }
}
