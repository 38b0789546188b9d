//! Transaction dispatch
//!
//! Turns caller-built operations into one signed submission through the SDK,
//! using the identity the session reconciler currently holds. Failures come
//! back as data, classified, and are never retried here.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditEntry, AuditLog};
use crate::config::{Config, PaymasterConfig, TransactionDefaults};
use crate::error::ErrorKind;
use crate::sdk::{ClusterSimulation, FeePayer, Operation, SignPayload, TransactionOptions, WalletSdk};
use crate::session::SessionReconciler;

/// Network the SDK simulates against before sending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationTarget {
    Production,
    TestnetSimulation,
}

impl SimulationTarget {
    fn cluster_simulation(self) -> ClusterSimulation {
        match self {
            SimulationTarget::Production => ClusterSimulation::Mainnet,
            SimulationTarget::TestnetSimulation => ClusterSimulation::Devnet,
        }
    }
}

/// One transaction to sign and submit. Consumed by [`TransactionDispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    operations: Vec<Operation>,
    sponsorship_requested: bool,
    simulation_target: SimulationTarget,
}

impl DispatchRequest {
    pub fn new(
        operations: Vec<Operation>,
        sponsorship_requested: bool,
        simulation_target: SimulationTarget,
    ) -> Self {
        Self {
            operations,
            sponsorship_requested,
            simulation_target,
        }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn sponsorship_requested(&self) -> bool {
        self.sponsorship_requested
    }

    pub fn simulation_target(&self) -> SimulationTarget {
        self.simulation_target
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchResult {
    Success { signature_id: String },
    Failure { kind: ErrorKind, message: String },
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success { .. })
    }

    pub fn signature_id(&self) -> Option<&str> {
        match self {
            DispatchResult::Success { signature_id } => Some(signature_id),
            DispatchResult::Failure { .. } => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DispatchResult::Success { .. } => None,
            DispatchResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

pub struct TransactionDispatcher {
    sdk: Arc<dyn WalletSdk>,
    reconciler: Arc<SessionReconciler>,
    paymaster: PaymasterConfig,
    defaults: TransactionDefaults,
    audit: Option<AuditLog>,
}

impl TransactionDispatcher {
    pub fn new(
        sdk: Arc<dyn WalletSdk>,
        reconciler: Arc<SessionReconciler>,
        paymaster: PaymasterConfig,
        defaults: TransactionDefaults,
    ) -> Self {
        Self {
            sdk,
            reconciler,
            paymaster,
            defaults,
            audit: None,
        }
    }

    /// Dispatcher using the configured paymaster, transaction defaults and
    /// activity log
    pub fn from_config(
        sdk: Arc<dyn WalletSdk>,
        reconciler: Arc<SessionReconciler>,
        config: &Config,
    ) -> Self {
        Self {
            sdk,
            reconciler,
            paymaster: config.paymaster.clone(),
            defaults: config.transaction.clone(),
            audit: config.audit_log(),
        }
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Sign and submit `request` with the committed wallet.
    ///
    /// The SDK is called at most once. Without a committed identity the
    /// result is `Failure { NotAuthenticated }` and the SDK is not touched.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchResult {
        let started = Instant::now();

        let Some(identity) = self.reconciler.identity() else {
            tracing::warn!("Dispatch requested without a connected wallet");
            return DispatchResult::Failure {
                kind: ErrorKind::NotAuthenticated,
                message: "No wallet connected".to_string(),
            };
        };

        let sponsored = request.sponsorship_requested;
        let operation_count = request.operations.len();
        let payload = self.build_payload(request, &identity.wallet_address);

        tracing::info!(
            wallet = %identity.short_address(),
            operations = operation_count,
            sponsored,
            "Submitting transaction"
        );

        let result = match self.sdk.sign_and_submit(payload).await {
            Ok(signature_id) => {
                tracing::info!(signature = %signature_id, "Transaction confirmed");
                DispatchResult::Success { signature_id }
            }
            Err(e) => {
                let kind = ErrorKind::classify(&e.message);
                if kind == ErrorKind::StateDrift {
                    tracing::warn!(error = %e.message, "Wallet state drifted, re-reading session");
                    self.reconciler.refresh();
                } else {
                    tracing::error!(%kind, error = %e.message, "Transaction failed");
                }
                DispatchResult::Failure {
                    kind,
                    message: e.message,
                }
            }
        };

        if let Some(audit) = &self.audit {
            let mut entry = AuditEntry::new(
                "dispatch",
                if result.is_success() { "success" } else { "error" },
            )
            .wallet(identity.wallet_address.clone())
            .detail(json!({
                "operations": operation_count,
                "sponsored": sponsored,
                "result": &result,
            }))
            .duration(started.elapsed());
            if let DispatchResult::Failure { message, .. } = &result {
                entry = entry.error(message.clone());
            }
            audit.record(entry).await;
        }

        result
    }

    fn build_payload(&self, request: DispatchRequest, wallet_address: &str) -> SignPayload {
        let sponsored = request.sponsorship_requested;

        let fee_payer = if sponsored {
            FeePayer::Paymaster {
                url: self.paymaster.url.clone(),
            }
        } else {
            FeePayer::User {
                address: wallet_address.to_string(),
            }
        };

        SignPayload {
            instructions: request.operations,
            transaction_options: TransactionOptions {
                cluster_simulation: request.simulation_target.cluster_simulation(),
                compute_unit_limit: self.defaults.compute_unit_limit,
                fee_token: if sponsored {
                    self.paymaster.fee_token.clone()
                } else {
                    None
                },
            },
            fee_payer,
        }
    }
}
