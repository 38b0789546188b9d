//! LazorPay Session Layer
//!
//! Session identity and transaction dispatch for the LazorPay passkey
//! checkout:
//! - Persist the connected smart wallet so it survives restarts
//! - Keep every open context on the same wallet through change signals
//! - Connect and disconnect through the external passkey SDK
//! - Sign and submit caller-built operations with optional fee sponsorship
//!
//! # Session Model
//!
//! - The durable store is the single source of truth for the current wallet
//! - Only `commit` and `reset` write it, and both notify other contexts
//! - Error messages from the SDK are classified in one place ([`ErrorKind::classify`])
//! - Every auth and dispatch step can be written to a JSONL activity log

pub mod audit;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod identity;
pub mod notifier;
pub mod sdk;
pub mod session;
pub mod store;

mod error;

// Re-export commonly used types
pub use audit::AuditLog;
pub use config::{Cluster, Config};
pub use dispatch::{DispatchRequest, DispatchResult, SimulationTarget, TransactionDispatcher};
pub use error::{Error, ErrorKind, Result};
pub use gateway::{AuthGateway, ConnectOutcome};
pub use identity::WalletIdentity;
pub use notifier::{Notifier, Subscription};
pub use sdk::{Operation, SdkError, SdkSettings, WalletSdk};
pub use session::{SessionReconciler, SessionState};
pub use store::{FileMedium, IdentityStore, KeyValueMedium, MemoryMedium};
