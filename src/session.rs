//! Session reconciler
//!
//! Holds the one authoritative in-memory wallet identity for a context and
//! keeps it in line with the persisted record:
//!
//! - `mount` restores the persisted record
//! - change signals from other contexts, `refresh` calls and the optional
//!   background loop re-read the record
//! - `commit` and `reset` are the only writers
//!
//! Re-reads only replace the held identity when the wallet address differs,
//! so observers are not woken for no-op reconciliations.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::identity::WalletIdentity;
use crate::notifier::{Notifier, Subscription};
use crate::store::IdentityStore;

/// Where a context's session stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Unauthenticated,
    Authenticated(WalletIdentity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&WalletIdentity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn wallet_address(&self) -> Option<&str> {
        self.identity().map(|i| i.wallet_address.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Loading => "loading",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated(_) => "authenticated",
        }
    }

    fn from_record(record: Option<WalletIdentity>) -> Self {
        match record {
            Some(identity) => SessionState::Authenticated(identity),
            None => SessionState::Unauthenticated,
        }
    }
}

/// Local change the store has not accepted yet
#[derive(Debug, Clone)]
enum PendingWrite {
    Save(WalletIdentity),
    Clear,
}

pub struct SessionReconciler {
    store: IdentityStore,
    notifier: Notifier,
    state: watch::Sender<SessionState>,
    subscription: Mutex<Option<Subscription>>,
    pending: Mutex<Option<PendingWrite>>,
}

impl SessionReconciler {
    pub fn new(store: IdentityStore, notifier: Notifier) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Arc::new(Self {
            store,
            notifier,
            state,
            subscription: Mutex::new(None),
            pending: Mutex::new(None),
        })
    }

    /// Restore the persisted session and start listening for changes.
    /// Mounting again is a no-op.
    pub fn mount(self: &Arc<Self>) {
        let mut subscription = lock(&self.subscription);
        if subscription.is_some() {
            return;
        }

        // a commit or reset before mount that the store refused stays authoritative
        if lock(&self.pending).is_none() {
            self.state.send_replace(SessionState::Loading);
            let restored = self.store.load();
            match &restored {
                Some(identity) => {
                    tracing::info!(wallet = %identity.wallet_address, "Session restored")
                }
                None => tracing::debug!("No stored session"),
            }
            self.state.send_replace(SessionState::from_record(restored));
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        *subscription = Some(self.notifier.subscribe(move || {
            if let Some(reconciler) = weak.upgrade() {
                reconciler.reconcile("notifier");
            }
        }));
    }

    /// Persist `identity`, hold it, then tell other contexts.
    ///
    /// If the store refuses the write the identity is still held, and re-reads
    /// keep it instead of the stale record until a later write succeeds. Each
    /// re-read retries the write first.
    pub fn commit(&self, identity: WalletIdentity) {
        let persisted = self.persist(PendingWrite::Save(identity.clone()));

        let changed = self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Authenticated(current) if *current == identity) {
                return false;
            }
            *state = SessionState::Authenticated(identity.clone());
            true
        });

        tracing::info!(wallet = %identity.wallet_address, changed, persisted, "Session committed");

        if persisted {
            self.notifier.publish();
        }
    }

    /// Clear the persisted session, drop the held identity, tell other contexts.
    /// A refused clear is retried like a refused commit.
    pub fn reset(&self) {
        let cleared = self.persist(PendingWrite::Clear);

        self.state.send_replace(SessionState::Unauthenticated);
        tracing::info!(cleared, "Session cleared");

        if cleared {
            self.notifier.publish();
        }
    }

    /// Re-read the persisted record now
    pub fn refresh(&self) {
        self.reconcile("refresh");
    }

    /// Apply `write` to the store. On failure it is kept as the pending
    /// write; on success any older pending write is dropped.
    fn persist(&self, write: PendingWrite) -> bool {
        let result = match &write {
            PendingWrite::Save(identity) => self.store.save(identity),
            PendingWrite::Clear => self.store.clear(),
        };

        let mut pending = lock(&self.pending);
        match result {
            Ok(()) => {
                *pending = None;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session store rejected write, holding it locally");
                *pending = Some(write);
                false
            }
        }
    }

    fn reconcile(&self, source: &'static str) {
        let pending = lock(&self.pending).clone();
        if let Some(write) = pending {
            if self.persist(write) {
                tracing::info!(source, "Held session change persisted");
                self.notifier.publish();
            } else {
                tracing::debug!(source, "Store still rejecting writes, keeping held session");
            }
            return;
        }

        let loaded = self.store.load();

        let changed = self.state.send_if_modified(|state| {
            let next = match (&*state, &loaded) {
                (SessionState::Authenticated(current), Some(identity))
                    if current.same_wallet(identity) =>
                {
                    return false;
                }
                (SessionState::Unauthenticated, None) => return false,
                (_, Some(identity)) => SessionState::Authenticated(identity.clone()),
                (_, None) => SessionState::Unauthenticated,
            };
            *state = next;
            true
        });

        if changed {
            tracing::info!(
                source,
                wallet = loaded.as_ref().map(|i| i.wallet_address.as_str()).unwrap_or("none"),
                "Session reconciled"
            );
        } else {
            tracing::trace!(source, "Session unchanged");
        }
    }

    /// Re-read the store every `period` until the handle is aborted or the
    /// reconciler is dropped
    pub fn spawn_refresh_loop(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(reconciler) => reconciler.refresh(),
                    None => break,
                }
            }
            tracing::debug!("Session refresh loop stopped");
        })
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<WalletIdentity> {
        self.state.borrow().identity().cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            *self.state.borrow(),
            SessionState::Uninitialized | SessionState::Loading
        )
    }

    /// Receiver that wakes only when the session actually changes
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }
}

impl std::fmt::Debug for SessionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionReconciler")
            .field("state", &self.state.borrow().name())
            .field("context", &self.notifier.context())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
