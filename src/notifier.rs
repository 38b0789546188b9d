//! Cross-context change notifier
//!
//! A [`Notifier`] belongs to one execution context. `publish` reaches the
//! context's own subscribers directly and every other context through a
//! [`SignalChannel`], mirroring how browser storage events skip the tab that
//! made the write. Delivery is best-effort and at-least-once, so handlers must
//! tolerate running more than once per change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use uuid::Uuid;

use crate::Result;

/// Callback fired when a context should re-check the store
pub type Signal = Arc<dyn Fn() + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Identifies one execution context (tab, window, process)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Transport that carries change signals between contexts
pub trait SignalChannel: Send + Sync {
    /// Start delivering changes made by other contexts to `signal`
    fn join(&self, context: ContextId, signal: Signal);

    fn leave(&self, context: ContextId);

    /// Tell every context except `origin` that the store changed
    fn announce(&self, origin: ContextId);
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Signal)>>,
}

impl Registry {
    fn add(&self, handler: Signal) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.handlers).push((id, handler));
        id
    }

    fn remove(&self, id: u64) {
        lock(&self.handlers).retain(|(handler_id, _)| *handler_id != id);
    }

    fn fire(&self) {
        // snapshot so handlers can subscribe/unsubscribe while running
        let handlers: Vec<Signal> = lock(&self.handlers)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler();
        }
    }

    fn len(&self) -> usize {
        lock(&self.handlers).len()
    }
}

struct Inner {
    context: ContextId,
    registry: Arc<Registry>,
    channel: Option<Arc<dyn SignalChannel>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(channel) = &self.channel {
            channel.leave(self.context);
        }
    }
}

/// Publish/subscribe handle for one context. Clones share the context.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    /// Notifier that only reaches subscribers in this context
    pub fn local() -> Self {
        Self {
            inner: Arc::new(Inner {
                context: ContextId::new(),
                registry: Arc::new(Registry::default()),
                channel: None,
            }),
        }
    }

    /// Notifier for a new context on `channel`
    pub fn join(channel: Arc<dyn SignalChannel>) -> Self {
        let context = ContextId::new();
        let registry = Arc::new(Registry::default());

        let weak: Weak<Registry> = Arc::downgrade(&registry);
        channel.join(
            context,
            Arc::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.fire();
                }
            }),
        );

        Self {
            inner: Arc::new(Inner {
                context,
                registry,
                channel: Some(channel),
            }),
        }
    }

    pub fn context(&self) -> ContextId {
        self.inner.context
    }

    /// Signal that the store changed
    pub fn publish(&self) {
        tracing::trace!(context = %self.inner.context, "Publishing session change");
        if let Some(channel) = &self.inner.channel {
            channel.announce(self.inner.context);
        }
        // channels skip the origin, so deliver locally as well
        self.inner.registry.fire();
    }

    /// Run `handler` on every change until the returned subscription is dropped
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.registry.add(Arc::new(handler));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("context", &self.inner.context)
            .field("subscribers", &self.inner.registry.len())
            .field("channel", &self.inner.channel.is_some())
            .finish()
    }
}

/// Registration handle; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Channel between contexts living in the same process
#[derive(Default)]
pub struct InProcessChannel {
    contexts: Mutex<HashMap<ContextId, Signal>>,
}

impl InProcessChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SignalChannel for InProcessChannel {
    fn join(&self, context: ContextId, signal: Signal) {
        lock(&self.contexts).insert(context, signal);
    }

    fn leave(&self, context: ContextId) {
        lock(&self.contexts).remove(&context);
    }

    fn announce(&self, origin: ContextId) {
        let targets: Vec<Signal> = lock(&self.contexts)
            .iter()
            .filter(|(context, _)| **context != origin)
            .map(|(_, signal)| signal.clone())
            .collect();
        for signal in targets {
            signal();
        }
    }
}

/// Channel fed by filesystem notifications on a [`crate::store::FileMedium`]
/// file, so separate processes sharing the file hear about each other's writes.
///
/// The writing process observes its own write too; with the local delivery in
/// [`Notifier::publish`] that context may be signalled twice.
pub struct FileWatchChannel {
    path: PathBuf,
    contexts: Arc<Mutex<HashMap<ContextId, Signal>>>,
    _watcher: Mutex<RecommendedWatcher>,
}

impl FileWatchChannel {
    /// Watch the storage file at `path`. Its directory is created if needed.
    pub fn watch(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let path = path.into();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let contexts: Arc<Mutex<HashMap<ContextId, Signal>>> = Arc::default();
        let file_name = path.file_name().map(|name| name.to_os_string());

        let targets = contexts.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !is_write(&event.kind) {
                        return;
                    }
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !touches_file {
                        return;
                    }
                    let signals: Vec<Signal> = lock(&targets).values().cloned().collect();
                    tracing::debug!(contexts = signals.len(), "Storage file changed");
                    for signal in signals {
                        signal();
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Storage watch error");
                }
            },
            notify::Config::default(),
        )?;

        // the file is replaced by rename, so watch the directory rather than the inode
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "Watching session storage");

        Ok(Arc::new(Self {
            path,
            contexts,
            _watcher: Mutex::new(watcher),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads also raise events on some platforms; only writes count as changes
fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

impl SignalChannel for FileWatchChannel {
    fn join(&self, context: ContextId, signal: Signal) {
        lock(&self.contexts).insert(context, signal);
    }

    fn leave(&self, context: ContextId) {
        lock(&self.contexts).remove(&context);
    }

    fn announce(&self, _origin: ContextId) {
        // the file write itself is the announcement
    }
}
