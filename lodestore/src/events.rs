use crate::codec::Key;
use crate::errors::StoreResult;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A change event produced by a committed mutation.
///
/// Put events carry the key and the committed value; delete events carry the
/// key only. Values are shared via `Arc` so dispatch to many subscribers
/// never clones application objects.
#[derive(Debug)]
pub enum ChangeEvent<V> {
    /// A key was inserted or replaced.
    Put { key: Key, value: Arc<V> },
    /// A key was removed.
    Delete { key: Key },
}

impl<V> ChangeEvent<V> {
    /// Returns the key this event refers to.
    #[inline]
    pub fn key(&self) -> &Key {
        match self {
            ChangeEvent::Put { key, .. } => key,
            ChangeEvent::Delete { key } => key,
        }
    }

    /// Returns the committed value for put events, `None` for deletes.
    #[inline]
    pub fn value(&self) -> Option<&V> {
        match self {
            ChangeEvent::Put { value, .. } => Some(value),
            ChangeEvent::Delete { .. } => None,
        }
    }
}

impl<V> Clone for ChangeEvent<V> {
    fn clone(&self) -> Self {
        match self {
            ChangeEvent::Put { key, value } => ChangeEvent::Put {
                key: key.clone(),
                value: Arc::clone(value),
            },
            ChangeEvent::Delete { key } => ChangeEvent::Delete { key: key.clone() },
        }
    }
}

/// Selects which committed mutations a subscription observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    /// Every committed mutation.
    All,
    /// Only mutations of this exact key.
    Exact(Key),
}

impl KeyFilter {
    #[inline]
    fn matches(&self, key: &Key) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Exact(k) => k == key,
        }
    }
}

/// Cloneable callback wrapper for change subscriptions.
///
/// Wraps any `Fn(&ChangeEvent<V>) -> StoreResult<()>` closure behind an
/// `Arc` so the same listener can be registered and dispatched across
/// threads. Listener errors are logged by the notifier and never poison the
/// committing write path.
pub struct ChangeListener<V> {
    callback: Arc<dyn Fn(&ChangeEvent<V>) -> StoreResult<()> + Send + Sync>,
}

impl<V> Clone for ChangeListener<V> {
    fn clone(&self) -> Self {
        ChangeListener {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<V> ChangeListener<V> {
    /// Wraps a closure as a listener.
    pub fn new<F>(callback: F) -> ChangeListener<V>
    where
        F: Fn(&ChangeEvent<V>) -> StoreResult<()> + Send + Sync + 'static,
    {
        ChangeListener {
            callback: Arc::new(callback),
        }
    }

    #[inline]
    fn handle(&self, event: &ChangeEvent<V>) -> StoreResult<()> {
        (self.callback)(event)
    }
}

impl<V> Debug for ChangeListener<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListener").finish_non_exhaustive()
    }
}

/// Handle identifying a registered subscription.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriberRef {
    id: u64,
}

#[derive(Clone)]
/// Store-scoped change subscription registry.
///
/// Delivers post-commit change events to interested observers, keyed by
/// exact key or unfiltered. Dispatch is synchronous with the committing
/// call: by the time a subscriber sees an event, the originating write has
/// returned success and satisfied the store's durability setting. While
/// paused, committed mutations are dropped, not queued — resuming does not
/// replay missed events.
pub struct ChangeNotifier<V> {
    inner: Arc<NotifierInner<V>>,
}

impl<V> ChangeNotifier<V> {
    /// Creates an empty registry.
    pub fn new() -> ChangeNotifier<V> {
        ChangeNotifier {
            inner: Arc::new(NotifierInner {
                subscriptions: DashMap::new(),
                next_id: AtomicU64::new(1),
                paused: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a listener for mutations matching `filter`.
    pub fn subscribe(&self, filter: KeyFilter, listener: ChangeListener<V>) -> SubscriberRef {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscriptions
            .insert(id, Subscription { filter, listener });
        SubscriberRef { id }
    }

    /// Removes a subscription. Unknown handles are ignored.
    pub fn unsubscribe(&self, subscriber: SubscriberRef) {
        self.inner.subscriptions.remove(&subscriber.id);
    }

    /// Suspends dispatch; events committed while paused are dropped.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Relaxed);
    }

    /// Resumes dispatch. Events dropped while paused are not replayed.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Relaxed);
    }

    /// Returns true while dispatch is suspended.
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Relaxed)
    }

    /// Returns true if any subscription is registered.
    ///
    /// Fast path for the write side: no event is constructed when nobody
    /// listens.
    pub fn has_subscribers(&self) -> bool {
        !self.inner.subscriptions.is_empty()
    }

    /// Dispatches one committed event to every matching subscription.
    ///
    /// Listener errors are logged and swallowed; the committing caller must
    /// not fail because an observer did. Matching listeners are collected
    /// before any callback runs, so a listener may subscribe or unsubscribe
    /// from inside its own callback.
    pub fn publish(&self, event: &ChangeEvent<V>) {
        if self.is_paused() {
            return;
        }
        let matching: Vec<ChangeListener<V>> = self
            .inner
            .subscriptions
            .iter()
            .filter(|entry| entry.value().filter.matches(event.key()))
            .map(|entry| entry.value().listener.clone())
            .collect();
        for listener in matching {
            if let Err(err) = listener.handle(event) {
                log::error!("Change listener failed for key {}: {}", event.key(), err);
            }
        }
    }

    /// Drops every subscription. Called when the owning store closes.
    pub fn close(&self) {
        self.inner.subscriptions.clear();
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.len()
    }
}

impl<V> Default for ChangeNotifier<V> {
    fn default() -> Self {
        Self::new()
    }
}

struct NotifierInner<V> {
    subscriptions: DashMap<u64, Subscription<V>>,
    next_id: AtomicU64,
    paused: AtomicBool,
}

struct Subscription<V> {
    filter: KeyFilter,
    listener: ChangeListener<V>,
}
