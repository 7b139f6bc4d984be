use crate::codec::{Codec, Key};
use crate::enumerator::{EnumeratorBuilder, LazyValue, ScanControl, ScanSource};
use crate::errors::{engine_error, StoreError, StoreResult};
use crate::store::{Store, StoreInner};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Immutable, point-in-time view of a store.
///
/// Captured via [`Store::snapshot`]; reads through it never observe
/// mutations committed after creation, however long the snapshot is held.
/// The snapshot references its store weakly — it does not keep a closed
/// store alive, and once the store closes (or [`release`](Snapshot::release)
/// has run) every operation fails with [`StoreError::UseAfterRelease`]
/// rather than returning stale data.
///
/// Not thread-safe for concurrent use by multiple callers on the same
/// logical view; each snapshot belongs to a single caller for its lifetime.
pub struct Snapshot<C: Codec> {
    inner: Arc<SnapshotInner<C>>,
}

impl<C: Codec> Clone for Snapshot<C> {
    fn clone(&self) -> Self {
        Snapshot {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> Snapshot<C> {
    pub(crate) fn new(store: Weak<StoreInner<C>>, engine: fjall::Snapshot) -> Snapshot<C> {
        Snapshot {
            inner: Arc::new(SnapshotInner {
                store,
                engine: RwLock::new(Some(engine)),
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Captures a snapshot of `store` — equivalent to [`Store::snapshot`].
    pub fn create_from(store: &Store<C>) -> StoreResult<Snapshot<C>> {
        store.snapshot()
    }

    /// Returns true once `release` has run.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Relaxed)
    }

    /// Releases the engine snapshot resource deterministically.
    ///
    /// Idempotent; any later read fails with
    /// [`StoreError::UseAfterRelease`].
    pub fn release(&self) {
        let mut guard = self.inner.engine.write();
        guard.take();
        self.inner.released.store(true, Ordering::Relaxed);
    }

    /// Retrieves and decodes the value `key` had when the snapshot was
    /// taken. A missing key is `Ok(None)`, not an error.
    pub fn get<K: Into<Key>>(&self, key: K) -> StoreResult<Option<C::Value>> {
        let key = key.into();
        let store = self.store()?;
        let guard = self.inner.engine.read();
        let engine = Self::engine(&guard)?;
        match engine.get(key.as_bytes()) {
            Ok(Some(bytes)) => {
                let value = store.codec().decode(&key, &bytes)?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                log::error!(
                    "Failed to read key {} from snapshot of store {}: {}",
                    key,
                    store.name(),
                    err
                );
                Err(engine_error(err.into()))
            }
        }
    }

    /// Checks key existence in the frozen view without paying decode cost.
    pub fn exists<K: Into<Key>>(&self, key: K) -> StoreResult<bool> {
        let key = key.into();
        let store = self.store()?;
        let guard = self.inner.engine.read();
        let engine = Self::engine(&guard)?;
        match engine.contains_key(key.as_bytes()) {
            Ok(found) => Ok(found),
            Err(err) => {
                log::error!(
                    "Failed to check key {} in snapshot of store {}: {}",
                    key,
                    store.name(),
                    err
                );
                Err(engine_error(err.into()))
            }
        }
    }

    /// Bulk get against the frozen view, preserving input order; missing
    /// keys are populated with `not_found`.
    pub fn get_many(&self, keys: &[Key], not_found: C::Value) -> StoreResult<Vec<C::Value>>
    where
        C::Value: Clone,
    {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            match self.get(key.clone())? {
                Some(value) => values.push(value),
                None => values.push(not_found.clone()),
            }
        }
        Ok(values)
    }

    /// Starts building an enumeration over the frozen view.
    pub fn enumerator(&self) -> StoreResult<EnumeratorBuilder<C>> {
        let store = self.store()?;
        let guard = self.inner.engine.read();
        let engine = Self::engine(&guard)?;
        Ok(EnumeratorBuilder::new(
            store,
            ScanSource::Frozen((**engine).clone()),
        ))
    }

    /// Every key the snapshot holds, in ascending order.
    pub fn keys(&self) -> StoreResult<Vec<Key>> {
        let mut keys = Vec::new();
        let mut enumerator = self.enumerator()?.build()?;
        enumerator.for_each_key(|key| {
            keys.push(key.clone());
            Ok(ScanControl::Continue)
        })?;
        Ok(keys)
    }

    /// Every key accepted by `predicate`, in ascending order.
    pub fn keys_matching<F>(&self, predicate: F) -> StoreResult<Vec<Key>>
    where
        F: FnMut(&Key, &LazyValue<'_, C>) -> StoreResult<bool> + 'static,
    {
        let mut keys = Vec::new();
        let mut enumerator = self.enumerator()?.filter(predicate).build()?;
        enumerator.for_each_key(|key| {
            keys.push(key.clone());
            Ok(ScanControl::Continue)
        })?;
        Ok(keys)
    }

    /// Every entry accepted by `predicate`, in ascending key order.
    pub fn entries_matching<F>(&self, predicate: F) -> StoreResult<Vec<(Key, C::Value)>>
    where
        C::Value: Clone,
        F: FnMut(&Key, &LazyValue<'_, C>) -> StoreResult<bool> + 'static,
    {
        let mut entries = Vec::new();
        let mut enumerator = self.enumerator()?.filter(predicate).build()?;
        enumerator.for_each(|key, value| {
            entries.push((key.clone(), value.clone()));
            Ok(ScanControl::Continue)
        })?;
        Ok(entries)
    }

    /// Upgrades the weak store reference, refusing released snapshots and
    /// closed stores.
    fn store(&self) -> StoreResult<Arc<StoreInner<C>>> {
        if self.is_released() {
            return Err(StoreError::use_after_release("snapshot"));
        }
        let store = self
            .inner
            .store
            .upgrade()
            .ok_or_else(|| StoreError::use_after_release("snapshot"))?;
        if store.is_closed() {
            return Err(StoreError::use_after_release("store"));
        }
        Ok(store)
    }

    fn engine<'a>(
        guard: &'a parking_lot::RwLockReadGuard<'_, Option<fjall::Snapshot>>,
    ) -> StoreResult<&'a fjall::Snapshot> {
        guard
            .as_ref()
            .ok_or_else(|| StoreError::use_after_release("snapshot"))
    }
}

struct SnapshotInner<C: Codec> {
    store: Weak<StoreInner<C>>,
    engine: RwLock<Option<fjall::Snapshot>>,
    released: AtomicBool,
}
