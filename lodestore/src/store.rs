use crate::batch::{BatchOp, WriteBatch};
use crate::codec::{Codec, Key};
use crate::config::StoreConfig;
use crate::enumerator::{EnumeratorBuilder, LazyValue, ScanControl, ScanSource};
use crate::errors::{batch_error, engine_error, StoreError, StoreResult};
use crate::events::{ChangeEvent, ChangeListener, ChangeNotifier, KeyFilter, SubscriberRef};
use crate::snapshot::Snapshot;
use crate::version::fjall_version;
use fjall::{Keyspace, Partition, PersistMode};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Name of the single data partition backing a store.
const DATA_PARTITION: &str = "data";

/// Typed, object-level store over the fjall LSM engine.
///
/// A `Store` owns the engine handle for one on-disk keyspace and gives
/// application code codec-mediated access to it: single-key operations,
/// bulk operations, filtered directional enumeration, point-in-time
/// snapshots, atomic write batches, and post-commit change notification.
/// Uses PIMPL with `Arc<StoreInner>` so clones are cheap handles onto the
/// same engine state.
///
/// Characteristics:
/// - Thread-safe (Arc-based, cloneable across threads)
/// - Persistent (backed by the fjall LSM engine on disk)
/// - Codec-mediated (values pass through the configured [`Codec`])
/// - Event-driven (committed mutations feed the store-scoped notifier)
///
/// All write paths — `put`, `delete`, bulk helpers, and explicit
/// [`WriteBatch`]es — commit through the same atomic engine batch and the
/// same durability and notification path. Closing the store invalidates
/// every snapshot and enumerator derived from it; subsequent use fails with
/// [`StoreError::UseAfterRelease`] rather than reading stale data.
pub struct Store<C: Codec> {
    inner: Arc<StoreInner<C>>,
}

impl<C: Codec> Clone for Store<C> {
    fn clone(&self) -> Self {
        Store {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> Store<C> {
    /// Opens (or creates) the store described by `config`, using `codec` for
    /// every value conversion.
    ///
    /// Fails with [`StoreError::MissingDatabase`] when the path does not
    /// exist and `create_if_missing` is disabled, with
    /// [`StoreError::AlreadyExists`] when `error_if_exists` is set and data
    /// is already present, and with [`StoreError::Corruption`] when the
    /// open-time integrity probe fails under `paranoid_checks`.
    pub fn open(config: StoreConfig, codec: C) -> StoreResult<Store<C>> {
        let path = PathBuf::from(config.path());
        let exists = !config.path().is_empty() && path.exists();

        if exists && config.error_if_exists() {
            return Err(StoreError::AlreadyExists { path });
        }
        if !exists && !config.create_if_missing() {
            return Err(StoreError::MissingDatabase { path });
        }

        let keyspace = match Keyspace::open(config.keyspace_config()) {
            Ok(keyspace) => keyspace,
            Err(err) => {
                log::error!("Failed to open keyspace at {:?}: {}", path, err);
                return Err(engine_error(err));
            }
        };

        let partition = match keyspace.open_partition(DATA_PARTITION, config.partition_config()) {
            Ok(partition) => partition,
            Err(err) => {
                log::error!("Failed to open data partition at {:?}: {}", path, err);
                return Err(engine_error(err));
            }
        };

        // integrity probe; fatal only under paranoid checks
        if let Err(err) = partition.first_key_value() {
            if config.paranoid_checks() {
                return Err(StoreError::Corruption {
                    details: err.to_string(),
                });
            }
            log::warn!("Integrity probe failed at open, continuing: {}", err);
        }

        let name = if config.name().is_empty() {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DATA_PARTITION.to_string())
        } else {
            config.name().to_string()
        };

        Ok(Store {
            inner: Arc::new(StoreInner {
                name,
                path,
                config,
                codec,
                handles: RwLock::new(Some(EngineHandles { keyspace, partition })),
                closed: AtomicBool::new(false),
                notifier: ChangeNotifier::new(),
            }),
        })
    }

    /// Returns the logical store name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the filesystem path of the store.
    #[inline]
    pub fn path(&self) -> &std::path::Path {
        &self.inner.path
    }

    /// Returns true once `close` has run.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Retrieves and decodes the value stored under `key`.
    ///
    /// A missing key is `Ok(None)`, not an error.
    pub fn get<K: Into<Key>>(&self, key: K) -> StoreResult<Option<C::Value>> {
        let key = key.into();
        let partition = self.inner.partition()?;
        match partition.get(key.as_bytes()) {
            Ok(Some(bytes)) => {
                let value = self.inner.codec().decode(&key, &bytes)?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                log::error!(
                    "Failed to read key {} from store {}: {}",
                    key,
                    self.inner.name,
                    err
                );
                Err(engine_error(err))
            }
        }
    }

    /// Checks key existence without reading or decoding the value.
    pub fn exists<K: Into<Key>>(&self, key: K) -> StoreResult<bool> {
        let key = key.into();
        let partition = self.inner.partition()?;
        match partition.contains_key(key.as_bytes()) {
            Ok(found) => Ok(found),
            Err(err) => {
                log::error!(
                    "Failed to check key {} in store {}: {}",
                    key,
                    self.inner.name,
                    err
                );
                Err(engine_error(err))
            }
        }
    }

    /// Bulk get preserving input order.
    ///
    /// Missing keys are populated with `not_found` instead of failing the
    /// whole call.
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

    /// Inserts or replaces the value under `key`.
    ///
    /// Routed through a one-operation [`WriteBatch`] so single-key writes
    /// share the durability and notification path of batched writes.
    pub fn put<K: Into<Key>>(&self, key: K, value: C::Value) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        batch.apply(self)
    }

    /// Removes `key`. Deleting an absent key is not an error.
    pub fn delete<K: Into<Key>>(&self, key: K) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        batch.apply(self)
    }

    /// Inserts every entry atomically.
    pub fn put_all(&self, entries: Vec<(Key, C::Value)>) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put_all(entries);
        batch.apply(self)
    }

    /// Removes every listed key atomically.
    pub fn delete_many(&self, keys: &[Key]) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete_many(keys);
        batch.apply(self)
    }

    /// Removes every key in the store as one atomic batch.
    pub fn clear(&self) -> StoreResult<()> {
        let keys = self.keys()?;
        self.delete_many(&keys)
    }

    /// Removes every key sharing `prefix` as one atomic batch.
    pub fn remove_prefix<K: Into<Key>>(&self, prefix: K) -> StoreResult<()> {
        let mut keys = Vec::new();
        let mut enumerator = self.enumerator()?.prefix(prefix).build()?;
        enumerator.for_each_key(|key| {
            keys.push(key.clone());
            Ok(ScanControl::Continue)
        })?;
        self.delete_many(&keys)
    }

    /// Returns every key in ascending order.
    ///
    /// A specialization of a full forward enumeration, like the other
    /// derived reads below.
    pub fn keys(&self) -> StoreResult<Vec<Key>> {
        let mut keys = Vec::new();
        let mut enumerator = self.enumerator()?.build()?;
        enumerator.for_each_key(|key| {
            keys.push(key.clone());
            Ok(ScanControl::Continue)
        })?;
        Ok(keys)
    }

    /// Returns every key accepted by `predicate`, in ascending order.
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

    /// Returns every entry accepted by `predicate`, in ascending key order.
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

    /// Starts building an enumeration over the live store state.
    pub fn enumerator(&self) -> StoreResult<EnumeratorBuilder<C>> {
        let partition = self.inner.partition()?;
        Ok(EnumeratorBuilder::new(
            Arc::clone(&self.inner),
            ScanSource::Live(partition),
        ))
    }

    /// Captures a point-in-time snapshot of the current store state.
    ///
    /// O(1) relative to data size; the engine shares underlying immutable
    /// structures. The snapshot stays valid until released, independent of
    /// later mutations.
    pub fn snapshot(&self) -> StoreResult<Snapshot<C>> {
        let guard = self.inner.handles.read();
        let handles = guard
            .as_ref()
            .ok_or_else(|| StoreError::use_after_release("store"))?;
        let engine = handles.partition.snapshot();
        Ok(Snapshot::new(Arc::downgrade(&self.inner), engine))
    }

    /// Creates an empty write batch for this store's value type.
    pub fn batch(&self) -> WriteBatch<C::Value> {
        WriteBatch::new()
    }

    /// Registers a change listener for mutations matching `filter`.
    pub fn subscribe(
        &self,
        filter: KeyFilter,
        listener: ChangeListener<C::Value>,
    ) -> StoreResult<SubscriberRef> {
        self.inner.check_open()?;
        Ok(self.inner.notifier.subscribe(filter, listener))
    }

    /// Removes a change subscription.
    pub fn unsubscribe(&self, subscriber: SubscriberRef) {
        self.inner.notifier.unsubscribe(subscriber)
    }

    /// Suspends change dispatch; events committed while paused are dropped.
    pub fn pause_notifications(&self) {
        self.inner.notifier.pause()
    }

    /// Resumes change dispatch without replaying dropped events.
    pub fn resume_notifications(&self) {
        self.inner.notifier.resume()
    }

    /// Forces buffered writes down to disk.
    pub fn persist(&self) -> StoreResult<()> {
        let guard = self.inner.handles.read();
        let handles = guard
            .as_ref()
            .ok_or_else(|| StoreError::use_after_release("store"))?;
        match handles.keyspace.persist(PersistMode::SyncAll) {
            Ok(_) => Ok(()),
            Err(err) => {
                log::error!("Failed to persist store {}: {}", self.inner.name, err);
                Err(engine_error(err))
            }
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        let partition = self.inner.partition()?;
        match partition.len() {
            Ok(len) => Ok(len),
            Err(err) => {
                log::error!("Failed to get size of store {}: {}", self.inner.name, err);
                Err(engine_error(err))
            }
        }
    }

    /// Returns true when no keys are stored.
    pub fn is_empty(&self) -> StoreResult<bool> {
        let partition = self.inner.partition()?;
        match partition.is_empty() {
            Ok(empty) => Ok(empty),
            Err(err) => {
                log::error!(
                    "Failed to check emptiness of store {}: {}",
                    self.inner.name,
                    err
                );
                Err(engine_error(err))
            }
        }
    }

    /// Reports the backing engine version, e.g. `Fjall/2.6.3`.
    pub fn store_version(&self) -> StoreResult<String> {
        match fjall_version() {
            Ok(version) => Ok(format!("Fjall/{}", version)),
            Err(e) => Err(StoreError::Backend {
                details: format!("Failed to determine engine version: {}", e),
            }),
        }
    }

    /// Releases the engine handle.
    ///
    /// Serialized against in-flight snapshot and enumerator creation via the
    /// handle lock. Outstanding snapshots and enumerators become invalid and
    /// fail with [`StoreError::UseAfterRelease`] on next use. Idempotent.
    pub fn close(&self) -> StoreResult<()> {
        let mut guard = self.inner.handles.write();
        if let Some(handles) = guard.take() {
            if self.inner.config.commit_before_close() {
                if let Err(err) = handles.keyspace.persist(PersistMode::SyncAll) {
                    log::error!(
                        "Failed to persist store {} during close: {}",
                        self.inner.name,
                        err
                    );
                }
            }
            drop(handles);
        }
        self.inner.closed.store(true, Ordering::Relaxed);
        self.inner.notifier.close();
        Ok(())
    }

    /// Closes the store (if open) and removes all persisted state from disk.
    ///
    /// Destructive and irreversible.
    pub fn destroy(&self) -> StoreResult<()> {
        self.close()?;
        if self.inner.path.exists() {
            std::fs::remove_dir_all(&self.inner.path)?;
        }
        Ok(())
    }

    /// Commits a collapsed operation list as one atomic engine batch and
    /// dispatches change events after the commit is durable.
    ///
    /// Values are encoded before the engine is touched so a codec failure
    /// cannot leave a partial batch behind.
    pub(crate) fn apply_ops(&self, ops: &[BatchOp<C::Value>]) -> StoreResult<()> {
        let inner = &self.inner;
        let guard = inner.handles.read();
        let handles = guard
            .as_ref()
            .ok_or_else(|| StoreError::use_after_release("store"))?;

        if ops.is_empty() {
            return Ok(());
        }

        enum EncodedOp<'a> {
            Put { key: &'a Key, bytes: Vec<u8> },
            Delete { key: &'a Key },
        }

        let mut encoded = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                BatchOp::Put { key, value } => encoded.push(EncodedOp::Put {
                    key,
                    bytes: inner.codec.encode(key, value)?,
                }),
                BatchOp::Delete { key } => encoded.push(EncodedOp::Delete { key }),
            }
        }

        let mut batch = handles.keyspace.batch();
        for op in encoded {
            match op {
                EncodedOp::Put { key, bytes } => {
                    batch.insert(&handles.partition, key.as_bytes(), bytes)
                }
                EncodedOp::Delete { key } => batch.remove(&handles.partition, key.as_bytes()),
            }
        }

        if let Err(err) = batch.commit() {
            log::error!(
                "Failed to commit batch of {} ops to store {}: {}",
                ops.len(),
                inner.name,
                err
            );
            return Err(batch_error(err));
        }

        if inner.config.safe() {
            if let Err(err) = handles.keyspace.persist(PersistMode::SyncAll) {
                log::error!(
                    "Failed to persist store {} after batch commit: {}",
                    inner.name,
                    err
                );
                return Err(engine_error(err));
            }
        }
        drop(guard);

        if inner.notifier.has_subscribers() {
            for op in ops {
                let event = match op {
                    BatchOp::Put { key, value } => ChangeEvent::Put {
                        key: key.clone(),
                        value: Arc::clone(value),
                    },
                    BatchOp::Delete { key } => ChangeEvent::Delete { key: key.clone() },
                };
                inner.notifier.publish(&event);
            }
        }
        Ok(())
    }
}

/// Engine handles owned by an open store.
pub(crate) struct EngineHandles {
    pub(crate) keyspace: Keyspace,
    pub(crate) partition: Partition,
}

/// Shared state behind every `Store` clone.
pub(crate) struct StoreInner<C: Codec> {
    name: String,
    path: PathBuf,
    config: StoreConfig,
    codec: C,
    handles: RwLock<Option<EngineHandles>>,
    closed: AtomicBool,
    notifier: ChangeNotifier<C::Value>,
}

impl<C: Codec> StoreInner<C> {
    #[inline]
    pub(crate) fn codec(&self) -> &C {
        &self.codec
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub(crate) fn check_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            log::error!("Store {} is closed", self.name);
            return Err(StoreError::use_after_release("store"));
        }
        Ok(())
    }

    /// Clones the partition handle under the read lock, failing once the
    /// store has been closed.
    pub(crate) fn partition(&self) -> StoreResult<Partition> {
        let guard = self.handles.read();
        match guard.as_ref() {
            Some(handles) => Ok(handles.partition.clone()),
            None => Err(StoreError::use_after_release("store")),
        }
    }
}

impl<C: Codec> Drop for StoreInner<C> {
    fn drop(&mut self) {
        if let Some(handles) = self.handles.get_mut().take() {
            if self.config.commit_before_close() {
                match handles.keyspace.persist(PersistMode::SyncAll) {
                    Ok(_) => log::debug!("Persisted store {} during drop", self.name),
                    Err(e) => log::error!("Failed to persist store {} during drop: {}", self.name, e),
                }
            }
        }
    }
}
