use crate::codec::{Codec, Key};
use crate::errors::StoreResult;
use crate::store::Store;
use indexmap::IndexMap;
use std::sync::Arc;

/// A single recorded batch operation.
///
/// Values are held behind `Arc` so the same object can later feed change
/// events without cloning application data.
pub(crate) enum BatchOp<V> {
    Put { key: Key, value: Arc<V> },
    Delete { key: Key },
}

impl<V> BatchOp<V> {
    #[inline]
    pub(crate) fn key(&self) -> &Key {
        match self {
            BatchOp::Put { key, .. } => key,
            BatchOp::Delete { key } => key,
        }
    }
}

impl<V> Clone for BatchOp<V> {
    fn clone(&self) -> Self {
        match self {
            BatchOp::Put { key, value } => BatchOp::Put {
                key: key.clone(),
                value: Arc::clone(value),
            },
            BatchOp::Delete { key } => BatchOp::Delete { key: key.clone() },
        }
    }
}

/// Ordered collection of put/delete operations applied atomically.
///
/// Operations accumulate in call order without touching the engine; nothing
/// becomes visible to any reader until [`apply`](WriteBatch::apply)
/// succeeds, at which point every operation becomes visible simultaneously.
/// Later operations on the same key supersede earlier ones within the same
/// batch.
///
/// A batch may be reused (cleared and refilled) or discarded after apply;
/// a failed apply leaves the store byte-for-byte as before the call.
pub struct WriteBatch<V> {
    ops: Vec<BatchOp<V>>,
}

impl<V> WriteBatch<V> {
    /// Creates an empty batch.
    pub fn new() -> WriteBatch<V> {
        WriteBatch { ops: Vec::new() }
    }

    /// Records an insert/replace of `key`.
    pub fn put<K: Into<Key>>(&mut self, key: K, value: V) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: Arc::new(value),
        });
    }

    /// Records a delete of `key`.
    pub fn delete<K: Into<Key>>(&mut self, key: K) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    /// Records an insert/replace for every entry, in order.
    pub fn put_all(&mut self, entries: Vec<(Key, V)>) {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    /// Records a delete for every listed key, in order.
    pub fn delete_many(&mut self, keys: &[Key]) {
        for key in keys {
            self.delete(key.clone());
        }
    }

    /// Discards all recorded operations so the batch can be refilled.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Number of recorded operations (before same-key collapse).
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Submits the recorded operations to `store` as one atomic unit.
    ///
    /// Same-key operations are collapsed to the last one recorded before
    /// anything reaches the engine, so intermediate states are neither
    /// stored nor notified. On success every operation is visible to
    /// subsequent reads simultaneously and the collapsed operations are
    /// handed to the change notifier in commit order, after the commit has
    /// satisfied the store's durability setting.
    pub fn apply<C>(&self, store: &Store<C>) -> StoreResult<()>
    where
        C: Codec<Value = V>,
    {
        let collapsed = self.collapsed();
        store.apply_ops(&collapsed)
    }

    /// Collapses same-key operations, keeping the last one recorded.
    ///
    /// The surviving operation takes the position of its last occurrence,
    /// matching the order the engine would commit it in.
    fn collapsed(&self) -> Vec<BatchOp<V>> {
        let mut collapsed: IndexMap<Key, BatchOp<V>> = IndexMap::with_capacity(self.ops.len());
        for op in &self.ops {
            let key = op.key().clone();
            collapsed.shift_remove(&key);
            collapsed.insert(key, op.clone());
        }
        collapsed.into_values().collect()
    }
}

impl<V> Default for WriteBatch<V> {
    fn default() -> Self {
        Self::new()
    }
}
