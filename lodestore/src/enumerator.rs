use crate::codec::{Codec, Key};
use crate::errors::{enumeration_error, StoreError, StoreResult};
use crate::store::StoreInner;
use fjall::{Partition, Slice};
use std::cell::OnceCell;
use std::ops::Bound::{Included, Unbounded};
use std::sync::Arc;

/// Traversal direction over the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending byte-wise key order.
    Forward,
    /// Descending byte-wise key order.
    Backward,
}

/// Observable lifecycle of an [`Enumerator`].
///
/// `Created → Positioned → {Advancing, Exhausted, Stopped, Failed}`. The
/// engine iterator handle exists only between `Positioned` and the first
/// terminal state; every terminal transition drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorState {
    /// Built, engine iterator not yet created.
    Created,
    /// Engine iterator created and seeked.
    Positioned,
    /// At least one entry has been read.
    Advancing,
    /// Ran off the end of the range or past the prefix bound.
    Exhausted,
    /// Stopped cooperatively by the consumer (or explicitly closed).
    Stopped,
    /// The engine iterator reported an error mid-scan.
    Failed,
}

impl EnumeratorState {
    #[inline]
    fn is_terminal(self) -> bool {
        matches!(
            self,
            EnumeratorState::Exhausted | EnumeratorState::Stopped | EnumeratorState::Failed
        )
    }
}

/// Consumer verdict after each reported entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    /// Keep traversing.
    Continue,
    /// Stop the scan; no further engine reads are performed.
    Stop,
}

/// Deferred decode accessor handed to predicates and lazy callbacks.
///
/// Decode cost is paid only when [`get`](LazyValue::get) is invoked, and at
/// most once per entry: the predicate and the reporting callback observe the
/// same cell, so a predicate that already decoded leaves the callback a free
/// read, and a key-only predicate never triggers the codec at all.
pub struct LazyValue<'a, C: Codec> {
    key: &'a Key,
    raw: &'a [u8],
    codec: &'a C,
    cell: OnceCell<C::Value>,
}

impl<'a, C: Codec> LazyValue<'a, C> {
    fn new(key: &'a Key, raw: &'a [u8], codec: &'a C) -> LazyValue<'a, C> {
        LazyValue {
            key,
            raw,
            codec,
            cell: OnceCell::new(),
        }
    }

    /// Decodes (once) and returns the value.
    pub fn get(&self) -> StoreResult<&C::Value> {
        if self.cell.get().is_none() {
            let value = self.codec.decode(self.key, self.raw)?;
            let _ = self.cell.set(value);
        }
        self.cell.get().ok_or_else(|| StoreError::Backend {
            details: "lazy value cell unexpectedly empty".to_string(),
        })
    }

    /// Returns the stored bytes without decoding.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        self.raw
    }

    /// Returns true once the value has been decoded.
    #[inline]
    pub fn is_decoded(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Predicate evaluated per traversed entry.
///
/// Receives the key and the entry's deferred-value accessor; returning
/// `Ok(false)` skips the entry without terminating the scan.
pub type ScanPredicate<C> = Box<dyn FnMut(&Key, &LazyValue<'_, C>) -> StoreResult<bool>>;

type RawEntry = Result<(Slice, Slice), fjall::Error>;
type EngineIter = Box<dyn Iterator<Item = RawEntry>>;

/// The owned, cloneable snapshot value underlying a [`fjall::Snapshot`].
///
/// `fjall::Snapshot` is not itself `Clone`, but it derefs to this engine-level
/// snapshot, which is. The enumerator only ever calls `range`/`prefix` on it —
/// both resolve through that deref — so the frozen view is identical.
type FrozenSnapshot = <fjall::Snapshot as std::ops::Deref>::Target;

/// Read source an enumeration runs against: the live store state or a
/// frozen snapshot view.
pub(crate) enum ScanSource {
    Live(Partition),
    Frozen(FrozenSnapshot),
}

impl ScanSource {
    fn range(&self, bounds: (std::ops::Bound<Vec<u8>>, std::ops::Bound<Vec<u8>>), backward: bool) -> EngineIter {
        match self {
            ScanSource::Live(partition) => {
                if backward {
                    Box::new(partition.range(bounds).rev())
                } else {
                    Box::new(partition.range(bounds))
                }
            }
            ScanSource::Frozen(snapshot) => {
                if backward {
                    Box::new(snapshot.range(bounds).map(|item| item.map_err(Into::into)).rev())
                } else {
                    Box::new(snapshot.range(bounds).map(|item| item.map_err(Into::into)))
                }
            }
        }
    }

    fn prefix(&self, prefix: &Key, backward: bool) -> EngineIter {
        let prefix = prefix.as_bytes().to_vec();
        match self {
            ScanSource::Live(partition) => {
                if backward {
                    Box::new(partition.prefix(prefix).rev())
                } else {
                    Box::new(partition.prefix(prefix))
                }
            }
            ScanSource::Frozen(snapshot) => {
                if backward {
                    Box::new(snapshot.prefix(prefix).map(|item| item.map_err(Into::into)).rev())
                } else {
                    Box::new(snapshot.prefix(prefix).map(|item| item.map_err(Into::into)))
                }
            }
        }
    }
}

/// Builder for a directional, boundable, filterable key-space traversal.
///
/// Obtained from [`Store::enumerator`](crate::Store::enumerator) or
/// [`Snapshot::enumerator`](crate::Snapshot::enumerator).
pub struct EnumeratorBuilder<C: Codec> {
    store: Arc<StoreInner<C>>,
    source: ScanSource,
    direction: Direction,
    start: Option<Key>,
    prefix: Option<Key>,
    filter: Option<ScanPredicate<C>>,
}

impl<C: Codec> EnumeratorBuilder<C> {
    pub(crate) fn new(store: Arc<StoreInner<C>>, source: ScanSource) -> EnumeratorBuilder<C> {
        EnumeratorBuilder {
            store,
            source,
            direction: Direction::Forward,
            start: None,
            prefix: None,
            filter: None,
        }
    }

    /// Traverses in descending key order.
    pub fn backward(mut self) -> Self {
        self.direction = Direction::Backward;
        self
    }

    /// Seeks to `key` before traversing: the first key ≥ `key` going
    /// forward, the first key ≤ `key` going backward.
    pub fn from<K: Into<Key>>(mut self, key: K) -> Self {
        self.start = Some(key.into());
        self
    }

    /// Restricts the scan to keys sharing `prefix`.
    ///
    /// This is a hard bound: traversal transitions to `Exhausted` the first
    /// time the current key no longer shares the prefix, without reading
    /// further.
    pub fn prefix<K: Into<Key>>(mut self, prefix: K) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Skips entries rejected by `predicate` without terminating the scan.
    ///
    /// The predicate receives the same [`LazyValue`] later handed to the
    /// consumer, so a predicate over keys only never forces a decode and a
    /// value predicate decodes each reported entry at most once.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: FnMut(&Key, &LazyValue<'_, C>) -> StoreResult<bool> + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Finalizes the traversal plan.
    ///
    /// The engine iterator itself is created lazily on the first drive call.
    pub fn build(self) -> StoreResult<Enumerator<C>> {
        self.store.check_open()?;
        Ok(Enumerator {
            store: self.store,
            source: self.source,
            direction: self.direction,
            start: self.start,
            prefix: self.prefix,
            filter: self.filter,
            iter: None,
            state: EnumeratorState::Created,
        })
    }
}

/// Directional, boundable, filterable traversal over the key space.
///
/// Synchronous and blocking: the per-item callback runs on the caller's
/// thread in engine-iteration order, one item at a time. Not thread-safe for
/// concurrent use — each enumerator belongs to a single logical caller.
///
/// Enumeration is not transactional: entries already delivered remain valid
/// when a later engine step fails.
pub struct Enumerator<C: Codec> {
    store: Arc<StoreInner<C>>,
    source: ScanSource,
    direction: Direction,
    start: Option<Key>,
    prefix: Option<Key>,
    filter: Option<ScanPredicate<C>>,
    iter: Option<EngineIter>,
    state: EnumeratorState,
}

impl<C: Codec> Enumerator<C> {
    /// Current state-machine position.
    #[inline]
    pub fn state(&self) -> EnumeratorState {
        self.state
    }

    /// Traversal direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns true once the engine iterator handle has been dropped.
    #[inline]
    pub fn released(&self) -> bool {
        self.iter.is_none()
    }

    /// Releases the engine iterator without waiting for exhaustion.
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            self.finish(EnumeratorState::Stopped);
        }
    }

    /// Visits each traversed key.
    ///
    /// The value is never read or decoded unless a value predicate was
    /// installed. Returning [`ScanControl::Stop`] halts the scan after the
    /// current item with no further engine reads.
    pub fn for_each_key<F>(&mut self, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&Key) -> StoreResult<ScanControl>,
    {
        self.for_each_lazy(|key, _value| f(key))
    }

    /// Visits each traversed entry with an eagerly decoded value.
    pub fn for_each<F>(&mut self, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&Key, &C::Value) -> StoreResult<ScanControl>,
    {
        self.for_each_lazy(|key, lazy| {
            let value = lazy.get()?;
            f(key, value)
        })
    }

    /// Visits each traversed entry with a deferred-value accessor.
    ///
    /// Decode cost is paid only if the accessor is invoked, by the filter or
    /// by the callback, and at most once per entry.
    pub fn for_each_lazy<F>(&mut self, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&Key, &LazyValue<'_, C>) -> StoreResult<ScanControl>,
    {
        let store = Arc::clone(&self.store);
        let codec = store.codec();
        let mut filter = self.filter.take();

        let outcome = loop {
            let (key, raw) = match self.next_raw() {
                Ok(Some(entry)) => entry,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            };

            let lazy = LazyValue::new(&key, &raw, codec);
            if let Some(predicate) = filter.as_mut() {
                match predicate(&key, &lazy) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => {
                        self.finish(EnumeratorState::Stopped);
                        break Err(err);
                    }
                }
            }

            match f(&key, &lazy) {
                Ok(ScanControl::Continue) => {}
                Ok(ScanControl::Stop) => {
                    self.finish(EnumeratorState::Stopped);
                    break Ok(());
                }
                Err(err) => {
                    self.finish(EnumeratorState::Stopped);
                    break Err(err);
                }
            }
        };

        self.filter = filter;
        outcome
    }

    /// Creates and seeks the engine iterator according to the traversal
    /// plan.
    fn position(&mut self) -> StoreResult<()> {
        if self.store.is_closed() {
            self.finish(EnumeratorState::Failed);
            return Err(StoreError::use_after_release("store"));
        }

        let backward = self.direction == Direction::Backward;
        let iter = match (&self.start, &self.prefix) {
            (Some(start), _) => {
                let start = start.as_bytes().to_vec();
                let bounds = if backward {
                    (Unbounded, Included(start))
                } else {
                    (Included(start), Unbounded)
                };
                self.source.range(bounds, backward)
            }
            (None, Some(prefix)) => self.source.prefix(prefix, backward),
            (None, None) => self.source.range((Unbounded, Unbounded), backward),
        };

        self.iter = Some(iter);
        self.state = EnumeratorState::Positioned;
        Ok(())
    }

    /// Pulls the next raw entry inside the prefix bound.
    ///
    /// Handles every state transition except consumer-driven stops; `None`
    /// means the enumerator reached a terminal state.
    fn next_raw(&mut self) -> StoreResult<Option<(Key, Slice)>> {
        match self.state {
            EnumeratorState::Exhausted | EnumeratorState::Stopped | EnumeratorState::Failed => {
                return Ok(None)
            }
            EnumeratorState::Created => self.position()?,
            EnumeratorState::Positioned | EnumeratorState::Advancing => {}
        }

        if self.store.is_closed() {
            self.finish(EnumeratorState::Failed);
            return Err(StoreError::use_after_release("store"));
        }

        let iter = match self.iter.as_mut() {
            Some(iter) => iter,
            None => {
                self.finish(EnumeratorState::Exhausted);
                return Ok(None);
            }
        };

        match iter.next() {
            None => {
                self.finish(EnumeratorState::Exhausted);
                Ok(None)
            }
            Some(Err(err)) => {
                log::error!(
                    "Enumeration over store {} failed: {}",
                    self.store.name(),
                    err
                );
                self.finish(EnumeratorState::Failed);
                Err(enumeration_error(err))
            }
            Some(Ok((key, value))) => {
                let key = Key::from(&key[..]);
                if let Some(prefix) = &self.prefix {
                    // hard bound, not a filter
                    if !key.starts_with(prefix) {
                        self.finish(EnumeratorState::Exhausted);
                        return Ok(None);
                    }
                }
                self.state = EnumeratorState::Advancing;
                Ok(Some((key, value)))
            }
        }
    }

    fn finish(&mut self, state: EnumeratorState) {
        self.iter = None;
        self.state = state;
    }
}
