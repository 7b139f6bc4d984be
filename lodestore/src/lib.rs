//! # Lodestore — typed object layer over an embedded LSM engine
//!
//! Lodestore wraps the [fjall](https://docs.rs/fjall) LSM engine with a
//! typed, object-level client layer: pluggable value codecs, consistent
//! point-in-time reads via snapshots, filtered and directional enumeration
//! over the key space, atomic multi-key write batches, and a store-scoped
//! publish/subscribe mechanism that turns committed mutations into change
//! notifications.
//!
//! ## Key Features
//!
//! - **Embedded**: all reads and writes are local, synchronous calls into
//!   the engine — no server process
//! - **Typed access**: values pass through a pluggable [`Codec`];
//!   [`BincodeCodec`] is the serde-based default
//! - **Snapshots**: O(1) point-in-time views, isolated from later mutations
//! - **Enumeration**: directional, seekable, prefix-bounded, predicate
//!   filtered scans with deferred value decoding
//! - **Atomic batches**: grouped mutations apply all-or-nothing and share
//!   the durability and notification path of single-key writes
//! - **Change events**: post-commit notification by exact key or unfiltered
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lodestore::{BincodeCodec, ScanControl, Store, StoreConfig};
//!
//! # fn main() -> lodestore::StoreResult<()> {
//! let config = StoreConfig::new();
//! config.set_path("/tmp/inventory");
//!
//! let store = Store::open(config, BincodeCodec::<String>::new())?;
//! store.put("user:1", "ada".to_string())?;
//!
//! let snapshot = store.snapshot()?;
//! store.put("user:1", "grace".to_string())?;
//! assert_eq!(snapshot.get("user:1")?, Some("ada".to_string()));
//!
//! let mut scan = store.enumerator()?.prefix("user:").build()?;
//! scan.for_each(|key, value| {
//!     println!("{} -> {}", key, value);
//!     Ok(ScanControl::Continue)
//! })?;
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod codec;
mod config;
mod enumerator;
mod errors;
mod events;
mod snapshot;
mod store;
mod version;

pub use batch::WriteBatch;
pub use codec::{BincodeCodec, Codec, Key};
pub use config::StoreConfig;
pub use enumerator::{
    Direction, Enumerator, EnumeratorBuilder, EnumeratorState, LazyValue, ScanControl,
    ScanPredicate,
};
pub use errors::{StoreError, StoreResult};
pub use events::{ChangeEvent, ChangeListener, ChangeNotifier, KeyFilter, SubscriberRef};
pub use snapshot::Snapshot;
pub use store::Store;
