use fjall::{CompressionType, Config, PartitionCreateOptions};
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Clone)]
/// Store configuration.
///
/// A cloneable, thread-safe configuration holder for a store's open-time and
/// runtime parameters. Uses PIMPL with `Arc<StoreConfigInner>` so clones are
/// cheap and every handle observes the same settings; each parameter uses an
/// atomic for lock-free access.
///
/// Two groups of settings live here:
/// - open semantics: `path`, `name`, `create_if_missing`, `error_if_exists`,
///   `paranoid_checks`
/// - engine tuning: compression, block cache capacity, bloom filter bits,
///   block size, memtable and write buffer sizing
///
/// `safe` selects the durability mode for every write path (single-key ops
/// and batches alike): when set, each commit is followed by a full sync of
/// the engine journal before the call returns and before any change
/// notification is dispatched.
pub struct StoreConfig {
    inner: Arc<StoreConfigInner>,
}

impl StoreConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults: create-if-missing on, error-if-exists off, paranoid checks
    /// off, unsafe (buffered) durability, LZ4 compression, 64 MB block
    /// cache, bloom filters at 10 bits per key, 4 KB blocks, 32 MB
    /// memtables, 128 MB write buffer, persist-on-close on.
    #[inline]
    pub fn new() -> StoreConfig {
        StoreConfig {
            inner: Arc::new(StoreConfigInner::new()),
        }
    }

    /// Builds the engine keyspace configuration from this config.
    #[inline]
    pub(crate) fn keyspace_config(&self) -> Config {
        Config::new(self.inner.path())
            .cache_size(self.inner.block_cache_capacity())
            .max_write_buffer_size(self.inner.max_write_buffer_size())
    }

    /// Builds the engine partition configuration from this config.
    #[inline]
    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        let bits = self.inner.bloom_filter_bits();
        PartitionCreateOptions::default()
            .bloom_filter_bits(if bits < 0 { None } else { Some(bits as u8) })
            .compression(if self.inner.compression() {
                CompressionType::Lz4
            } else {
                CompressionType::None
            })
            .max_memtable_size(self.inner.max_memtable_size())
            .block_size(self.inner.block_size())
    }

    /// Returns the filesystem path of the store.
    #[inline]
    pub fn path(&self) -> &str {
        self.inner.path()
    }

    /// Sets the filesystem path of the store. First write wins.
    #[inline]
    pub fn set_path(&self, path: &str) {
        self.inner.set_path(path)
    }

    /// Returns the logical store name.
    #[inline]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Sets the logical store name. First write wins.
    #[inline]
    pub fn set_name(&self, name: &str) {
        self.inner.set_name(name)
    }

    /// Returns whether a missing store is created on open.
    #[inline]
    pub fn create_if_missing(&self) -> bool {
        self.inner.create_if_missing.load(Ordering::Relaxed)
    }

    /// Sets whether a missing store is created on open.
    #[inline]
    pub fn set_create_if_missing(&self, v: bool) {
        self.inner.create_if_missing.store(v, Ordering::Relaxed)
    }

    /// Returns whether open fails when data already exists at the path.
    #[inline]
    pub fn error_if_exists(&self) -> bool {
        self.inner.error_if_exists.load(Ordering::Relaxed)
    }

    /// Sets whether open fails when data already exists at the path.
    #[inline]
    pub fn set_error_if_exists(&self, v: bool) {
        self.inner.error_if_exists.store(v, Ordering::Relaxed)
    }

    /// Returns whether open-time integrity probing is fatal.
    #[inline]
    pub fn paranoid_checks(&self) -> bool {
        self.inner.paranoid_checks.load(Ordering::Relaxed)
    }

    /// Sets whether open-time integrity probing is fatal.
    #[inline]
    pub fn set_paranoid_checks(&self, v: bool) {
        self.inner.paranoid_checks.store(v, Ordering::Relaxed)
    }

    /// Returns the durability mode: true syncs the journal on every commit.
    #[inline]
    pub fn safe(&self) -> bool {
        self.inner.safe.load(Ordering::Relaxed)
    }

    /// Sets the durability mode.
    #[inline]
    pub fn set_safe(&self, v: bool) {
        self.inner.safe.store(v, Ordering::Relaxed)
    }

    /// Returns whether close persists buffered writes first.
    #[inline]
    pub fn commit_before_close(&self) -> bool {
        self.inner.commit_before_close.load(Ordering::Relaxed)
    }

    /// Sets whether close persists buffered writes first.
    #[inline]
    pub fn set_commit_before_close(&self, v: bool) {
        self.inner.commit_before_close.store(v, Ordering::Relaxed)
    }

    /// Returns whether on-disk blocks are compressed.
    #[inline]
    pub fn compression(&self) -> bool {
        self.inner.compression()
    }

    /// Sets whether on-disk blocks are compressed.
    #[inline]
    pub fn set_compression(&self, v: bool) {
        self.inner.compression.store(v, Ordering::Relaxed)
    }

    /// Returns the block cache capacity in bytes.
    #[inline]
    pub fn block_cache_capacity(&self) -> u64 {
        self.inner.block_cache_capacity()
    }

    /// Sets the block cache capacity in bytes.
    #[inline]
    pub fn set_block_cache_capacity(&self, c: u64) {
        self.inner.block_cache_capacity.store(c, Ordering::Relaxed)
    }

    /// Returns the bloom filter bits per key; negative disables the filter.
    #[inline]
    pub fn bloom_filter_bits(&self) -> i8 {
        self.inner.bloom_filter_bits()
    }

    /// Sets the bloom filter bits per key; negative disables the filter.
    #[inline]
    pub fn set_bloom_filter_bits(&self, bits: i8) {
        self.inner.bloom_filter_bits.store(bits, Ordering::Relaxed)
    }

    /// Returns the on-disk block size in bytes.
    #[inline]
    pub fn block_size(&self) -> u32 {
        self.inner.block_size()
    }

    /// Sets the on-disk block size in bytes.
    #[inline]
    pub fn set_block_size(&self, s: u32) {
        self.inner.block_size.store(s, Ordering::Relaxed)
    }

    /// Returns the maximum memtable size in bytes.
    #[inline]
    pub fn max_memtable_size(&self) -> u32 {
        self.inner.max_memtable_size()
    }

    /// Sets the maximum memtable size in bytes.
    #[inline]
    pub fn set_max_memtable_size(&self, s: u32) {
        self.inner.max_memtable_size.store(s, Ordering::Relaxed)
    }

    /// Returns the maximum write buffer size in bytes.
    #[inline]
    pub fn max_write_buffer_size(&self) -> u64 {
        self.inner.max_write_buffer_size()
    }

    /// Sets the maximum write buffer size in bytes.
    #[inline]
    pub fn set_max_write_buffer_size(&self, s: u64) {
        self.inner.max_write_buffer_size.store(s, Ordering::Relaxed)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct StoreConfigInner {
    path: OnceLock<String>,
    name: OnceLock<String>,
    create_if_missing: AtomicBool,
    error_if_exists: AtomicBool,
    paranoid_checks: AtomicBool,
    safe: AtomicBool,
    commit_before_close: AtomicBool,
    compression: AtomicBool,
    block_cache_capacity: AtomicU64,
    bloom_filter_bits: AtomicI8,
    block_size: AtomicU32,
    max_memtable_size: AtomicU32,
    max_write_buffer_size: AtomicU64,
}

impl StoreConfigInner {
    /// Default block cache size: 64 MB.
    const DEFAULT_BLOCK_CACHE_MB: u64 = 64;

    /// Default memtable size: 32 MB.
    const DEFAULT_MEMTABLE_MB: u32 = 32;

    /// Default write buffer size: 128 MB.
    const DEFAULT_WRITE_BUFFER_MB: u64 = 128;

    fn new() -> StoreConfigInner {
        StoreConfigInner {
            path: OnceLock::new(),
            name: OnceLock::new(),
            create_if_missing: AtomicBool::new(true),
            error_if_exists: AtomicBool::new(false),
            paranoid_checks: AtomicBool::new(false),
            safe: AtomicBool::new(false),
            commit_before_close: AtomicBool::new(true),
            compression: AtomicBool::new(true),
            block_cache_capacity: AtomicU64::new(Self::DEFAULT_BLOCK_CACHE_MB * 1_024 * 1_024),
            bloom_filter_bits: AtomicI8::new(10),
            block_size: AtomicU32::new(4 * 1_024),
            max_memtable_size: AtomicU32::new(Self::DEFAULT_MEMTABLE_MB * 1_024 * 1_024),
            max_write_buffer_size: AtomicU64::new(Self::DEFAULT_WRITE_BUFFER_MB * 1_024 * 1_024),
        }
    }

    #[inline]
    fn path(&self) -> &str {
        self.path.get_or_init(String::new).as_str()
    }

    #[inline]
    fn set_path(&self, path: &str) {
        self.path.get_or_init(|| path.to_string());
    }

    #[inline]
    fn name(&self) -> &str {
        self.name.get_or_init(String::new).as_str()
    }

    #[inline]
    fn set_name(&self, name: &str) {
        self.name.get_or_init(|| name.to_string());
    }

    #[inline]
    fn compression(&self) -> bool {
        self.compression.load(Ordering::Relaxed)
    }

    #[inline]
    fn block_cache_capacity(&self) -> u64 {
        self.block_cache_capacity.load(Ordering::Relaxed)
    }

    #[inline]
    fn bloom_filter_bits(&self) -> i8 {
        self.bloom_filter_bits.load(Ordering::Relaxed)
    }

    #[inline]
    fn block_size(&self) -> u32 {
        self.block_size.load(Ordering::Relaxed)
    }

    #[inline]
    fn max_memtable_size(&self) -> u32 {
        self.max_memtable_size.load(Ordering::Relaxed)
    }

    #[inline]
    fn max_write_buffer_size(&self) -> u64 {
        self.max_write_buffer_size.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::new();
        assert_eq!(config.path(), "");
        assert_eq!(config.name(), "");
        assert!(config.create_if_missing());
        assert!(!config.error_if_exists());
        assert!(!config.paranoid_checks());
        assert!(!config.safe());
        assert!(config.commit_before_close());
        assert!(config.compression());
        assert_eq!(config.block_cache_capacity(), 64 * 1_024 * 1_024);
        assert_eq!(config.bloom_filter_bits(), 10);
        assert_eq!(config.block_size(), 4 * 1_024);
        assert_eq!(config.max_memtable_size(), 32 * 1_024 * 1_024);
        assert_eq!(config.max_write_buffer_size(), 128 * 1_024 * 1_024);
    }

    #[test]
    fn test_setters_and_getters() {
        let config = StoreConfig::new();
        config.set_path("some/where");
        assert_eq!(config.path(), "some/where");

        config.set_name("inventory");
        assert_eq!(config.name(), "inventory");

        config.set_create_if_missing(false);
        assert!(!config.create_if_missing());

        config.set_error_if_exists(true);
        assert!(config.error_if_exists());

        config.set_paranoid_checks(true);
        assert!(config.paranoid_checks());

        config.set_safe(true);
        assert!(config.safe());

        config.set_commit_before_close(false);
        assert!(!config.commit_before_close());

        config.set_compression(false);
        assert!(!config.compression());

        config.set_block_cache_capacity(8 * 1_024 * 1_024);
        assert_eq!(config.block_cache_capacity(), 8 * 1_024 * 1_024);

        config.set_bloom_filter_bits(-1);
        assert_eq!(config.bloom_filter_bits(), -1);

        config.set_block_size(8 * 1_024);
        assert_eq!(config.block_size(), 8 * 1_024);

        config.set_max_memtable_size(16 * 1_024 * 1_024);
        assert_eq!(config.max_memtable_size(), 16 * 1_024 * 1_024);

        config.set_max_write_buffer_size(64 * 1_024 * 1_024);
        assert_eq!(config.max_write_buffer_size(), 64 * 1_024 * 1_024);
    }

    #[test]
    fn test_path_first_write_wins() {
        let config = StoreConfig::new();
        config.set_path("first");
        config.set_path("second");
        assert_eq!(config.path(), "first");
    }

    #[test]
    fn test_clones_share_settings() {
        let config = StoreConfig::new();
        let clone = config.clone();
        clone.set_safe(true);
        assert!(config.safe());
    }
}
