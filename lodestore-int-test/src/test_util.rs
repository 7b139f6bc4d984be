use lodestore::{BincodeCodec, Store, StoreConfig};
use std::path::PathBuf;
use std::time::Duration;
use std::{fs, thread};

/// Returns a unique store path under the shared test-data directory.
pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    PathBuf::from("../test-data")
        .join(id.to_string())
        .to_str()
        .unwrap()
        .to_string()
}

/// A default configuration pointing at `path`.
pub fn test_config(path: &str) -> StoreConfig {
    let config = StoreConfig::new();
    config.set_path(path);
    config
}

/// Opens a fresh string-valued store at `path` with the default codec.
pub fn string_store(path: &str) -> Store<BincodeCodec<String>> {
    Store::open(test_config(path), BincodeCodec::new()).expect("Failed to open test store")
}

/// Removes the store directory, retrying briefly while the engine lets go
/// of its files.
pub fn cleanup(path: &str) {
    let mut retry = 0;
    while fs::remove_dir_all(path).is_err() && retry < 2 {
        thread::sleep(Duration::from_millis(100));
        retry += 1;
    }
}
