use crate::codec::Key;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for all fallible lodestore operations.
///
/// A missing key is *not* an error: `get`/`exists` return `Ok(None)` /
/// `Ok(false)` for absent keys. Every variant here describes a failure the
/// caller must handle, not an empty result.
///
/// Retry guidance follows the variant: `BatchApply` guarantees the store
/// state is unchanged, so idempotent batches may be retried; `Decode` and
/// `Enumeration` will not resolve by retrying since the underlying cause
/// (corrupt bytes, I/O fault) is persistent; `UseAfterRelease` is always a
/// programmer error.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store path does not exist and `create_if_missing` is disabled.
    #[error("no store at {path:?} and create_if_missing is disabled")]
    MissingDatabase { path: PathBuf },

    /// The store path already holds data and `error_if_exists` is enabled.
    #[error("store already exists at {path:?} and error_if_exists is enabled")]
    AlreadyExists { path: PathBuf },

    /// The engine reported corruption beyond the configured tolerance.
    #[error("store corrupted: {details}")]
    Corruption { details: String },

    /// The codec could not interpret stored bytes for a key.
    #[error("failed to decode value for key {key}: {details}")]
    Decode { key: Key, details: String },

    /// The codec could not serialize a value for a key.
    #[error("failed to encode value for key {key}: {details}")]
    Encode { key: Key, details: String },

    /// The engine iterator became invalid mid-scan.
    #[error("enumeration failed: {details}")]
    Enumeration { details: String },

    /// An atomic batch commit was rejected; the store state is unchanged.
    #[error("batch apply failed: {details}")]
    BatchApply { details: String },

    /// A snapshot or store resource was accessed after release/close.
    #[error("{resource} used after release")]
    UseAfterRelease { resource: &'static str },

    /// An engine fault not covered by a more specific variant.
    #[error("storage engine error: {details}")]
    Backend { details: String },

    /// Filesystem error while destroying persisted state.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Shorthand for the use-after-release programmer error.
    #[inline]
    pub(crate) fn use_after_release(resource: &'static str) -> StoreError {
        StoreError::UseAfterRelease { resource }
    }
}

/// Result alias used by every fallible lodestore operation.
pub type StoreResult<T> = Result<T, StoreError>;

/// Maps an engine error to the store taxonomy.
///
/// Classification is by message, the same way the engine's own error surface
/// is stringly-typed across its subcrates; corruption is promoted to its own
/// variant so open-time paranoid checks can distinguish it.
pub(crate) fn engine_error(err: fjall::Error) -> StoreError {
    let details = err.to_string();
    if details.contains("corrupt") || details.contains("Corrupt") {
        return StoreError::Corruption { details };
    }
    StoreError::Backend { details }
}

/// Maps an engine iterator error to `StoreError::Enumeration`.
#[inline]
pub(crate) fn enumeration_error(err: fjall::Error) -> StoreError {
    StoreError::Enumeration {
        details: err.to_string(),
    }
}

/// Maps an engine batch-commit error to `StoreError::BatchApply`.
#[inline]
pub(crate) fn batch_error(err: fjall::Error) -> StoreError {
    StoreError::BatchApply {
        details: err.to_string(),
    }
}
