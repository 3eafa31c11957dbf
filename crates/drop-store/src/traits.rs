use crate::error::{StoreError, StoreResult};

/// Per-value limit applied when a backend is not given one explicitly.
pub const DEFAULT_MAX_VALUE_SIZE: usize = 128 * 1024;

/// Flat key-value storage with a maximum value size.
///
/// All implementations must satisfy these invariants:
/// - `put` rejects values larger than [`KvStore::max_value_size`] with
///   [`StoreError::ValueTooLarge`] and leaves any previous value intact.
/// - A successful `put` is durable for the backend's notion of durability
///   before it returns.
/// - The store never interprets values.
pub trait KvStore: Send + Sync {
    /// Read a value. Returns `Ok(None)` if the key is absent.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Create or replace a value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Delete a key. Returns `true` if the key existed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remove every key.
    fn delete_all(&self) -> StoreResult<()>;

    /// List keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Largest value, in bytes, accepted by `put`.
    fn max_value_size(&self) -> usize;

    /// Check whether a key exists.
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Shared size check used by every backend's `put`.
pub(crate) fn check_value_size(key: &str, size: usize, max: usize) -> StoreResult<()> {
    if size > max {
        return Err(StoreError::ValueTooLarge {
            key: key.to_string(),
            size,
            max,
        });
    }
    Ok(())
}
