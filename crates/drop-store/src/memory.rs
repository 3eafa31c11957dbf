use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_value_size, KvStore, DEFAULT_MAX_VALUE_SIZE};

/// In-memory, `BTreeMap`-based key-value store.
///
/// Intended for tests and embedding. Values are held behind a `RwLock` and
/// cloned on read. The store can be switched to read-only to exercise
/// storage-failure paths.
pub struct InMemoryKvStore {
    values: RwLock<BTreeMap<String, Vec<u8>>>,
    max_value_size: usize,
    read_only: AtomicBool,
    puts: AtomicU64,
}

impl InMemoryKvStore {
    /// Create a new empty store with the default value-size limit.
    pub fn new() -> Self {
        Self::with_max_value_size(DEFAULT_MAX_VALUE_SIZE)
    }

    /// Create a new empty store with a custom value-size limit.
    pub fn with_max_value_size(max_value_size: usize) -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            max_value_size,
            read_only: AtomicBool::new(false),
            puts: AtomicU64::new(0),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful `put` calls since creation.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Reject all writes and deletes with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.ensure_writable()?;
        check_value_size(key, value.len(), self.max_value_size)?;
        let mut map = self.values.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_vec());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.ensure_writable()?;
        let mut map = self.values.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.remove(key).is_some())
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.ensure_writable()?;
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .field("max_value_size", &self.max_value_size)
            .finish()
    }
}
