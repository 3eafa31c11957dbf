//! Chunking of unbounded lists over a size-limited [`KvStore`].
//!
//! A list named `items` with chunk size 100 and 250 small entries is stored
//! as three records: `items:0` (100 entries), `items:1` (100) and `items:2`
//! (50). A chunk is closed early when the next entry would push its encoded
//! size past the store's [`KvStore::max_value_size`], so large entries make
//! for more, shorter chunks. Loading reads `items:0`, `items:1`, ... until
//! the first absent chunk. A present chunk above that point means the
//! sequence has a hole, which is reported as [`StoreError::ShardGap`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::{encode_json, read_json};
use crate::error::{StoreError, StoreResult};
use crate::traits::KvStore;

/// Default maximum number of entries per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Storage key of chunk `index` of `collection`.
pub fn chunk_key(collection: &str, index: usize) -> String {
    format!("{collection}:{index}")
}

fn parse_chunk_index(collection: &str, key: &str) -> Option<usize> {
    key.strip_prefix(collection)?
        .strip_prefix(':')?
        .parse()
        .ok()
}

/// An ordered list persisted as size-bounded chunks.
///
/// The full list is mirrored in memory. Mutations record the first entry
/// they touch; [`ShardedList::flush`] rewrites chunks from the one holding
/// that entry to the end and removes chunks that fell off the tail.
pub struct ShardedList<T> {
    store: Arc<dyn KvStore>,
    collection: String,
    chunk_size: usize,
    entries: Vec<T>,
    /// Entry count of each chunk present in the store.
    chunk_lens: Vec<usize>,
    /// Index of the first entry changed since the last flush.
    dirty_from: Option<usize>,
    legacy_record: bool,
}

impl<T> ShardedList<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Load a collection from the store.
    ///
    /// A bare `<collection>` record left by the pre-chunking layout is read
    /// first and its entries are placed ahead of the chunked ones; the next
    /// flush rewrites everything in chunked form and removes it.
    pub fn open(
        store: Arc<dyn KvStore>,
        collection: impl Into<String>,
        chunk_size: usize,
    ) -> StoreResult<Self> {
        if chunk_size == 0 {
            return Err(StoreError::InvalidChunkSize(chunk_size));
        }
        let collection = collection.into();
        let mut entries = Vec::new();

        let legacy_record = match read_json::<Vec<T>>(store.as_ref(), &collection)? {
            Some(legacy) => {
                info!(
                    collection = %collection,
                    entries = legacy.len(),
                    "found un-chunked legacy record; will migrate on next flush"
                );
                entries.extend(legacy);
                true
            }
            None => false,
        };

        let mut chunk_lens = Vec::new();
        loop {
            let index = chunk_lens.len();
            let key = chunk_key(&collection, index);
            match read_json::<Vec<T>>(store.as_ref(), &key)? {
                Some(chunk) if chunk.is_empty() => {
                    return Err(StoreError::CorruptRecord {
                        key,
                        reason: "empty chunk".into(),
                    });
                }
                Some(chunk) => {
                    chunk_lens.push(chunk.len());
                    entries.extend(chunk);
                }
                None => break,
            }
        }

        let index = chunk_lens.len();
        let prefix = format!("{collection}:");
        for key in store.keys_with_prefix(&prefix)? {
            if let Some(found) = parse_chunk_index(&collection, &key) {
                if found > index {
                    return Err(StoreError::ShardGap {
                        collection,
                        missing: index,
                        found,
                    });
                }
            }
        }

        debug!(
            collection = %collection,
            shards = index,
            entries = entries.len(),
            "loaded sharded list"
        );

        Ok(Self {
            store,
            collection,
            chunk_size,
            entries,
            chunk_lens,
            dirty_from: legacy_record.then_some(0),
            legacy_record,
        })
    }

    /// Name of the collection (the key prefix of its chunks).
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Maximum number of entries per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    /// Number of chunks present in the store as of the last load or flush.
    pub fn shard_count(&self) -> usize {
        self.chunk_lens.len()
    }

    /// Whether there are changes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty_from.is_some()
    }

    /// Append one entry to the end of the list.
    pub fn append(&mut self, entry: T) {
        self.mark_dirty(self.entries.len());
        self.entries.push(entry);
    }

    /// Remove and return the last entry.
    pub fn pop(&mut self) -> Option<T> {
        let entry = self.entries.pop()?;
        self.mark_dirty(self.entries.len());
        Some(entry)
    }

    /// Keep only entries matching `keep`. Returns how many were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let Some(first_removed) = self.entries.iter().position(|e| !keep(e)) else {
            return 0;
        };
        let before = self.entries.len();
        let mut index = 0;
        self.entries.retain(|e| {
            let kept = index < first_removed || keep(e);
            index += 1;
            kept
        });
        self.mark_dirty(first_removed);
        before - self.entries.len()
    }

    /// Replace the whole list.
    pub fn replace_all(&mut self, entries: Vec<T>) {
        self.entries = entries;
        self.mark_dirty(0);
    }

    /// Drop every entry from memory. The chunks are removed on flush.
    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    /// Write dirty chunks in increasing index order, then delete chunks past
    /// the new end from the highest index down. Returns the number of chunks
    /// written.
    ///
    /// On error the list stays dirty and a later flush retries.
    pub fn flush(&mut self) -> StoreResult<usize> {
        let Some(dirty) = self.dirty_from else {
            return Ok(0);
        };
        let (mut index, mut start) = self.rewrite_start(dirty);
        let max_value_size = self.store.max_value_size();
        let mut written = 0;
        while start < self.entries.len() {
            let key = chunk_key(&self.collection, index);
            let (bytes, count) = self.encode_chunk(&key, start, max_value_size)?;
            self.store.put(&key, &bytes)?;
            match self.chunk_lens.get_mut(index) {
                Some(len) => *len = count,
                None => self.chunk_lens.push(count),
            }
            written += 1;
            index += 1;
            start += count;
        }
        let removed = self.chunk_lens.len().saturating_sub(index);
        while self.chunk_lens.len() > index {
            let last = self.chunk_lens.len() - 1;
            self.store.delete(&chunk_key(&self.collection, last))?;
            self.chunk_lens.pop();
        }
        if self.legacy_record {
            self.store.delete(&self.collection)?;
            self.legacy_record = false;
        }
        debug!(
            collection = %self.collection,
            written,
            shards = index,
            removed,
            "flushed sharded list"
        );
        self.dirty_from = None;
        Ok(written)
    }

    /// The chunk a flush starts rewriting at, and its first entry. A chunk
    /// ending exactly at `dirty` is rewritten if it has room for more
    /// entries.
    fn rewrite_start(&self, dirty: usize) -> (usize, usize) {
        let mut start = 0;
        for (index, &len) in self.chunk_lens.iter().enumerate() {
            let end = start + len;
            if dirty < end || (dirty == end && len < self.chunk_size) {
                return (index, start);
            }
            start = end;
        }
        (self.chunk_lens.len(), start)
    }

    /// Encode entries from `start` into one chunk of at most `chunk_size`
    /// entries and, unless a single entry is already too large,
    /// `max_value_size` bytes. Returns the bytes and the entry count.
    fn encode_chunk(
        &self,
        key: &str,
        start: usize,
        max_value_size: usize,
    ) -> StoreResult<(Vec<u8>, usize)> {
        let mut bytes = vec![b'['];
        let mut count = 0;
        for entry in self.entries[start..].iter().take(self.chunk_size) {
            let encoded = encode_json(key, entry)?;
            if count > 0 {
                // Separator, entry and closing bracket must still fit.
                if bytes.len() + encoded.len() + 2 > max_value_size {
                    break;
                }
                bytes.push(b',');
            }
            bytes.extend_from_slice(&encoded);
            count += 1;
        }
        bytes.push(b']');
        Ok((bytes, count))
    }

    fn mark_dirty(&mut self, entry: usize) {
        self.dirty_from = Some(match self.dirty_from {
            Some(current) => current.min(entry),
            None => entry,
        });
    }
}

impl<T> std::fmt::Debug for ShardedList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedList")
            .field("collection", &self.collection)
            .field("chunk_size", &self.chunk_size)
            .field("len", &self.entries.len())
            .field("chunk_lens", &self.chunk_lens)
            .field("dirty_from", &self.dirty_from)
            .finish()
    }
}
