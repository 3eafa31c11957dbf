/// Errors from key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The encoded value exceeds the backend's per-record limit.
    #[error("value for {key} is {size} bytes, limit is {max}")]
    ValueTooLarge { key: String, size: usize, max: usize },

    /// Serialization or deserialization failure.
    #[error("serialization error for {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk is missing while a higher-indexed chunk of the same
    /// collection is present.
    #[error("collection {collection} has a gap: chunk {missing} absent but chunk {found} present")]
    ShardGap {
        collection: String,
        missing: usize,
        found: usize,
    },

    /// A stored record decoded but violates the layout it belongs to.
    #[error("corrupt record {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Chunk size must be at least one entry.
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    /// Storage backend is read-only or otherwise unavailable.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
