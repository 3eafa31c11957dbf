//! Key-value persistence for the drop allocation ledger.
//!
//! The storage model is a flat key-value space with a hard cap on the size of
//! a single value, the way hosted actor storage behaves. Anything that can
//! grow without bound is kept in a [`ShardedList`], which splits the list
//! into fixed-size chunks addressed as `<collection>:<chunk-index>`.
//!
//! # Storage Backends
//!
//! All backends implement the [`KvStore`] trait:
//!
//! - [`InMemoryKvStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FileKvStore`] -- one file per key under a directory
//!
//! # Design Rules
//!
//! 1. Every `put` is checked against the backend's maximum value size.
//! 2. Chunks are written in increasing index order, stale chunks are removed
//!    highest index first, so an interrupted flush never leaves a gap.
//! 3. A gap in the chunk sequence is corruption and is reported, not skipped.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod codec;
pub mod error;
pub mod file;
pub mod memory;
pub mod sharded;
pub mod traits;

pub use codec::{read_json, write_json};
pub use error::{StoreError, StoreResult};
pub use file::FileKvStore;
pub use memory::InMemoryKvStore;
pub use sharded::{chunk_key, ShardedList, DEFAULT_CHUNK_SIZE};
pub use traits::{KvStore, DEFAULT_MAX_VALUE_SIZE};
