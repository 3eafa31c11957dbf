//! JSON encoding of typed records on top of a byte-oriented [`KvStore`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::traits::KvStore;

/// Read and decode a JSON record. Returns `Ok(None)` if the key is absent.
pub fn read_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> StoreResult<Option<T>> {
    match store.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Encode a record as JSON and store it.
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let bytes = encode_json(key, value)?;
    store.put(key, &bytes)
}

/// Encode a value as compact JSON, attributing failures to `key`.
pub(crate) fn encode_json<T: Serialize + ?Sized>(key: &str, value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
