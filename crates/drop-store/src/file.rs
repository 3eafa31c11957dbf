use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_value_size, KvStore, DEFAULT_MAX_VALUE_SIZE};

/// Length of a record file name: a hex-encoded BLAKE3 digest.
const RECORD_NAME_LEN: usize = 64;

/// Directory-backed key-value store.
///
/// Each key is one file named after the BLAKE3 digest of the key, so file
/// names have a fixed length whatever the key. The file starts with the
/// hex-encoded key on its own line, followed by the value. Writes go to a
/// temporary file in the same directory which is synced and then renamed
/// over the target, and the directory is synced after the rename, so a
/// reader sees either the old value or the new one, never a torn write.
#[derive(Debug)]
pub struct FileKvStore {
    root: PathBuf,
    max_value_size: usize,
}

impl FileKvStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_max_value_size(root, DEFAULT_MAX_VALUE_SIZE)
    }

    /// Open (or create) a store with a custom value-size limit.
    pub fn open_with_max_value_size(
        root: impl AsRef<Path>,
        max_value_size: usize,
    ) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file store");
        Ok(Self {
            root,
            max_value_size,
        })
    }

    /// Directory holding the store's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(blake3::hash(key.as_bytes()).to_hex().as_str())
    }

    /// Split a record file into its key and value.
    fn decode_record(bytes: &[u8]) -> Option<(String, &[u8])> {
        let newline = bytes.iter().position(|b| *b == b'\n')?;
        let key = String::from_utf8(hex::decode(&bytes[..newline]).ok()?).ok()?;
        Some((key, &bytes[newline + 1..]))
    }

    /// Read just the key header of a record file. Foreign files (temporary
    /// files, editor droppings) have no valid header and yield `None`.
    fn read_key(path: &Path) -> StoreResult<Option<String>> {
        let mut header = Vec::new();
        BufReader::new(fs::File::open(path)?).read_until(b'\n', &mut header)?;
        if header.pop() != Some(b'\n') {
            return Ok(None);
        }
        Ok(hex::decode(&header)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok()))
    }

    fn stored_keys(&self) -> StoreResult<Vec<(String, PathBuf)>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let is_record = name.to_str().is_some_and(|name| {
                name.len() == RECORD_NAME_LEN && name.bytes().all(|b| b.is_ascii_hexdigit())
            });
            if !is_record {
                continue;
            }
            let path = entry.path();
            if let Some(key) = Self::read_key(&path)? {
                keys.push((key, path));
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Make renames and removals in the root directory durable.
    #[cfg(unix)]
    fn sync_root(&self) -> StoreResult<()> {
        fs::File::open(&self.root)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_root(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match Self::decode_record(&bytes) {
            Some((stored, value)) if stored == key => Ok(Some(value.to_vec())),
            Some((stored, _)) => Err(StoreError::CorruptRecord {
                key: key.to_string(),
                reason: format!("file holds record for {stored}"),
            }),
            None => Err(StoreError::CorruptRecord {
                key: key.to_string(),
                reason: "missing key header".into(),
            }),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        check_value_size(key, value.len(), self.max_value_size)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(hex::encode(key.as_bytes()).as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.write_all(value)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        self.sync_root()
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                self.sync_root()?;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_all(&self) -> StoreResult<()> {
        let keys = self.stored_keys()?;
        let count = keys.len();
        for (key, path) in keys {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(key = %key, error = %e, "failed to remove record during wipe");
                    return Err(e.into());
                }
            }
        }
        self.sync_root()?;
        debug!(root = %self.root.display(), removed = count, "wiped file store");
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .stored_keys()?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        store.put("idx:wallet:alice.near", b"{}").unwrap();
        assert_eq!(
            store.get("idx:wallet:alice.near").unwrap(),
            Some(b"{}".to_vec())
        );
        assert!(store.delete("idx:wallet:alice.near").unwrap());
        assert!(!store.delete("idx:wallet:alice.near").unwrap());
        assert!(store.get("idx:wallet:alice.near").unwrap().is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileKvStore::open(dir.path()).unwrap();
            store.put("claims:0", b"[1,2]").unwrap();
        }
        let store = FileKvStore::open(dir.path()).unwrap();
        assert_eq!(store.get("claims:0").unwrap(), Some(b"[1,2]".to_vec()));
    }

    #[test]
    fn oversized_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open_with_max_value_size(dir.path(), 3).unwrap();
        let err = store.put("k", b"abcd").unwrap_err();
        assert!(matches!(err, StoreError::ValueTooLarge { .. }));
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn prefix_listing_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        store.put("items:0", b"[]").unwrap();
        store.put("items:1", b"[]").unwrap();
        store.put("claims:0", b"[]").unwrap();
        fs::write(dir.path().join("README.txt"), b"not a record").unwrap();

        assert_eq!(
            store.keys_with_prefix("items:").unwrap(),
            vec!["items:0".to_string(), "items:1".to_string()]
        );
        assert_eq!(store.keys_with_prefix("").unwrap().len(), 3);
    }

    #[test]
    fn delete_all_keeps_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();
        fs::write(dir.path().join("notes"), b"keep").unwrap();
        store.delete_all().unwrap();
        assert!(store.keys_with_prefix("").unwrap().is_empty());
        assert!(dir.path().join("notes").exists());
    }

    #[test]
    fn long_keys_use_fixed_length_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        let key = format!("idx:discord:{}", "d".repeat(256));
        store.put(&key, b"{}").unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.keys_with_prefix("idx:discord:").unwrap(), vec![key.clone()]);

        let name = fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .file_name();
        assert_eq!(name.len(), RECORD_NAME_LEN);
        assert!(store.delete(&key).unwrap());
    }

    #[test]
    fn record_with_wrong_header_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        store.put("a", b"1").unwrap();
        fs::copy(store.path_for("a"), store.path_for("b")).unwrap();
        assert!(matches!(
            store.get("b").unwrap_err(),
            StoreError::CorruptRecord { key, .. } if key == "b"
        ));
    }
}
