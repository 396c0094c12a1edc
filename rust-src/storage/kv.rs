//! Minimal key-value stores used by the document backend.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

#[cfg(test)]
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
};
#[cfg(test)]
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use super::StorageError;


/// String values under string keys.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`. On error the previous value is kept.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Exclusive access to `key` for a read-modify-write, blocking until free.
    ///
    /// Holders of the same key in other handles or processes wait for the
    /// returned guard to drop.
    fn lock(&self, key: &str) -> Result<KeyLock, StorageError>;
}


/// Released on drop.
pub struct KeyLock {
    _held: Held,
}


enum Held {
    File { _file: fs::File },
    #[cfg(test)]
    Memory { _guard: ArcMutexGuard<RawMutex, ()> },
}


/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}


impl FileKeyValueStore {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        if !valid {
            return Err(StorageError::InvalidValue(format!("unusable storage key {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}


impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        write_atomically(&path, value)?;
        Ok(())
    }

    fn lock(&self, key: &str) -> Result<KeyLock, StorageError> {
        let path = self.path_for(key)?.with_extension("lock");
        fs::create_dir_all(&self.dir)?;

        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        Ok(KeyLock {
            _held: Held::File { _file: file },
        })
    }
}


/// Write through a temp file so readers never see a half-written value.
fn write_atomically(path: &Path, value: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(value.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;

    fs::rename(tmp, path)
}


/// In-process store. Clones share the same entries and the same write lock.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
    write_lock: Arc<Mutex<()>>,
}


#[cfg(test)]
impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `set` fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Overwrite a raw value, bypassing failure injection.
    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }
}


#[cfg(test)]
impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "writes disabled".to_string(),
            });
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn lock(&self, _key: &str) -> Result<KeyLock, StorageError> {
        Ok(KeyLock {
            _held: Held::Memory {
                _guard: self.write_lock.lock_arc(),
            },
        })
    }
}
