//! Keyed object store hosting bucket filters.
//!
//! The filter engine has no locking of its own. The store keeps one mutex
//! per key and holds it for exactly one operation, so distinct keys can be
//! worked on concurrently while a single key is always serialized.
use crate::bbloom::{BucketFilter, BucketFilterConfig};
use crate::error::{BucketError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Value held under a key.
pub enum StoredValue {
    Bucket(BucketFilter),
    /// Any value type other than a bucket filter. Kept as opaque bytes.
    Foreign(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Empty,
    WrongType,
    BucketFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Never creates an entry; an absent key stays absent.
    Read,
    /// Creates an empty entry for an absent key so a filter can be stored.
    OpenOrCreate,
}

/// Access to one key for the duration of a single operation.
pub struct KeyHandle<'a> {
    key: &'a [u8],
    value: &'a mut Option<StoredValue>,
    config: &'a BucketFilterConfig,
    writable: bool,
}

impl KeyHandle<'_> {
    pub fn key(&self) -> &[u8] {
        self.key
    }

    pub fn key_type(&self) -> KeyType {
        match &*self.value {
            None => KeyType::Empty,
            Some(StoredValue::Bucket(_)) => KeyType::BucketFilter,
            Some(StoredValue::Foreign(_)) => KeyType::WrongType,
        }
    }

    /// The stored filter, `None` for an empty key, `TypeMismatch` if the key
    /// holds something else.
    pub fn filter(&self) -> Result<Option<&BucketFilter>> {
        match self.value.as_ref() {
            None => Ok(None),
            Some(StoredValue::Bucket(filter)) => Ok(Some(filter)),
            Some(StoredValue::Foreign(_)) => Err(type_mismatch(self.key)),
        }
    }

    pub fn filter_mut(&mut self) -> Result<Option<&mut BucketFilter>> {
        match self.value.as_mut() {
            None => Ok(None),
            Some(StoredValue::Bucket(filter)) => Ok(Some(filter)),
            Some(StoredValue::Foreign(_)) => Err(type_mismatch(self.key)),
        }
    }

    pub fn set_filter(&mut self, filter: BucketFilter) -> Result<()> {
        self.ensure_writable()?;
        *self.value = Some(StoredValue::Bucket(filter));
        Ok(())
    }

    /// Returns the stored filter, creating one from the store's default
    /// config if the key is empty.
    pub fn filter_or_create(&mut self) -> Result<&mut BucketFilter> {
        if self.key_type() == KeyType::Empty {
            self.ensure_writable()?;
            debug!(key = %String::from_utf8_lossy(self.key), "creating filter on first insert");
            let filter = BucketFilter::new(self.config.clone())?;
            *self.value = Some(StoredValue::Bucket(filter));
        }
        match self.value.as_mut() {
            Some(StoredValue::Bucket(filter)) => Ok(filter),
            _ => Err(type_mismatch(self.key)),
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(BucketError::StorageError(
                "key was opened read-only".to_string(),
            ))
        }
    }
}

fn type_mismatch(key: &[u8]) -> BucketError {
    warn!(key = %String::from_utf8_lossy(key), "key holds a value of another type");
    BucketError::TypeMismatch
}

/// Host-side contract the command layer runs against.
pub trait KeyedStore {
    /// Runs `op` against `key` while holding that key's lock. The handle is
    /// released when `op` returns.
    fn open<R, F>(&self, key: &[u8], mode: OpenMode, op: F) -> Result<R>
    where
        F: FnOnce(&mut KeyHandle<'_>) -> Result<R>;

    /// Removes the key, freeing a filter stored there. Returns whether a
    /// bucket filter was freed; a foreign value is refused with
    /// `TypeMismatch`.
    fn delete(&self, key: &[u8]) -> Result<bool>;
}

/// Contents of one key's lock. `removed` is set, under the lock, whenever
/// the entry is taken out of the map, so a caller still holding the old
/// `Arc` can tell its entry is stale and look the key up again.
#[derive(Default)]
struct EntryState {
    value: Option<StoredValue>,
    removed: bool,
}

type Entry = Arc<Mutex<EntryState>>;

/// In-memory keyed store.
pub struct FilterStore {
    config: BucketFilterConfig,
    entries: RwLock<HashMap<Vec<u8>, Entry>>,
}

impl FilterStore {
    /// `config` is used for every filter the store creates lazily.
    pub fn new(config: BucketFilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &BucketFilterConfig {
        &self.config
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Stores `value` under `key`, returning what was there before.
    pub fn insert_value(
        &self,
        key: &[u8],
        value: StoredValue,
    ) -> Result<Option<StoredValue>> {
        loop {
            let cell = self.entry(key, OpenMode::OpenOrCreate)?.ok_or_else(|| {
                BucketError::StorageError("entry vanished during insert".to_string())
            })?;
            let mut guard = lock_entry(&cell)?;
            if guard.removed {
                continue;
            }
            return Ok(guard.value.replace(value));
        }
    }

    /// Visits every non-empty key in unspecified order.
    pub fn for_each_value<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &StoredValue) -> Result<()>,
    {
        let entries = self.read_entries()?;
        for (key, cell) in entries.iter() {
            let guard = lock_entry(cell)?;
            if let Some(value) = guard.value.as_ref() {
                f(key, value)?;
            }
        }
        Ok(())
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Vec<u8>, Entry>>> {
        self.entries
            .read()
            .map_err(|_| BucketError::LockError("Failed to read entries".to_string()))
    }

    fn write_entries(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Vec<u8>, Entry>>> {
        self.entries
            .write()
            .map_err(|_| BucketError::LockError("Failed to write entries".to_string()))
    }

    fn entry(&self, key: &[u8], mode: OpenMode) -> Result<Option<Entry>> {
        if let Some(cell) = self.read_entries()?.get(key) {
            return Ok(Some(Arc::clone(cell)));
        }
        match mode {
            OpenMode::Read => Ok(None),
            OpenMode::OpenOrCreate => {
                let mut entries = self.write_entries()?;
                let cell = entries.entry(key.to_vec()).or_default();
                Ok(Some(Arc::clone(cell)))
            }
        }
    }

    /// Drops a placeholder entry left empty by a failed creation.
    fn remove_if_vacant(&self, key: &[u8], cell: &Entry) -> Result<()> {
        let mut entries = self.write_entries()?;
        let vacant = match entries.get(key) {
            Some(existing) if Arc::ptr_eq(existing, cell) => {
                let mut guard = lock_entry(existing)?;
                if guard.value.is_none() {
                    guard.removed = true;
                }
                guard.removed
            }
            _ => false,
        };
        if vacant {
            entries.remove(key);
        }
        Ok(())
    }

    /// Runs `op` on the entry for `key`, starting from `cached` when given.
    /// A cached or freshly looked-up entry that was removed before its lock
    /// was taken is discarded and the key is looked up again.
    fn open_from<R, F>(
        &self,
        key: &[u8],
        mode: OpenMode,
        mut cached: Option<Entry>,
        op: F,
    ) -> Result<R>
    where
        F: FnOnce(&mut KeyHandle<'_>) -> Result<R>,
    {
        loop {
            let cell = match cached.take() {
                Some(cell) => cell,
                None => match self.entry(key, mode)? {
                    Some(cell) => cell,
                    None => {
                        let mut vacant = None;
                        let mut handle = KeyHandle {
                            key,
                            value: &mut vacant,
                            config: &self.config,
                            writable: false,
                        };
                        return op(&mut handle);
                    }
                },
            };

            let (result, vacant) = {
                let mut guard = lock_entry(&cell)?;
                if guard.removed {
                    debug!(key = %String::from_utf8_lossy(key), "entry removed while waiting, retrying");
                    continue;
                }
                let mut handle = KeyHandle {
                    key,
                    value: &mut guard.value,
                    config: &self.config,
                    writable: true,
                };
                let result = op(&mut handle);
                (result, guard.value.is_none())
            };

            if vacant {
                self.remove_if_vacant(key, &cell)?;
            }
            return result;
        }
    }
}

fn lock_entry(cell: &Entry) -> Result<std::sync::MutexGuard<'_, EntryState>> {
    cell.lock()
        .map_err(|_| BucketError::LockError("Failed to lock key".to_string()))
}

impl KeyedStore for FilterStore {
    fn open<R, F>(&self, key: &[u8], mode: OpenMode, op: F) -> Result<R>
    where
        F: FnOnce(&mut KeyHandle<'_>) -> Result<R>,
    {
        self.open_from(key, mode, None, op)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut entries = self.write_entries()?;
        let Some(cell) = entries.get(key).map(Arc::clone) else {
            return Ok(false);
        };

        let value = {
            let mut guard = lock_entry(&cell)?;
            if matches!(guard.value, Some(StoredValue::Foreign(_))) {
                return Err(type_mismatch(key));
            }
            guard.removed = true;
            guard.value.take()
        };
        entries.remove(key);
        drop(entries);

        match value {
            Some(StoredValue::Bucket(filter)) => {
                filter.free();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
