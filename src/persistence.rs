//! Whole-store snapshots in a redb database.
//!
//! Every bucket filter is written as its bincode snapshot under its key, so
//! the table bytes, hash parameters and clock come back exactly as saved.
use crate::bbloom::{BucketFilter, BucketFilterConfig};
use crate::error::Result;
use crate::store::{FilterStore, StoredValue};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FILTERS_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("filters");
const FOREIGN_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("foreign_values");

pub struct RedbSnapshotStore {
    db: Database,
    path: PathBuf,
}

impl RedbSnapshotStore {
    /// Opens the database at `path`, creating the file if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(redb::Error::from)?;
        debug!(path = %path.display(), "opened snapshot database");
        Ok(Self { db, path })
    }

    /// Replaces the database contents with the current store. Returns the
    /// number of filters written.
    pub fn save(&self, store: &FilterStore) -> Result<usize> {
        let mut filters = Vec::new();
        let mut foreign = Vec::new();
        store.for_each_value(|key, value| {
            match value {
                StoredValue::Bucket(filter) => {
                    filters.push((key.to_vec(), filter.to_bytes()?))
                }
                StoredValue::Foreign(bytes) => {
                    foreign.push((key.to_vec(), bytes.clone()))
                }
            }
            Ok(())
        })?;

        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        write_txn
            .delete_table(FILTERS_TABLE)
            .map_err(redb::Error::from)?;
        write_txn
            .delete_table(FOREIGN_TABLE)
            .map_err(redb::Error::from)?;
        {
            let mut table = write_txn
                .open_table(FILTERS_TABLE)
                .map_err(redb::Error::from)?;
            for (key, bytes) in &filters {
                table
                    .insert(key.as_slice(), bytes.as_slice())
                    .map_err(redb::Error::from)?;
            }
        }
        {
            let mut table = write_txn
                .open_table(FOREIGN_TABLE)
                .map_err(redb::Error::from)?;
            for (key, bytes) in &foreign {
                table
                    .insert(key.as_slice(), bytes.as_slice())
                    .map_err(redb::Error::from)?;
            }
        }
        write_txn.commit().map_err(redb::Error::from)?;

        info!(
            path = %self.path.display(),
            filters = filters.len(),
            foreign = foreign.len(),
            "saved snapshot"
        );
        Ok(filters.len())
    }

    /// Loads every saved value into `store`, replacing keys that already
    /// exist. Returns the number of filters restored.
    pub fn load_into(&self, store: &FilterStore) -> Result<usize> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;

        let mut restored = 0;
        match read_txn.open_table(FILTERS_TABLE) {
            Ok(table) => {
                for entry in table.iter().map_err(redb::Error::from)? {
                    let (key, value) = entry.map_err(redb::Error::from)?;
                    let filter = BucketFilter::from_bytes(value.value())?;
                    store.insert_value(key.value(), StoredValue::Bucket(filter))?;
                    restored += 1;
                }
            }
            Err(TableError::TableDoesNotExist(_)) => {}
            Err(e) => return Err(redb::Error::from(e).into()),
        }

        match read_txn.open_table(FOREIGN_TABLE) {
            Ok(table) => {
                for entry in table.iter().map_err(redb::Error::from)? {
                    let (key, value) = entry.map_err(redb::Error::from)?;
                    store.insert_value(
                        key.value(),
                        StoredValue::Foreign(value.value().to_vec()),
                    )?;
                }
            }
            Err(TableError::TableDoesNotExist(_)) => {}
            Err(e) => return Err(redb::Error::from(e).into()),
        }

        info!(path = %self.path.display(), restored, "loaded snapshot");
        Ok(restored)
    }

    /// Builds a fresh store from the snapshot. `config` applies to filters
    /// created after loading; restored filters keep their saved parameters.
    pub fn load(&self, config: BucketFilterConfig) -> Result<FilterStore> {
        let store = FilterStore::new(config)?;
        self.load_into(&store)?;
        Ok(store)
    }
}
