//! ACID-durable record store backed by redb.
//!
//! Holds the reference collection between runs: records keyed by id, each
//! serialised with bincode including its calibrated parameters. Candidate
//! search runs over a [`super::MemoryIndex`] rebuilt from this store.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use crate::error::{StoreError, StoreResult};

use super::record::Record;

/// Records table (record id → bincode record).
const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// ACID-durable record store using redb.
///
/// All writes go through transactions. Reads use MVCC snapshots.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("taxolink.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create the table up front so read transactions never miss it.
        let txn = db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Insert or replace one record.
    pub fn put(&self, record: &Record) -> StoreResult<()> {
        self.put_all(std::slice::from_ref(record))
    }

    /// Insert or replace a batch of records in one transaction.
    pub fn put_all(&self, records: &[Record]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        {
            let mut table = txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            for record in records {
                let bytes = record.to_bytes()?;
                table
                    .insert(record.id.as_str(), bytes.as_slice())
                    .map_err(|e| StoreError::Redb {
                        message: format!("insert failed: {e}"),
                    })?;
            }
        }
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        tracing::debug!(records = records.len(), "records written");
        Ok(())
    }

    /// Read a record by id. Returns `Ok(None)` if it doesn't exist.
    pub fn get(&self, id: &str) -> StoreResult<Option<Record>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let result = table.get(id).map_err(|e| StoreError::Redb {
            message: format!("get failed: {e}"),
        })?;
        result.map(|guard| Record::from_bytes(guard.value())).transpose()
    }

    /// Like [`DurableStore::get`] but a missing record is an error.
    pub fn require(&self, id: &str) -> StoreResult<Record> {
        self.get(id)?.ok_or_else(|| StoreError::NotFound { key: id.to_string() })
    }

    /// Delete a record. Returns whether it existed.
    pub fn remove(&self, id: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        let existed = {
            let mut table = txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            let result = table.remove(id).map_err(|e| StoreError::Redb {
                message: format!("remove failed: {e}"),
            })?;
            result.is_some()
        };
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(existed)
    }

    /// Every stored record, in id order.
    pub fn records(&self) -> StoreResult<Vec<Record>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let iter = table.iter().map_err(|e| StoreError::Redb {
            message: format!("iter failed: {e}"),
        })?;
        let mut out = Vec::new();
        for entry in iter {
            let (_, value) = entry.map_err(|e| StoreError::Redb {
                message: format!("iter failed: {e}"),
            })?;
            out.push(Record::from_bytes(value.value())?);
        }
        Ok(out)
    }

    pub fn len(&self) -> StoreResult<u64> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        table.len().map_err(|e| StoreError::Redb {
            message: format!("len failed: {e}"),
        })
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
