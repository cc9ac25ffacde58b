//! # redb-backed Record Storage
//!
//! A disk-backed record store using the redb embedded database, providing:
//! - ACID transactions (one write transaction per `put`/`remove`)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Each record type gets its own `&str -> &[u8]` table holding postcard
//! bytes, the same encoding the in-memory store uses.

use crate::store::{Record, Store, TABLES, decode, encode};
use crate::types::QuireError;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use std::path::Path;

fn table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn io(e: impl std::fmt::Display) -> QuireError {
    QuireError::IoError(e.to_string())
}

/// A disk-backed record store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QuireError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        let write_txn = db.begin_write().map_err(io)?;
        for name in TABLES {
            let _ = write_txn.open_table(table(name)).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;

        Ok(Self { db })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), QuireError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }
}

impl Store for RedbStore {
    fn get<R: Record>(&self, key: &str) -> Result<Option<R>, QuireError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let records = match read_txn.open_table(table(R::TABLE)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(io(e)),
        };
        let value = records.get(key).map_err(io)?;
        value.map(|bytes| decode(bytes.value())).transpose()
    }

    fn put<R: Record>(&mut self, record: &R) -> Result<(), QuireError> {
        let bytes = encode(record)?;
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut records = write_txn.open_table(table(R::TABLE)).map_err(io)?;
            records
                .insert(record.key(), bytes.as_slice())
                .map_err(io)?;
        }
        write_txn.commit().map_err(io)
    }

    fn remove<R: Record>(&mut self, key: &str) -> Result<bool, QuireError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        let existed = {
            let mut records = write_txn.open_table(table(R::TABLE)).map_err(io)?;
            let removed = records.remove(key).map_err(io)?;
            removed.is_some()
        };
        write_txn.commit().map_err(io)?;
        Ok(existed)
    }

    fn all<R: Record>(&self) -> Result<Vec<R>, QuireError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let records = match read_txn.open_table(table(R::TABLE)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(io(e)),
        };

        let mut out = Vec::new();
        for entry in records.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            out.push(decode(value.value())?);
        }
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================
