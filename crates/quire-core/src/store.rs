//! # Record Store
//!
//! Typed persistence for the domain records.
//!
//! Every record type names its table and key through [`Record`]; values
//! are stored as `postcard` bytes so that the in-memory and the redb
//! backends hold byte-identical data. All tables use `BTreeMap` ordering,
//! so listings are deterministic.

use crate::storage::RedbStore;
use crate::types::QuireError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

// =============================================================================
// RECORD TRAIT
// =============================================================================

/// A persisted record type.
pub trait Record: Serialize + DeserializeOwned {
    /// Table the record lives in.
    const TABLE: &'static str;
    /// Human-readable kind used in error messages.
    const KIND: &'static str;

    /// Primary key of this record.
    fn key(&self) -> &str;
}

/// Every table name, so backends can create them up front.
pub const TABLES: &[&str] = &[
    "users",
    "institutions",
    "projects",
    "files",
    "subjects",
    "providers",
    "licenses",
    "preprints",
    "access_tokens",
];

/// Encode a record to its stored form.
pub(crate) fn encode<R: Record>(record: &R) -> Result<Vec<u8>, QuireError> {
    postcard::to_allocvec(record).map_err(|e| QuireError::SerializationError(e.to_string()))
}

/// Decode a record from its stored form.
pub(crate) fn decode<R: Record>(bytes: &[u8]) -> Result<R, QuireError> {
    postcard::from_bytes(bytes).map_err(|e| QuireError::SerializationError(e.to_string()))
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// The Store trait defines typed record persistence.
///
/// All fallible operations return `Result<T, QuireError>` to support both
/// in-memory and persistent backends uniformly.
pub trait Store {
    /// Load a record by key.
    fn get<R: Record>(&self, key: &str) -> Result<Option<R>, QuireError>;

    /// Insert or replace a record.
    fn put<R: Record>(&mut self, record: &R) -> Result<(), QuireError>;

    /// Remove a record. Returns whether it existed.
    fn remove<R: Record>(&mut self, key: &str) -> Result<bool, QuireError>;

    /// All records of a type, ordered by key.
    fn all<R: Record>(&self) -> Result<Vec<R>, QuireError>;

    /// Load a record or fail with `NotFound`.
    fn require<R: Record>(&self, key: &str) -> Result<R, QuireError> {
        self.get::<R>(key)?
            .ok_or_else(|| QuireError::not_found(R::KIND, key))
    }

    /// Count records of a type.
    fn count<R: Record>(&self) -> Result<usize, QuireError> {
        Ok(self.all::<R>()?.len())
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Volatile store keeping encoded records in ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<&'static str, BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get<R: Record>(&self, key: &str) -> Result<Option<R>, QuireError> {
        self.tables
            .get(R::TABLE)
            .and_then(|table| table.get(key))
            .map(|bytes| decode(bytes))
            .transpose()
    }

    fn put<R: Record>(&mut self, record: &R) -> Result<(), QuireError> {
        let bytes = encode(record)?;
        self.tables
            .entry(R::TABLE)
            .or_default()
            .insert(record.key().to_string(), bytes);
        Ok(())
    }

    fn remove<R: Record>(&mut self, key: &str) -> Result<bool, QuireError> {
        Ok(self
            .tables
            .get_mut(R::TABLE)
            .and_then(|table| table.remove(key))
            .is_some())
    }

    fn all<R: Record>(&self) -> Result<Vec<R>, QuireError> {
        self.tables
            .get(R::TABLE)
            .map(|table| table.values().map(|bytes| decode(bytes)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a [`crate::Platform`].
///
/// Supports both in-memory and persistent storage.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory tables (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed tables using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl Store for StorageBackend {
    fn get<R: Record>(&self, key: &str) -> Result<Option<R>, QuireError> {
        match self {
            Self::InMemory(store) => store.get(key),
            Self::Persistent(store) => store.get(key),
        }
    }

    fn put<R: Record>(&mut self, record: &R) -> Result<(), QuireError> {
        match self {
            Self::InMemory(store) => store.put(record),
            Self::Persistent(store) => store.put(record),
        }
    }

    fn remove<R: Record>(&mut self, key: &str) -> Result<bool, QuireError> {
        match self {
            Self::InMemory(store) => store.remove::<R>(key),
            Self::Persistent(store) => store.remove::<R>(key),
        }
    }

    fn all<R: Record>(&self) -> Result<Vec<R>, QuireError> {
        match self {
            Self::InMemory(store) => store.all(),
            Self::Persistent(store) => store.all(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
