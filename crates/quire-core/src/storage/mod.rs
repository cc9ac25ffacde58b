//! # Persistent Storage
//!
//! Disk-backed implementations of [`crate::store::Store`].

mod redb_store;

pub use redb_store::RedbStore;
