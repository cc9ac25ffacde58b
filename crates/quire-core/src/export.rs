//! # Export Dispatch
//!
//! Persisted preprint changes are announced to an [`ExportSink`]. The sink
//! only receives the preprint id; formatting and delivery happen later, on
//! the sink's side, so saving never waits on the external indexer.

use crate::types::PreprintId;
use std::sync::Mutex;

/// Receiver of export jobs.
pub trait ExportSink: Send + Sync {
    /// Enqueue an export of `preprint`. Must not block.
    fn dispatch(&self, preprint: &PreprintId);
}

/// Drops every job.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ExportSink for NullSink {
    fn dispatch(&self, _preprint: &PreprintId) {}
}

/// Records dispatched ids in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    dispatched: Mutex<Vec<PreprintId>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dispatched id, oldest first.
    #[must_use]
    pub fn dispatched(&self) -> Vec<PreprintId> {
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of dispatches for one preprint.
    #[must_use]
    pub fn count_for(&self, preprint: &PreprintId) -> usize {
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|id| *id == preprint)
            .count()
    }
}

impl ExportSink for RecordingSink {
    fn dispatch(&self, preprint: &PreprintId) {
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(preprint.clone());
    }
}
