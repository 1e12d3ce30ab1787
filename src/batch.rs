//! Batch writer.
//!
//! Buffers serialized rows and writes them with one transactional insert per
//! batch. A batch is cleared whether its insert succeeds or fails: failed
//! batches are discarded, never retried.

use tracing::debug;

use crate::error::InsertError;
use crate::models::Document;
use crate::store::RowStore;

pub struct BatchWriter<'s> {
    store: &'s dyn RowStore,
    pending: Vec<String>,
    capacity: usize,
    committed: u64,
    flushes: u64,
}

impl<'s> BatchWriter<'s> {
    /// `capacity` is clamped to at least one row.
    pub fn new(store: &'s dyn RowStore, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            pending: Vec::with_capacity(capacity),
            capacity,
            committed: 0,
            flushes: 0,
        }
    }

    pub fn append(&mut self, doc: Document) {
        self.pending.push(serde_json::Value::Object(doc).to_string());
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.capacity
    }

    /// Rows committed by successful flushes so far.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// Inserts attempted so far.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Insert the pending batch in one transaction and clear it.
    ///
    /// Returns the running committed count. A no-op when nothing is pending.
    pub async fn flush(&mut self) -> Result<u64, InsertError> {
        if self.pending.is_empty() {
            return Ok(self.committed);
        }

        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        self.flushes += 1;

        match self.store.insert_batch(&batch).await {
            Ok(inserted) => {
                self.committed += inserted;
                debug!(
                    batch = self.flushes,
                    rows = inserted,
                    committed = self.committed,
                    "batch committed"
                );
                Ok(self.committed)
            }
            Err(source) => Err(InsertError {
                rows: batch.len(),
                source,
            }),
        }
    }
}
