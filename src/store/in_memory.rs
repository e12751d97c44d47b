use std::sync::{Arc, RwLock};

use tracing::debug;

use super::{check_sequences, stream_of, EventStore, StoreError};
use crate::criteria::Expr;
use crate::event::EventRecord;

/// An event store backed by a shared vector.
///
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    records: Arc<RwLock<Vec<EventRecord>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        InMemoryEventStore::default()
    }

    /// A store pre-loaded with `records`, taken as-is.
    pub fn with_records(records: Vec<EventRecord>) -> Self {
        InMemoryEventStore {
            records: Arc::new(RwLock::new(records)),
        }
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, records: &[EventRecord]) -> Result<(), StoreError> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| StoreError::LockPoisoned("append"))?;

        check_sequences(&stored, records)?;
        stored.extend_from_slice(records);

        debug!(count = records.len(), total = stored.len(), "events appended");
        Ok(())
    }

    fn load(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        let stored = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("load"))?;
        Ok(stream_of(&stored, aggregate_id))
    }

    fn query(&self, filter: &Expr) -> Result<Vec<EventRecord>, StoreError> {
        let stored = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("query"))?;
        Ok(filter.filter(stored.iter()).cloned().collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let stored = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("len"))?;
        Ok(stored.len())
    }
}
