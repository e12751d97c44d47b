use tracing::trace;

use super::{EventStore, StoreError};
use crate::criteria::Expr;
use crate::event::EventRecord;

/// An event store that discards everything.
///
/// Useful where an aggregate repository is required but history is not,
/// e.g. in tests of handlers or for purely transient aggregates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventStore;

impl NullEventStore {
    pub fn new() -> Self {
        NullEventStore
    }
}

impl EventStore for NullEventStore {
    fn append(&self, records: &[EventRecord]) -> Result<(), StoreError> {
        trace!(count = records.len(), "discarding events");
        Ok(())
    }

    fn load(&self, _aggregate_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        Ok(Vec::new())
    }

    fn query(&self, _filter: &Expr) -> Result<Vec<EventRecord>, StoreError> {
        Ok(Vec::new())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}
