use std::collections::HashMap;
use std::sync::Arc;

use super::StoreError;
use crate::criteria::Expr;
use crate::event::EventRecord;

/// Append-only storage for event records.
pub trait EventStore: Send + Sync {
    /// Append a batch atomically.
    ///
    /// Records carrying an aggregate id must continue that aggregate's
    /// sequence; otherwise nothing is written and
    /// [`StoreError::ConcurrentWrite`] is returned.
    fn append(&self, records: &[EventRecord]) -> Result<(), StoreError>;

    /// Events of one aggregate, ordered by sequence.
    fn load(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, StoreError>;

    /// Events matching `filter`, in insertion order.
    fn query(&self, filter: &Expr) -> Result<Vec<EventRecord>, StoreError>;

    fn all(&self) -> Result<Vec<EventRecord>, StoreError> {
        self.query(&Expr::True)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.all()?.len())
    }

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl<S: EventStore + ?Sized> EventStore for Arc<S> {
    fn append(&self, records: &[EventRecord]) -> Result<(), StoreError> {
        (**self).append(records)
    }

    fn load(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        (**self).load(aggregate_id)
    }

    fn query(&self, filter: &Expr) -> Result<Vec<EventRecord>, StoreError> {
        (**self).query(filter)
    }

    fn len(&self) -> Result<usize, StoreError> {
        (**self).len()
    }
}

/// Verify that `incoming` continues the per-aggregate sequences found in `existing`.
pub(crate) fn check_sequences(
    existing: &[EventRecord],
    incoming: &[EventRecord],
) -> Result<(), StoreError> {
    let mut last: HashMap<&str, u64> = HashMap::new();

    for record in incoming {
        let Some(id) = record.aggregate_id.as_deref() else {
            continue;
        };

        let current = match last.get(id) {
            Some(sequence) => *sequence,
            None => existing
                .iter()
                .filter(|r| r.aggregate_id.as_deref() == Some(id))
                .map(|r| r.sequence)
                .max()
                .unwrap_or(0),
        };

        let expected = current + 1;
        if record.sequence != expected {
            return Err(StoreError::ConcurrentWrite {
                id: id.to_string(),
                expected,
                actual: record.sequence,
            });
        }
        last.insert(id, record.sequence);
    }

    Ok(())
}

/// Records of one aggregate, sorted by sequence.
pub(crate) fn stream_of(records: &[EventRecord], aggregate_id: &str) -> Vec<EventRecord> {
    let mut stream: Vec<EventRecord> = records
        .iter()
        .filter(|r| r.aggregate_id.as_deref() == Some(aggregate_id))
        .cloned()
        .collect();
    stream.sort_by_key(|r| r.sequence);
    stream
}
