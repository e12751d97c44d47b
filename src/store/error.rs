use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("concurrent write detected for aggregate {id} (expected sequence {expected}, got {actual})")]
    ConcurrentWrite {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("event store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
