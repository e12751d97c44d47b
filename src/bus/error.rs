use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler {handler} failed on {event}: {source}")]
    Handler {
        event: &'static str,
        handler: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("event bus lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("worker pool is shut down")]
    PoolClosed,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
