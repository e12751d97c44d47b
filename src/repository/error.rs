use thiserror::Error;

use crate::bus::DispatchError;
use crate::event::PayloadError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("replay error: {0}")]
    Replay(String),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The events were stored; only delivery to the bus failed.
    #[error("events committed but dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}
