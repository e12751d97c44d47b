//! Event stores: append raised events, load an aggregate's stream, query by criteria.
//!
//! Three implementations:
//! - [`NullEventStore`]: accepts everything, remembers nothing
//! - [`InMemoryEventStore`]: a shared `Vec` behind a lock
//! - [`JsonFileEventStore`]: the whole log as one JSON array on disk

mod error;
mod event_store;
mod in_memory;
mod json_file;
mod null;

pub use error::StoreError;
pub use event_store::EventStore;
pub use in_memory::InMemoryEventStore;
pub use json_file::{JsonFileConfig, JsonFileEventStore};
pub use null::NullEventStore;

pub(crate) use event_store::{check_sequences, stream_of};
