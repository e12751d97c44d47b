//! Topic-based message bus over `event_emitter_rs`.

mod message_bus;

pub use message_bus::{MessageBus, MessageBusError};
