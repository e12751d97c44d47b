mod aggregate;
mod committable;
mod entity;

pub use aggregate::{hydrate, Aggregate};
pub use committable::Committable;
pub use entity::{Entity, PendingEvent};
