extern crate self as domain_events;

pub mod bus;
pub mod criteria;
#[cfg(feature = "emitter")]
pub mod emitter;
pub mod entity;
pub mod event;
pub mod repository;
pub mod store;

pub use bus::{
    BusConfig, DispatchError, DispatchMode, DispatchReport, DomainEventBus, Handles, PoolStats,
    SubscriptionId, WorkerPool,
};
pub use criteria::{EventCriteria, Expr, Specification};
#[cfg(feature = "emitter")]
pub use emitter::{MessageBus, MessageBusError};
pub use entity::{hydrate, Aggregate, Committable, Entity, PendingEvent};
pub use event::{AsAny, DomainEvent, EventRecord, PayloadError};
pub use repository::{AggregateRepository, RepositoryError};
pub use store::{
    EventStore, InMemoryEventStore, JsonFileConfig, JsonFileEventStore, NullEventStore,
    StoreError,
};

// Derive macro; shares its name with the trait it implements.
pub use domain_events_macros::DomainEvent;
