//! In-process domain event bus.
//!
//! Handlers subscribe to a concrete event type. An event reaches every
//! handler registered for its own type, for any base type it was related to
//! with [`DomainEventBus::relate`], and for the catch-all `dyn DomainEvent`.
//!
//! ```text
//!   raise(OrderPlaced)
//!        │
//!        ├─► handlers of OrderPlaced
//!        ├─► handlers of OrderEvent        (OrderPlaced: AsRef<OrderEvent>)
//!        └─► subscribe_all handlers
//! ```
//!
//! Dispatch runs on the caller's thread unless the bus is configured with
//! [`DispatchMode::Background`], in which case each delivery becomes a job on
//! a [`WorkerPool`].

mod config;
mod domain_event_bus;
mod error;
mod handler;
mod worker_pool;

pub use config::{BusConfig, DispatchMode};
pub use domain_event_bus::{DispatchReport, DomainEventBus, SubscriptionId};
pub use error::DispatchError;
pub use handler::Handles;
pub use worker_pool::{PoolStats, WorkerPool};
