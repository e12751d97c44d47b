use std::any::Any;
use std::fmt;

/// Upcast helper so trait objects can be downcast to their concrete type.
///
/// Call it on `&dyn DomainEvent`, not on the `Arc`/`Box` holding it: smart
/// pointers are `Any` themselves.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An event that can be raised on a [`DomainEventBus`](crate::DomainEventBus)
/// and stored as an [`EventRecord`](crate::EventRecord).
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Debug, Serialize, Deserialize, DomainEvent)]
/// #[domain_event(name = "TodoInitialized", aggregate_id = id)]
/// struct TodoInitialized {
///     id: String,
///     task: String,
/// }
/// ```
pub trait DomainEvent: AsAny + Send + Sync + fmt::Debug {
    /// Stable name used for storage and criteria matching.
    fn event_name(&self) -> &'static str;

    /// Id of the aggregate that raised the event, if any.
    fn aggregate_id(&self) -> Option<&str> {
        None
    }
}
