mod domain_event;
mod event_record;

pub use domain_event::{AsAny, DomainEvent};
pub use event_record::{EventRecord, PayloadError};
