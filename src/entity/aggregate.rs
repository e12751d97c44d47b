use std::fmt;

use super::entity::rehydrate_owner;
use super::Entity;
use crate::event::EventRecord;
use crate::repository::RepositoryError;

/// An aggregate root: domain state plus the [`Entity`] that tracks its events.
pub trait Aggregate: Sized + Default {
    type ReplayError: fmt::Display;

    fn new_empty() -> Self {
        Self::default()
    }
    fn entity(&self) -> &Entity;
    fn entity_mut(&mut self) -> &mut Entity;
    fn replay_event(&mut self, event: &EventRecord) -> Result<(), Self::ReplayError>;
}

#[macro_export]
macro_rules! impl_aggregate {
    ($ty:ty, $entity:ident, $replay:ident) => {
        $crate::impl_aggregate!($ty, $entity, $replay, String);
    };
    ($ty:ty, $entity:ident, $replay:ident, $err:ty) => {
        impl $crate::Aggregate for $ty {
            type ReplayError = $err;

            fn entity(&self) -> &$crate::Entity {
                &self.$entity
            }

            fn entity_mut(&mut self) -> &mut $crate::Entity {
                &mut self.$entity
            }

            fn replay_event(
                &mut self,
                event: &$crate::EventRecord,
            ) -> Result<(), Self::ReplayError> {
                Self::$replay(self, event)
            }
        }
    };
}

/// Rebuild an aggregate by replaying its stored history.
pub fn hydrate<A: Aggregate>(id: &str, history: &[EventRecord]) -> Result<A, RepositoryError> {
    let mut aggregate = A::new_empty();
    aggregate.entity_mut().set_id(id);

    rehydrate_owner(&mut aggregate, A::entity_mut, history, |aggregate, event| {
        aggregate.replay_event(event).map_err(|err| {
            RepositoryError::Replay(format!(
                "{} #{} on {}: {}",
                event.event_name, event.sequence, id, err
            ))
        })
    })?;

    Ok(aggregate)
}
