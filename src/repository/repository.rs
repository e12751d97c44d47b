use std::sync::Arc;

use tracing::debug;

use super::RepositoryError;
use crate::bus::{DispatchReport, DomainEventBus};
use crate::criteria::EventCriteria;
use crate::entity::{hydrate, Aggregate, Committable};
use crate::event::{DomainEvent, EventRecord};
use crate::store::EventStore;

/// Loads aggregates from an [`EventStore`] and commits their pending events,
/// publishing them on a [`DomainEventBus`] once the store has accepted them.
///
/// ```ignore
/// let bus = Arc::new(DomainEventBus::new());
/// let repo = AggregateRepository::new(InMemoryEventStore::new()).with_bus(Arc::clone(&bus));
///
/// let mut order = Order::place("o-1", 3)?;
/// repo.commit_aggregate(&mut order)?;
///
/// let order: Order = repo.get("o-1")?.unwrap();
/// ```
pub struct AggregateRepository<S: EventStore> {
    store: S,
    bus: Option<Arc<DomainEventBus>>,
}

impl<S: EventStore> AggregateRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store, bus: None }
    }

    pub fn with_bus(mut self, bus: Arc<DomainEventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> Option<&Arc<DomainEventBus>> {
        self.bus.as_ref()
    }

    /// Rebuild an aggregate from its stream. `None` when nothing was ever stored for `id`.
    pub fn get<A: Aggregate>(&self, id: &str) -> Result<Option<A>, RepositoryError> {
        let history = self.store.load(id)?;
        if history.is_empty() {
            return Ok(None);
        }
        hydrate(id, &history).map(Some)
    }

    /// Aggregates for every id that has a stream, in the order given.
    pub fn get_many<A: Aggregate>(&self, ids: &[&str]) -> Result<Vec<A>, RepositoryError> {
        let mut aggregates = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(aggregate) = self.get(id)? {
                aggregates.push(aggregate);
            }
        }
        Ok(aggregates)
    }

    pub fn exists(&self, id: &str) -> Result<bool, RepositoryError> {
        Ok(!self.store.load(id)?.is_empty())
    }

    /// Persist the pending events of every entity in `committable`.
    ///
    /// Each entity is appended, marked committed and then published, so an
    /// entity whose append fails keeps its pending events and nothing of it
    /// reaches the bus.
    pub fn commit<C>(&self, committable: &mut C) -> Result<DispatchReport, RepositoryError>
    where
        C: Committable + ?Sized,
    {
        let mut report = DispatchReport::default();

        for entity in committable.entities_mut() {
            if !entity.has_pending() {
                continue;
            }

            let records = entity.pending_records();
            self.store.append(&records)?;
            let events: Vec<Arc<dyn DomainEvent>> = entity
                .take_pending()
                .into_iter()
                .map(|pending| pending.event)
                .collect();

            debug!(
                id = entity.id(),
                version = entity.version(),
                events = events.len(),
                "entity committed"
            );

            if let Some(bus) = &self.bus {
                report.merge(bus.publish_all(events)?);
            }
        }

        Ok(report)
    }

    pub fn commit_aggregate<A: Aggregate>(
        &self,
        aggregate: &mut A,
    ) -> Result<DispatchReport, RepositoryError> {
        self.commit(aggregate)
    }

    pub fn commit_all_aggregates<A: Aggregate>(
        &self,
        aggregates: &mut [&mut A],
    ) -> Result<DispatchReport, RepositoryError> {
        self.commit(aggregates)
    }

    pub fn history(&self, id: &str) -> Result<Vec<EventRecord>, RepositoryError> {
        Ok(self.store.load(id)?)
    }

    pub fn query(&self, criteria: &EventCriteria) -> Result<Vec<EventRecord>, RepositoryError> {
        Ok(self.store.query(&criteria.to_expr())?)
    }
}
