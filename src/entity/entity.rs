use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{DomainEvent, EventRecord, PayloadError};

/// An event raised by an entity that has not been persisted yet.
///
/// Keeps the typed event for dispatch next to its encoded record for storage.
#[derive(Clone, Debug)]
pub struct PendingEvent {
    pub record: EventRecord,
    pub event: Arc<dyn DomainEvent>,
}

/// The domain object every aggregate embeds.
///
/// Mutator methods on the aggregate call [`Entity::raise`]; raised events stay
/// pending until a repository persists them.
pub struct Entity {
    id: String,
    version: u64,
    committed_version: u64,
    pending: Vec<PendingEvent>,
    replaying: bool,
    timestamp: DateTime<Utc>,
}

impl Default for Entity {
    fn default() -> Self {
        Entity {
            id: String::new(),
            version: 0,
            committed_version: 0,
            pending: Vec::new(),
            replaying: false,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("committed_version", &self.committed_version)
            .field("pending", &self.pending.len())
            .field("replaying", &self.replaying)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl Clone for Entity {
    fn clone(&self) -> Self {
        Entity {
            id: self.id.clone(),
            version: self.version,
            committed_version: self.committed_version,
            pending: self.pending.clone(),
            replaying: self.replaying,
            timestamp: self.timestamp,
        }
    }
}

/// Holds an owner's entity in replay mode until dropped, even on early return.
struct ReplayGuard<'a, T: ?Sized> {
    owner: &'a mut T,
    entity: fn(&mut T) -> &mut Entity,
}

impl<'a, T: ?Sized> ReplayGuard<'a, T> {
    fn new(owner: &'a mut T, entity: fn(&mut T) -> &mut Entity) -> Self {
        entity(&mut *owner).replaying = true;
        ReplayGuard { owner, entity }
    }
}

impl<T: ?Sized> Deref for ReplayGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.owner
    }
}

impl<T: ?Sized> DerefMut for ReplayGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.owner
    }
}

impl<T: ?Sized> Drop for ReplayGuard<'_, T> {
    fn drop(&mut self) {
        (self.entity)(&mut *self.owner).replaying = false;
    }
}

fn itself(entity: &mut Entity) -> &mut Entity {
    entity
}

/// Replay `history` into `owner` with the entity reached through `entity` in
/// replay mode, then position that entity at the end of the history.
///
/// On error the entity is left unpositioned and out of replay mode.
pub(crate) fn rehydrate_owner<T, F, E>(
    owner: &mut T,
    entity: fn(&mut T) -> &mut Entity,
    history: &[EventRecord],
    mut apply: F,
) -> Result<(), E>
where
    T: ?Sized,
    F: FnMut(&mut T, &EventRecord) -> Result<(), E>,
{
    {
        let mut guard = ReplayGuard::new(&mut *owner, entity);
        for event in history {
            apply(&mut *guard, event)?;
        }
    }

    entity(owner).load_from_history(history);
    Ok(())
}

impl Entity {
    pub fn new() -> Self {
        Entity::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let mut entity = Entity::default();
        entity.id = id.into();
        entity
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Sequence of the last event, persisted or pending.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Sequence of the last persisted event.
    pub fn committed_version(&self) -> u64 {
        self.committed_version
    }

    /// Time of the last raised or loaded event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Record a domain event as pending.
    ///
    /// Does nothing while the entity is replaying history.
    pub fn raise<E>(&mut self, event: E) -> Result<(), PayloadError>
    where
        E: DomainEvent + Serialize,
    {
        if self.replaying {
            return Ok(());
        }

        let sequence = self.version + 1;
        let mut record = EventRecord::encode(&event, sequence)?;
        if record.aggregate_id.is_none() && !self.id.is_empty() {
            record.aggregate_id = Some(self.id.clone());
        }

        self.timestamp = record.timestamp;
        self.version = sequence;
        self.pending.push(PendingEvent {
            record,
            event: Arc::new(event),
        });
        Ok(())
    }

    pub fn pending_events(&self) -> &[PendingEvent] {
        &self.pending
    }

    pub fn pending_records(&self) -> Vec<EventRecord> {
        self.pending.iter().map(|p| p.record.clone()).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Move pending events out, leaving the entity committed at its current version.
    pub fn take_pending(&mut self) -> Vec<PendingEvent> {
        self.committed_version = self.version;
        std::mem::take(&mut self.pending)
    }

    /// Mark all pending events as persisted. Called by the repository after a successful append.
    pub fn mark_committed(&mut self) {
        self.committed_version = self.version;
        self.pending.clear();
    }

    /// Position the entity at the end of a stored history.
    pub fn load_from_history(&mut self, history: &[EventRecord]) {
        self.version = history.iter().map(|r| r.sequence).max().unwrap_or(0);
        self.committed_version = self.version;
        self.pending.clear();
        if let Some(last) = history.last() {
            self.timestamp = last.timestamp;
        }
    }

    /// Run `apply` over `history` with raising suppressed.
    pub fn rehydrate<F, E>(&mut self, history: &[EventRecord], mut apply: F) -> Result<(), E>
    where
        F: FnMut(&EventRecord) -> Result<(), E>,
    {
        rehydrate_owner(self, itself, history, |_, event| apply(event))
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }
}
