use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use super::{BusConfig, DispatchError, DispatchMode, Handles, PoolStats, WorkerPool};
use crate::event::DomainEvent;

/// Handle returned by `subscribe*`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Outcome of raising one or more events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that ran to completion on the caller's thread.
    pub delivered: usize,
    /// Handler invocations handed to the worker pool.
    pub queued: usize,
}

impl DispatchReport {
    pub fn handlers(&self) -> usize {
        self.delivered + self.queued
    }

    pub(crate) fn merge(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.queued += other.queued;
    }
}

type TypedInvoke = Arc<dyn Fn(&dyn Any) -> anyhow::Result<()> + Send + Sync>;
type AnyInvoke = Arc<dyn Fn(&dyn DomainEvent) -> anyhow::Result<()> + Send + Sync>;

/// Views a child event as one of its base types.
type Upcast = fn(&dyn Any) -> Option<&dyn Any>;

fn upcast<C, B>(event: &dyn Any) -> Option<&dyn Any>
where
    C: AsRef<B> + 'static,
    B: 'static,
{
    event
        .downcast_ref::<C>()
        .map(|child| AsRef::<B>::as_ref(child) as &dyn Any)
}

#[derive(Clone)]
enum Invoker {
    Typed(TypedInvoke),
    Any(AnyInvoke),
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    handler: &'static str,
    invoker: Invoker,
}

struct Relation {
    base: TypeId,
    upcast: Upcast,
}

#[derive(Default)]
struct Registry {
    typed: HashMap<TypeId, Vec<Subscription>>,
    catch_all: Vec<Subscription>,
    relations: HashMap<TypeId, Vec<Relation>>,
}

/// A matched handler plus the chain of upcasts from the raised type to the handler's type.
#[derive(Clone)]
struct Delivery {
    subscription: Subscription,
    path: Vec<Upcast>,
}

impl Delivery {
    fn run(&self, event: &dyn DomainEvent) -> anyhow::Result<()> {
        match &self.subscription.invoker {
            Invoker::Any(invoke) => invoke(event),
            Invoker::Typed(invoke) => {
                let mut view = event.as_any();
                for upcast in &self.path {
                    match upcast(view) {
                        Some(base) => view = base,
                        None => return Ok(()),
                    }
                }
                invoke(view)
            }
        }
    }
}

/// Registry of typed handlers, dispatching by runtime type.
///
/// ## Example
///
/// ```ignore
/// let bus = DomainEventBus::new();
/// bus.relate::<OrderPlaced, OrderEvent>()?;
///
/// bus.subscribe(|e: &OrderPlaced| { reserve_stock(e)?; Ok(()) })?;
/// bus.subscribe(|e: &OrderEvent| { audit(e); Ok(()) })?;
///
/// bus.raise(OrderPlaced { .. })?; // both handlers run
/// ```
pub struct DomainEventBus {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    pool: Option<WorkerPool>,
}

impl Default for DomainEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DomainEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (typed, catch_all, relations) = match self.registry.read() {
            Ok(registry) => (
                registry.typed.values().map(Vec::len).sum::<usize>(),
                registry.catch_all.len(),
                registry.relations.values().map(Vec::len).sum::<usize>(),
            ),
            Err(_) => (0, 0, 0),
        };
        f.debug_struct("DomainEventBus")
            .field("typed_handlers", &typed)
            .field("catch_all_handlers", &catch_all)
            .field("relations", &relations)
            .field("background", &self.pool.is_some())
            .finish()
    }
}

impl DomainEventBus {
    /// A bus that runs handlers synchronously.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            next_id: AtomicU64::new(1),
            pool: None,
        }
    }

    pub fn with_config(config: BusConfig) -> Result<Self, DispatchError> {
        let pool = match config.mode {
            DispatchMode::Synchronous => None,
            DispatchMode::Background { workers } => {
                Some(WorkerPool::new(workers, &config.thread_name)?)
            }
        };

        Ok(Self {
            pool,
            ..Self::new()
        })
    }

    pub fn is_background(&self) -> bool {
        self.pool.is_some()
    }

    /// Register a handler for events of type `E` and anything related to `E` as a child.
    pub fn subscribe<E, H>(&self, handler: H) -> Result<SubscriptionId, DispatchError>
    where
        E: Any,
        H: Handles<E>,
    {
        let invoke: TypedInvoke = Arc::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
            Some(event) => handler.handle(event),
            None => Ok(()),
        });
        let subscription = Subscription {
            id: self.next_id(),
            handler: type_name::<H>(),
            invoker: Invoker::Typed(invoke),
        };
        let id = subscription.id;

        self.registry
            .write()
            .map_err(|_| DispatchError::LockPoisoned("subscribe"))?
            .typed
            .entry(TypeId::of::<E>())
            .or_default()
            .push(subscription);

        debug!(event = type_name::<E>(), handler = type_name::<H>(), "handler subscribed");
        Ok(id)
    }

    /// Register a handler that receives every raised event.
    pub fn subscribe_all<H>(&self, handler: H) -> Result<SubscriptionId, DispatchError>
    where
        H: Handles<dyn DomainEvent>,
    {
        let invoke: AnyInvoke = Arc::new(move |event: &dyn DomainEvent| handler.handle(event));
        let subscription = Subscription {
            id: self.next_id(),
            handler: type_name::<H>(),
            invoker: Invoker::Any(invoke),
        };
        let id = subscription.id;

        self.registry
            .write()
            .map_err(|_| DispatchError::LockPoisoned("subscribe_all"))?
            .catch_all
            .push(subscription);

        Ok(id)
    }

    /// Declare `Base` as a base type of `Child`: handlers of `Base` also receive `Child` events.
    ///
    /// Relations chain, so handlers of a base's base are reached too.
    pub fn relate<Child, Base>(&self) -> Result<(), DispatchError>
    where
        Child: AsRef<Base> + 'static,
        Base: 'static,
    {
        let mut registry = self
            .registry
            .write()
            .map_err(|_| DispatchError::LockPoisoned("relate"))?;
        let relations = registry.relations.entry(TypeId::of::<Child>()).or_default();

        let base = TypeId::of::<Base>();
        if relations.iter().any(|r| r.base == base) {
            return Ok(());
        }
        relations.push(Relation {
            base,
            upcast: upcast::<Child, Base>,
        });

        debug!(child = type_name::<Child>(), base = type_name::<Base>(), "event types related");
        Ok(())
    }

    /// Remove a handler. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, DispatchError> {
        let mut registry = self
            .registry
            .write()
            .map_err(|_| DispatchError::LockPoisoned("unsubscribe"))?;

        let before = registry.catch_all.len();
        registry.catch_all.retain(|s| s.id != id);
        if registry.catch_all.len() != before {
            return Ok(true);
        }

        for subscriptions in registry.typed.values_mut() {
            let before = subscriptions.len();
            subscriptions.retain(|s| s.id != id);
            if subscriptions.len() != before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Remove every handler and relation.
    pub fn clear(&self) -> Result<(), DispatchError> {
        let mut registry = self
            .registry
            .write()
            .map_err(|_| DispatchError::LockPoisoned("clear"))?;
        *registry = Registry::default();
        Ok(())
    }

    /// Handlers registered directly for `E` (not counting related or catch-all handlers).
    pub fn handler_count<E: Any>(&self) -> Result<usize, DispatchError> {
        let registry = self
            .registry
            .read()
            .map_err(|_| DispatchError::LockPoisoned("handler_count"))?;
        Ok(registry
            .typed
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len))
    }

    pub fn raise<E: DomainEvent>(&self, event: E) -> Result<DispatchReport, DispatchError> {
        let event: Arc<dyn DomainEvent> = Arc::new(event);
        self.publish(event)
    }

    /// Dispatch an already shared event.
    ///
    /// Synchronous mode stops at the first failing handler.
    pub fn publish(&self, event: Arc<dyn DomainEvent>) -> Result<DispatchReport, DispatchError> {
        let deliveries = self.plan(&*event)?;
        let name = event.event_name();

        if deliveries.is_empty() {
            debug!(event = name, "no handlers for event");
            return Ok(DispatchReport::default());
        }

        let Some(pool) = &self.pool else {
            for delivery in &deliveries {
                delivery
                    .run(&*event)
                    .map_err(|source| DispatchError::Handler {
                        event: name,
                        handler: delivery.subscription.handler,
                        source,
                    })?;
            }
            debug!(event = name, handlers = deliveries.len(), "event dispatched");
            return Ok(DispatchReport {
                delivered: deliveries.len(),
                queued: 0,
            });
        };

        let queued = deliveries.len();
        for delivery in deliveries {
            let event = Arc::clone(&event);
            pool.execute(move || {
                delivery.run(&*event).inspect_err(|err| {
                    error!(
                        event = event.event_name(),
                        handler = delivery.subscription.handler,
                        error = %err,
                        "background handler failed"
                    );
                })
            })?;
        }
        debug!(event = name, handlers = queued, "event queued");
        Ok(DispatchReport {
            delivered: 0,
            queued,
        })
    }

    pub fn publish_all<I>(&self, events: I) -> Result<DispatchReport, DispatchError>
    where
        I: IntoIterator<Item = Arc<dyn DomainEvent>>,
    {
        let mut report = DispatchReport::default();
        for event in events {
            report.merge(self.publish(event)?);
        }
        Ok(report)
    }

    /// Block until background handlers have run. Returns immediately in synchronous mode.
    pub fn wait_idle(&self) -> Result<(), DispatchError> {
        match &self.pool {
            Some(pool) => pool.wait_idle(),
            None => Ok(()),
        }
    }

    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.as_ref().map(WorkerPool::stats)
    }

    /// Drain and stop the worker pool. Later raises in background mode fail.
    pub fn shutdown(&self) -> Option<PoolStats> {
        self.pool.as_ref().map(WorkerPool::shutdown)
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Concrete handlers first, then base types breadth-first, then catch-all handlers.
    fn plan(&self, event: &dyn DomainEvent) -> Result<Vec<Delivery>, DispatchError> {
        let registry = self
            .registry
            .read()
            .map_err(|_| DispatchError::LockPoisoned("dispatch"))?;

        let mut deliveries = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<(TypeId, Vec<Upcast>)> = VecDeque::new();
        queue.push_back((event.as_any().type_id(), Vec::new()));

        while let Some((type_id, path)) = queue.pop_front() {
            if !visited.insert(type_id) {
                continue;
            }

            if let Some(subscriptions) = registry.typed.get(&type_id) {
                deliveries.extend(subscriptions.iter().map(|subscription| Delivery {
                    subscription: subscription.clone(),
                    path: path.clone(),
                }));
            }

            if let Some(relations) = registry.relations.get(&type_id) {
                for relation in relations {
                    let mut next = path.clone();
                    next.push(relation.upcast);
                    queue.push_back((relation.base, next));
                }
            }
        }

        deliveries.extend(registry.catch_all.iter().map(|subscription| Delivery {
            subscription: subscription.clone(),
            path: Vec::new(),
        }));

        Ok(deliveries)
    }
}
