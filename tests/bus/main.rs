use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::anyhow;
use domain_events::{
    BusConfig, DispatchError, DispatchMode, DomainEvent, DomainEventBus, Handles,
};

// Event hierarchy: Payment -> Money movement -> Audit
#[derive(Debug)]
struct Audit {
    actor: String,
}

#[derive(Debug)]
struct MoneyMoved {
    audit: Audit,
    cents: i64,
}

impl AsRef<Audit> for MoneyMoved {
    fn as_ref(&self) -> &Audit {
        &self.audit
    }
}

#[derive(Debug, DomainEvent)]
struct PaymentReceived {
    moved: MoneyMoved,
    invoice: String,
}

impl AsRef<MoneyMoved> for PaymentReceived {
    fn as_ref(&self) -> &MoneyMoved {
        &self.moved
    }
}

#[derive(Debug, DomainEvent)]
#[domain_event(name = "RefundIssued")]
struct RefundIssued {
    moved: MoneyMoved,
}

impl AsRef<MoneyMoved> for RefundIssued {
    fn as_ref(&self) -> &MoneyMoved {
        &self.moved
    }
}

fn payment(cents: i64) -> PaymentReceived {
    PaymentReceived {
        moved: MoneyMoved {
            audit: Audit {
                actor: "billing".into(),
            },
            cents,
        },
        invoice: format!("inv-{}", cents),
    }
}

fn refund(cents: i64) -> RefundIssued {
    RefundIssued {
        moved: MoneyMoved {
            audit: Audit {
                actor: "support".into(),
            },
            cents: -cents,
        },
    }
}

fn hierarchy(bus: &DomainEventBus) {
    bus.relate::<PaymentReceived, MoneyMoved>().unwrap();
    bus.relate::<RefundIssued, MoneyMoved>().unwrap();
    bus.relate::<MoneyMoved, Audit>().unwrap();
}

/// A handler object rather than a closure.
struct Ledger {
    balance: Arc<Mutex<i64>>,
}

impl Handles<MoneyMoved> for Ledger {
    fn handle(&self, event: &MoneyMoved) -> anyhow::Result<()> {
        *self.balance.lock().map_err(|_| anyhow!("ledger poisoned"))? += event.cents;
        Ok(())
    }
}

#[test]
fn base_type_handlers_see_every_child() {
    let bus = DomainEventBus::new();
    hierarchy(&bus);

    let balance = Arc::new(Mutex::new(0));
    bus.subscribe::<MoneyMoved, _>(Ledger {
        balance: Arc::clone(&balance),
    })
    .unwrap();

    bus.raise(payment(500)).unwrap();
    bus.raise(refund(200)).unwrap();

    assert_eq!(*balance.lock().unwrap(), 300);
}

#[test]
fn relations_are_transitive_and_ordered() {
    let bus = DomainEventBus::new();
    hierarchy(&bus);
    let order = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&order);
    bus.subscribe(move |e: &Audit| {
        sink.lock().unwrap().push(format!("audit by {}", e.actor));
        Ok(())
    })
    .unwrap();
    let sink = Arc::clone(&order);
    bus.subscribe_all(move |e: &dyn DomainEvent| {
        sink.lock().unwrap().push(format!("any {}", e.event_name()));
        Ok(())
    })
    .unwrap();
    let sink = Arc::clone(&order);
    bus.subscribe(move |e: &MoneyMoved| {
        sink.lock().unwrap().push(format!("moved {}", e.cents));
        Ok(())
    })
    .unwrap();
    let sink = Arc::clone(&order);
    bus.subscribe(move |e: &PaymentReceived| {
        sink.lock().unwrap().push(format!("paid {}", e.invoice));
        Ok(())
    })
    .unwrap();

    let report = bus.raise(payment(42)).unwrap();

    assert_eq!(report.delivered, 4);
    assert_eq!(
        *order.lock().unwrap(),
        vec![
            "paid inv-42",
            "moved 42",
            "audit by billing",
            "any PaymentReceived"
        ]
    );
}

#[derive(Debug, DomainEvent)]
struct Ping;

#[derive(Debug, DomainEvent)]
struct Pong;

impl AsRef<Pong> for Ping {
    fn as_ref(&self) -> &Pong {
        &Pong
    }
}

impl AsRef<Ping> for Pong {
    fn as_ref(&self) -> &Ping {
        &Ping
    }
}

#[test]
fn cyclic_relations_visit_each_type_once() {
    let bus = DomainEventBus::new();
    bus.relate::<Ping, Pong>().unwrap();
    bus.relate::<Pong, Ping>().unwrap();

    let hits = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&hits);
    bus.subscribe(move |_: &Ping| {
        sink.lock().unwrap().push("ping");
        Ok(())
    })
    .unwrap();
    let sink = Arc::clone(&hits);
    bus.subscribe(move |_: &Pong| {
        sink.lock().unwrap().push("pong");
        Ok(())
    })
    .unwrap();

    assert_eq!(bus.raise(Pong).unwrap().delivered, 2);
    assert_eq!(*hits.lock().unwrap(), vec!["pong", "ping"]);
}

#[test]
fn unhandled_events_are_not_errors() {
    let bus = DomainEventBus::new();
    let report = bus.raise(refund(1)).unwrap();
    assert_eq!(report.handlers(), 0);
}

#[test]
fn synchronous_failure_names_event_and_handler() {
    let bus = DomainEventBus::new();
    hierarchy(&bus);
    bus.subscribe(|e: &MoneyMoved| {
        if e.cents < 0 {
            return Err(anyhow!("negative amount"));
        }
        Ok(())
    })
    .unwrap();

    assert!(bus.raise(payment(1)).is_ok());
    match bus.raise(refund(1)) {
        Err(DispatchError::Handler { event, handler, source }) => {
            assert_eq!(event, "RefundIssued");
            assert!(handler.contains("synchronous_failure_names_event_and_handler"));
            assert_eq!(source.to_string(), "negative amount");
        }
        other => panic!("expected handler error, got {:?}", other.map(|r| r.delivered)),
    }
}

#[test]
fn background_dispatch_runs_on_named_workers() {
    let config: BusConfig = serde_json::from_str(
        r#"{"mode":{"background":{"workers":3}},"thread_name":"billing"}"#,
    )
    .unwrap();
    assert_eq!(config.mode, DispatchMode::Background { workers: 3 });

    let bus = DomainEventBus::with_config(config).unwrap();
    hierarchy(&bus);

    let threads = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&threads);
    bus.subscribe(move |_: &Audit| {
        let name = thread::current().name().unwrap_or_default().to_string();
        sink.lock().unwrap().push(name);
        Ok(())
    })
    .unwrap();

    let mut queued = 0;
    for cents in 0..20 {
        queued += bus.raise(payment(cents)).unwrap().queued;
    }
    assert_eq!(queued, 20);

    bus.wait_idle().unwrap();
    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 20);
    assert!(threads.iter().all(|name| name.starts_with("billing-")));

    let stats = bus.pool_stats().unwrap();
    assert_eq!(stats.workers, 3);
    assert_eq!(stats.jobs_completed, 20);
}

#[test]
fn background_failures_and_panics_do_not_reach_the_caller() {
    let bus = DomainEventBus::with_config(BusConfig::background(1)).unwrap();
    bus.subscribe(|_: &RefundIssued| Err(anyhow!("refunds are frozen")))
        .unwrap();
    bus.subscribe(|e: &RefundIssued| {
        if e.moved.cents < -100 {
            panic!("refund too large");
        }
        Ok(())
    })
    .unwrap();

    assert!(bus.raise(refund(10)).is_ok());
    assert!(bus.raise(refund(1_000)).is_ok());
    bus.wait_idle().unwrap();

    let stats = bus.shutdown().unwrap();
    assert_eq!(stats.jobs_failed, 3);
    assert_eq!(stats.jobs_completed, 1);
}

#[test]
fn shared_bus_across_threads() {
    let bus = Arc::new(DomainEventBus::new());
    hierarchy(&bus);
    let total = Arc::new(AtomicUsize::new(0));
    {
        let total = Arc::clone(&total);
        bus.subscribe(move |e: &MoneyMoved| {
            total.fetch_add(e.cents as usize, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                for _ in 0..25 {
                    bus.raise(payment(1)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(total.load(Ordering::SeqCst), 100);
    assert!(!bus.is_background());
    assert!(bus.pool_stats().is_none());
}
