#![cfg(feature = "emitter")]

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use domain_events::{
    AggregateRepository, DomainEvent, Entity, EventRecord, InMemoryEventStore, MessageBus,
    MessageBusError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DomainEvent)]
#[domain_event(name = "InvoiceSent", aggregate_id = invoice_id)]
struct InvoiceSent {
    invoice_id: String,
    email: String,
}

#[test]
fn committed_records_fan_out_by_topic() {
    let store = InMemoryEventStore::new();
    let repo = AggregateRepository::new(store);

    let mut invoice = Entity::with_id("inv-1");
    invoice
        .raise(InvoiceSent {
            invoice_id: "inv-1".into(),
            email: "ada@example.com".into(),
        })
        .unwrap();
    repo.commit(&mut invoice).unwrap();

    let mut bus = MessageBus::new();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    bus.subscribe("InvoiceSent", move |record: EventRecord| {
        let sent: InvoiceSent = record.decode().unwrap();
        tx.lock().unwrap().send(sent.email).unwrap();
    });

    for record in repo.history("inv-1").unwrap() {
        bus.publish_record(&record).unwrap();
    }

    let email = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(email, "ada@example.com");
}

#[test]
fn several_listeners_on_one_topic() {
    let mut bus = MessageBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for tag in ["audit", "mailer", "metrics"] {
        let seen = Arc::clone(&seen);
        bus.subscribe("InvoiceSent", move |sent: InvoiceSent| {
            seen.lock().unwrap().push(format!("{}:{}", tag, sent.invoice_id));
        });
    }
    assert_eq!(bus.listener_count("InvoiceSent"), 3);

    let notified = bus
        .publish_and_wait(
            "InvoiceSent",
            &InvoiceSent {
                invoice_id: "inv-9".into(),
                email: "bob@example.com".into(),
            },
        )
        .unwrap();
    assert_eq!(notified, 3);

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["audit:inv-9", "mailer:inv-9", "metrics:inv-9"]);
}

#[test]
fn loosely_typed_listeners_read_json_values() {
    let mut bus = MessageBus::new();
    let seen = Arc::new(Mutex::new(None));

    let sink = Arc::clone(&seen);
    bus.subscribe("InvoiceSent", move |value: serde_json::Value| {
        *sink.lock().unwrap() = value["email"].as_str().map(str::to_owned);
    });

    bus.publish_and_wait(
        "InvoiceSent",
        &InvoiceSent {
            invoice_id: "inv-2".into(),
            email: "eve@example.com".into(),
        },
    )
    .unwrap();

    assert_eq!(seen.lock().unwrap().as_deref(), Some("eve@example.com"));
}

#[test]
fn panicking_listener_is_reported() {
    let mut bus = MessageBus::new();
    bus.subscribe("InvoiceSent", |_: serde_json::Value| panic!("mailer down"));

    let err = bus.publish_and_wait("InvoiceSent", "anything").unwrap_err();
    match err {
        MessageBusError::ListenerPanicked { topic, panicked } => {
            assert_eq!(topic, "InvoiceSent");
            assert_eq!(panicked, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn publishing_to_an_empty_topic() {
    let mut bus = MessageBus::default();
    assert_eq!(bus.publish("nobody-home", &1_u8).unwrap(), 0);
}
