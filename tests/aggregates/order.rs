use domain_events::{DomainEvent, Entity, EventRecord, PayloadError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DomainEvent)]
#[domain_event(aggregate_id = order_id)]
pub struct OrderPlaced {
    pub order_id: String,
    pub customer: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DomainEvent)]
#[domain_event(name = "orders.shipped", aggregate_id = order_id)]
pub struct OrderShipped {
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DomainEvent)]
#[domain_event(aggregate_id = order_id)]
pub struct OrderCancelled {
    pub order_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Draft,
    Placed,
    Shipped,
    Cancelled,
}

#[derive(Debug, Default)]
pub struct Order {
    pub entity: Entity,
    pub customer: String,
    pub quantity: u32,
    pub status: Status,
}

impl Order {
    pub fn place(id: &str, customer: &str, quantity: u32) -> Result<Self, PayloadError> {
        let mut order = Order::default();
        order.placed(id, customer, quantity)?;
        Ok(order)
    }

    pub fn ship(&mut self) -> Result<(), PayloadError> {
        if self.status != Status::Placed {
            return Ok(());
        }
        self.status = Status::Shipped;
        self.entity.raise(OrderShipped {
            order_id: self.entity.id().to_string(),
        })
    }

    pub fn cancel(&mut self, reason: &str) -> Result<(), PayloadError> {
        if self.status == Status::Shipped || self.status == Status::Cancelled {
            return Ok(());
        }
        self.status = Status::Cancelled;
        self.entity.raise(OrderCancelled {
            order_id: self.entity.id().to_string(),
            reason: reason.to_string(),
        })
    }

    fn placed(&mut self, id: &str, customer: &str, quantity: u32) -> Result<(), PayloadError> {
        self.entity.set_id(id);
        self.customer = customer.to_string();
        self.quantity = quantity;
        self.status = Status::Placed;
        self.entity.raise(OrderPlaced {
            order_id: id.to_string(),
            customer: customer.to_string(),
            quantity,
        })
    }

    fn replay(&mut self, record: &EventRecord) -> Result<(), PayloadError> {
        match record.event_name.as_str() {
            "OrderPlaced" => {
                let event: OrderPlaced = record.decode()?;
                self.placed(&event.order_id, &event.customer, event.quantity)
            }
            "orders.shipped" => self.ship(),
            "OrderCancelled" => {
                let event: OrderCancelled = record.decode()?;
                self.cancel(&event.reason)
            }
            other => Err(PayloadError {
                message: format!("unknown order event {}", other),
            }),
        }
    }
}

domain_events::impl_aggregate!(Order, entity, replay, PayloadError);
