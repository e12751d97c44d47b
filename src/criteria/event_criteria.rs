use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Expr;
use crate::event::EventRecord;

/// Structured query over stored events: event type plus an inclusive date
/// range, optionally narrowed to one aggregate.
///
/// Unset fields do not constrain anything, so the default criteria match
/// every record.
///
/// ```ignore
/// let criteria = EventCriteria::new()
///     .of_type("OrderPlaced")
///     .between(monday, friday);
/// let placed = store.query(&criteria.to_expr())?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl EventCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    pub fn for_aggregate(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn between(self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.since(from).until(to)
    }

    pub fn is_empty(&self) -> bool {
        self.event_name.is_none()
            && self.aggregate_id.is_none()
            && self.from.is_none()
            && self.to.is_none()
    }

    /// Build the expression tree. An inverted range can never match and
    /// becomes `Expr::False`.
    pub fn to_expr(&self) -> Expr {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Expr::False;
            }
        }

        let mut parts = Vec::with_capacity(4);
        if let Some(name) = &self.event_name {
            parts.push(Expr::event_name(name.as_str()));
        }
        if let Some(id) = &self.aggregate_id {
            parts.push(Expr::aggregate_id(id.as_str()));
        }
        if let Some(from) = self.from {
            parts.push(Expr::occurred_at_or_after(from));
        }
        if let Some(to) = self.to {
            parts.push(Expr::occurred_at_or_before(to));
        }
        Expr::all(parts)
    }

    pub fn matches(&self, record: &EventRecord) -> bool {
        self.to_expr().evaluate(record)
    }
}

impl From<&EventCriteria> for Expr {
    fn from(criteria: &EventCriteria) -> Self {
        criteria.to_expr()
    }
}

impl From<EventCriteria> for Expr {
    fn from(criteria: EventCriteria) -> Self {
        criteria.to_expr()
    }
}
