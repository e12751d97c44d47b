use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::event::EventRecord;

/// Boolean expression over [`EventRecord`]s.
///
/// Built by hand or from an [`EventCriteria`](super::EventCriteria), composed
/// with `&`, `|` and `!`, and evaluated against any collection of records.
///
/// ```ignore
/// let recent_orders = Expr::event_name("OrderPlaced") & Expr::occurred_at_or_after(cutoff);
/// let hits: Vec<_> = recent_orders.filter(records.iter()).collect();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    True,
    False,
    EventName(String),
    AggregateId(String),
    OccurredAtOrAfter(DateTime<Utc>),
    OccurredAtOrBefore(DateTime<Utc>),
    Metadata(String, String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn event_name(name: impl Into<String>) -> Self {
        Expr::EventName(name.into())
    }

    pub fn aggregate_id(id: impl Into<String>) -> Self {
        Expr::AggregateId(id.into())
    }

    pub fn occurred_at_or_after(timestamp: DateTime<Utc>) -> Self {
        Expr::OccurredAtOrAfter(timestamp)
    }

    pub fn occurred_at_or_before(timestamp: DateTime<Utc>) -> Self {
        Expr::OccurredAtOrBefore(timestamp)
    }

    pub fn metadata(key: impl Into<String>, value: impl Into<String>) -> Self {
        Expr::Metadata(key.into(), value.into())
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// AND of all expressions; `True` when empty.
    pub fn all<I: IntoIterator<Item = Expr>>(exprs: I) -> Self {
        exprs
            .into_iter()
            .reduce(Expr::and)
            .unwrap_or(Expr::True)
    }

    /// OR of all expressions; `False` when empty.
    pub fn any<I: IntoIterator<Item = Expr>>(exprs: I) -> Self {
        exprs
            .into_iter()
            .reduce(Expr::or)
            .unwrap_or(Expr::False)
    }

    pub fn evaluate(&self, record: &EventRecord) -> bool {
        match self {
            Expr::True => true,
            Expr::False => false,
            Expr::EventName(name) => record.event_name == *name,
            Expr::AggregateId(id) => record.aggregate_id.as_deref() == Some(id.as_str()),
            Expr::OccurredAtOrAfter(from) => record.timestamp >= *from,
            Expr::OccurredAtOrBefore(to) => record.timestamp <= *to,
            Expr::Metadata(key, value) => record.meta(key) == Some(value.as_str()),
            Expr::And(left, right) => left.evaluate(record) && right.evaluate(record),
            Expr::Or(left, right) => left.evaluate(record) || right.evaluate(record),
            Expr::Not(inner) => !inner.evaluate(record),
        }
    }

    /// Lazily keep the records this expression accepts.
    pub fn filter<'a, I>(&'a self, records: I) -> impl Iterator<Item = &'a EventRecord> + 'a
    where
        I: IntoIterator<Item = &'a EventRecord>,
        I::IntoIter: 'a,
    {
        records
            .into_iter()
            .filter(move |record| self.evaluate(record))
    }

    /// Fold away constant sub-expressions and double negations.
    pub fn simplify(self) -> Self {
        match self {
            Expr::And(left, right) => match (left.simplify(), right.simplify()) {
                (Expr::False, _) | (_, Expr::False) => Expr::False,
                (Expr::True, other) | (other, Expr::True) => other,
                (left, right) => left.and(right),
            },
            Expr::Or(left, right) => match (left.simplify(), right.simplify()) {
                (Expr::True, _) | (_, Expr::True) => Expr::True,
                (Expr::False, other) | (other, Expr::False) => other,
                (left, right) => left.or(right),
            },
            Expr::Not(inner) => match inner.simplify() {
                Expr::True => Expr::False,
                Expr::False => Expr::True,
                Expr::Not(inner) => *inner,
                other => !other,
            },
            leaf => leaf,
        }
    }
}

impl BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.and(rhs)
    }
}

impl BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.or(rhs)
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = |t: &DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        match self {
            Expr::True => write!(f, "true"),
            Expr::False => write!(f, "false"),
            Expr::EventName(name) => write!(f, "event_name == {:?}", name),
            Expr::AggregateId(id) => write!(f, "aggregate_id == {:?}", id),
            Expr::OccurredAtOrAfter(from) => write!(f, "timestamp >= {}", ts(from)),
            Expr::OccurredAtOrBefore(to) => write!(f, "timestamp <= {}", ts(to)),
            Expr::Metadata(key, value) => write!(f, "metadata[{:?}] == {:?}", key, value),
            Expr::And(left, right) => write!(f, "({} AND {})", left, right),
            Expr::Or(left, right) => write!(f, "({} OR {})", left, right),
            Expr::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}
