//! Query building over stored events.
//!
//! [`EventCriteria`] is the structured form (type, aggregate, date range);
//! [`Expr`] is the boolean tree every store evaluates. Anything else that
//! needs to combine predicates goes through [`Specification`].

mod event_criteria;
mod expr;
mod specification;

pub use event_criteria::EventCriteria;
pub use expr::Expr;
pub use specification::{And, Not, Or, Specification};
