use super::{EventCriteria, Expr};
use crate::event::EventRecord;

/// A composable predicate over `T`.
///
/// Closures are specifications, and so are [`Expr`] and [`EventCriteria`]
/// over event records, so all of them combine freely.
pub trait Specification<T: ?Sized> {
    fn is_satisfied_by(&self, candidate: &T) -> bool;

    fn and<S>(self, other: S) -> And<Self, S>
    where
        Self: Sized,
        S: Specification<T>,
    {
        And(self, other)
    }

    fn or<S>(self, other: S) -> Or<Self, S>
    where
        Self: Sized,
        S: Specification<T>,
    {
        Or(self, other)
    }

    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }
}

#[derive(Debug, Clone)]
pub struct And<A, B>(A, B);

#[derive(Debug, Clone)]
pub struct Or<A, B>(A, B);

#[derive(Debug, Clone)]
pub struct Not<A>(A);

impl<T: ?Sized, A, B> Specification<T> for And<A, B>
where
    A: Specification<T>,
    B: Specification<T>,
{
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        self.0.is_satisfied_by(candidate) && self.1.is_satisfied_by(candidate)
    }
}

impl<T: ?Sized, A, B> Specification<T> for Or<A, B>
where
    A: Specification<T>,
    B: Specification<T>,
{
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        self.0.is_satisfied_by(candidate) || self.1.is_satisfied_by(candidate)
    }
}

impl<T: ?Sized, A: Specification<T>> Specification<T> for Not<A> {
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        !self.0.is_satisfied_by(candidate)
    }
}

impl<T: ?Sized, F> Specification<T> for F
where
    F: Fn(&T) -> bool,
{
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        self(candidate)
    }
}

impl Specification<EventRecord> for Expr {
    fn is_satisfied_by(&self, candidate: &EventRecord) -> bool {
        self.evaluate(candidate)
    }
}

impl Specification<EventRecord> for EventCriteria {
    fn is_satisfied_by(&self, candidate: &EventRecord) -> bool {
        self.matches(candidate)
    }
}
