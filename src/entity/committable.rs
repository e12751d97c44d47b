use super::{Aggregate, Entity};

/// Anything a repository can persist in one call.
///
/// Aggregates are the usual case. Loose entities work too, and so does any
/// group of committables (slice, array or `Vec` of `&mut`), including mixed
/// groups of `&mut dyn Committable`. Entities come out in group order.
pub trait Committable {
    fn entities_mut(&mut self) -> Vec<&mut Entity>;
}

impl<A: Aggregate> Committable for A {
    fn entities_mut(&mut self) -> Vec<&mut Entity> {
        vec![self.entity_mut()]
    }
}

impl Committable for Entity {
    fn entities_mut(&mut self) -> Vec<&mut Entity> {
        vec![self]
    }
}

impl<'a, C: Committable + ?Sized> Committable for [&'a mut C] {
    fn entities_mut(&mut self) -> Vec<&mut Entity> {
        self.iter_mut().flat_map(|c| c.entities_mut()).collect()
    }
}

impl<'a, C: Committable + ?Sized, const N: usize> Committable for [&'a mut C; N] {
    fn entities_mut(&mut self) -> Vec<&mut Entity> {
        self.iter_mut().flat_map(|c| c.entities_mut()).collect()
    }
}

impl<'a, C: Committable + ?Sized> Committable for Vec<&'a mut C> {
    fn entities_mut(&mut self) -> Vec<&mut Entity> {
        self.iter_mut().flat_map(|c| c.entities_mut()).collect()
    }
}
