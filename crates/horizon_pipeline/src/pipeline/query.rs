//! Read-only lookups. Each call takes its own weakly consistent traversal.

use super::Pipeline;
use crate::iter::{Entries, Iter, NodeWalk};
use crate::node::Node;
use crate::types::Direction;
use std::sync::Arc;

impl<E> Pipeline<E> {
    /// Finds the `occurrence`-th live node accepted by `accept`, scanning in
    /// `direction`.
    pub(crate) fn find_node(
        &self,
        mut accept: impl FnMut(&Node<E>, &E) -> bool,
        occurrence: usize,
        direction: Direction,
    ) -> Option<(Arc<Node<E>>, Arc<E>)> {
        NodeWalk::new(self, direction)
            .filter(|(node, item)| accept(&**node, &**item))
            .nth(occurrence)
    }

    /// Value of the first live element named `name`.
    pub fn get(&self, name: &str) -> Option<Arc<E>> {
        self.get_nth(name, 0, Direction::FromHead)
    }

    /// Value of the `occurrence`-th live element named `name`, counting from
    /// the end given by `direction`.
    pub fn get_nth(&self, name: &str, occurrence: usize, direction: Direction) -> Option<Arc<E>> {
        self.find_node(|node, _| node.name_matches(name), occurrence, direction)
            .map(|(_, item)| item)
    }

    pub fn peek_first(&self) -> Option<(String, Arc<E>)> {
        self.entries().next()
    }

    pub fn peek_last(&self) -> Option<(String, Arc<E>)> {
        self.entries_rev().next()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn contains_value(&self, value: &E) -> bool
    where
        E: PartialEq,
    {
        self.iter().any(|item| *item == *value)
    }

    /// Number of live elements. This is a full traversal, and under
    /// concurrent modification the answer may be stale by the time it
    /// returns.
    pub fn len(&self) -> usize {
        NodeWalk::new(self, Direction::FromHead).count()
    }

    pub fn is_empty(&self) -> bool {
        self.peek_first().is_none()
    }

    pub fn to_vec(&self) -> Vec<Arc<E>> {
        self.iter().collect()
    }

    pub fn to_named_entries(&self) -> Vec<(String, Arc<E>)> {
        self.entries().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().map(|(name, _)| name).collect()
    }

    /// Values from head to tail.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter::new(self, Direction::FromHead)
    }

    /// Values from tail to head.
    pub fn iter_rev(&self) -> Iter<'_, E> {
        Iter::new(self, Direction::FromTail)
    }

    /// `(name, value)` pairs from head to tail.
    pub fn entries(&self) -> Entries<'_, E> {
        Entries::new(self, Direction::FromHead)
    }

    /// `(name, value)` pairs from tail to head.
    pub fn entries_rev(&self) -> Entries<'_, E> {
        Entries::new(self, Direction::FromTail)
    }
}
