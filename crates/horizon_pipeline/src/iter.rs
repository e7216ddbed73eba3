//! Weakly consistent iterators.
//!
//! Every element that stays live for an iterator's whole lifetime is
//! returned exactly once and in order. Elements added or removed while the
//! iterator runs may or may not be seen. Iterators never fail and never
//! yield an element that was not live at some point during the walk.

use crate::node::Node;
use crate::pipeline::Pipeline;
use crate::types::Direction;
use std::sync::Arc;

/// Walks live nodes in one direction, prefetching the next live one.
pub(crate) struct NodeWalk<'a, E> {
    pipeline: &'a Pipeline<E>,
    direction: Direction,
    next: Option<(Arc<Node<E>>, Arc<E>)>,
}

impl<'a, E> NodeWalk<'a, E> {
    pub(crate) fn new(pipeline: &'a Pipeline<E>, direction: Direction) -> Self {
        let start = match direction {
            Direction::FromHead => pipeline.first(),
            Direction::FromTail => pipeline.last(),
        };
        let mut walk = Self {
            pipeline,
            direction,
            next: None,
        };
        walk.next = walk.seek(Some(start));
        walk
    }

    fn step(&self, node: &Arc<Node<E>>) -> Option<Arc<Node<E>>> {
        match self.direction {
            Direction::FromHead => self.pipeline.succ(node),
            Direction::FromTail => self.pipeline.predecessor(node),
        }
    }

    fn seek(&self, mut cursor: Option<Arc<Node<E>>>) -> Option<(Arc<Node<E>>, Arc<E>)> {
        while let Some(node) = cursor {
            if let Some(item) = node.item() {
                return Some((node, item));
            }
            cursor = self.step(&node);
        }
        None
    }
}

impl<E> Iterator for NodeWalk<'_, E> {
    type Item = (Arc<Node<E>>, Arc<E>);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = self.seek(self.step(&current.0));
        Some(current)
    }
}

// ============================================================================
// Public iterators
// ============================================================================

/// Iterator over values, created by [`Pipeline::iter`] and
/// [`Pipeline::iter_rev`].
pub struct Iter<'a, E> {
    walk: NodeWalk<'a, E>,
    last_returned: Option<Arc<Node<E>>>,
}

impl<'a, E> Iter<'a, E> {
    pub(crate) fn new(pipeline: &'a Pipeline<E>, direction: Direction) -> Self {
        Self {
            walk: NodeWalk::new(pipeline, direction),
            last_returned: None,
        }
    }

    /// Removes the element most recently returned by `next`.
    ///
    /// Returns `false` when nothing has been returned yet, when `remove` was
    /// already called for it, or when another thread removed it first.
    pub fn remove(&mut self) -> bool {
        match self.last_returned.take() {
            Some(node) => self.walk.pipeline.remove_node(&node).is_some(),
            None => false,
        }
    }
}

impl<E> Iterator for Iter<'_, E> {
    type Item = Arc<E>;

    fn next(&mut self) -> Option<Arc<E>> {
        let (node, item) = self.walk.next()?;
        self.last_returned = Some(node);
        Some(item)
    }
}

/// Iterator over `(name, value)` pairs, created by [`Pipeline::entries`]
/// and [`Pipeline::entries_rev`].
pub struct Entries<'a, E> {
    walk: NodeWalk<'a, E>,
    last_returned: Option<Arc<Node<E>>>,
}

impl<'a, E> Entries<'a, E> {
    pub(crate) fn new(pipeline: &'a Pipeline<E>, direction: Direction) -> Self {
        Self {
            walk: NodeWalk::new(pipeline, direction),
            last_returned: None,
        }
    }

    /// Removes the entry most recently returned by `next`. See
    /// [`Iter::remove`].
    pub fn remove(&mut self) -> bool {
        match self.last_returned.take() {
            Some(node) => self.walk.pipeline.remove_node(&node).is_some(),
            None => false,
        }
    }
}

impl<E> Iterator for Entries<'_, E> {
    type Item = (String, Arc<E>);

    fn next(&mut self) -> Option<(String, Arc<E>)> {
        let (node, item) = self.walk.next()?;
        let name = node.name().as_ref().clone();
        self.last_returned = Some(node);
        Some((name, item))
    }
}

impl<'a, E> IntoIterator for &'a Pipeline<E> {
    type Item = Arc<E>;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Iter<'a, E> {
        self.iter()
    }
}
