//! Insertion: appending at either end and splicing next to a named anchor.

use super::Pipeline;
use crate::error::{PipelineError, Result};
use crate::node::Node;
use crate::types::Direction;
use crossbeam::utils::Backoff;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
enum Side {
    Before,
    After,
}

impl<E> Pipeline<E> {
    /// Inserts `(name, value)` at the head.
    pub fn add_first(&self, name: impl Into<String>, value: impl Into<Arc<E>>) {
        let node = Arc::new(Node::new(name.into(), value.into()));
        self.link_first(node);
    }

    /// Inserts `(name, value)` at the tail.
    pub fn add_last(&self, name: impl Into<String>, value: impl Into<Arc<E>>) {
        let node = Arc::new(Node::new(name.into(), value.into()));
        self.link_last(node);
    }

    /// Inserts `(name, value)` directly before the `occurrence`-th live
    /// element named `anchor`, counting from the end given by `direction`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotFound`] if `anchor` occurs fewer than
    /// `occurrence + 1` times.
    pub fn insert_before(
        &self,
        anchor: &str,
        name: impl Into<String>,
        value: impl Into<Arc<E>>,
        occurrence: usize,
        direction: Direction,
    ) -> Result<()> {
        self.insert_relative(Side::Before, anchor, name.into(), value.into(), occurrence, direction)
    }

    /// Inserts `(name, value)` directly after the `occurrence`-th live
    /// element named `anchor`, counting from the end given by `direction`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotFound`] if `anchor` occurs fewer than
    /// `occurrence + 1` times.
    pub fn insert_after(
        &self,
        anchor: &str,
        name: impl Into<String>,
        value: impl Into<Arc<E>>,
        occurrence: usize,
        direction: Direction,
    ) -> Result<()> {
        self.insert_relative(Side::After, anchor, name.into(), value.into(), occurrence, direction)
    }

    fn link_first(&self, node: Arc<Node<E>>) {
        let backoff = Backoff::new();
        loop {
            let Some((h, p)) = self.seek_first() else {
                backoff.snooze();
                continue;
            };
            node.lazy_set_next(Some(p.clone()));
            if p.cas_prev(&None, Some(node.clone())) {
                // The new node is live from here on. Keep the cache within
                // one hop of the boundary.
                if !Arc::ptr_eq(&p, &h) {
                    self.cas_head(&h, node);
                }
                return;
            }
            backoff.spin();
        }
    }

    fn link_last(&self, node: Arc<Node<E>>) {
        let backoff = Backoff::new();
        loop {
            let Some((t, p)) = self.seek_last() else {
                backoff.snooze();
                continue;
            };
            node.lazy_set_prev(Some(p.clone()));
            if p.cas_next(&None, Some(node.clone())) {
                if !Arc::ptr_eq(&p, &t) {
                    self.cas_tail(&t, node);
                }
                return;
            }
            backoff.spin();
        }
    }

    fn insert_relative(
        &self,
        side: Side,
        anchor: &str,
        name: String,
        value: Arc<E>,
        occurrence: usize,
        direction: Direction,
    ) -> Result<()> {
        let backoff = Backoff::new();
        loop {
            let (target, _) = self
                .find_node(|n, _| n.name_matches(anchor), occurrence, direction)
                .ok_or_else(|| PipelineError::not_found(anchor, occurrence, direction))?;

            let node = Arc::new(Node::new(name.clone(), value.clone()));
            let (linked, settled) = match side {
                Side::After => {
                    let linked = self.splice_after(&target, &node);
                    (linked, linked && self.is_splice_point(&target))
                }
                Side::Before => match self.predecessor(&target) {
                    Some(pred) => {
                        let linked = self.splice_after(&pred, &node);
                        (
                            linked,
                            linked && self.is_splice_point(&pred) && target.is_active(),
                        )
                    }
                    None => {
                        let linked = self.splice_before_first(&target, &node);
                        (linked, linked && target.is_active())
                    }
                },
            };
            if settled {
                return Ok(());
            }

            // The splice point died underneath us, so the new node may be
            // unreachable or out of place. Retract it; if somebody else
            // already removed it, it was visible and the insert stands.
            if linked {
                if !node.cas_item(&value, None) {
                    return Ok(());
                }
                self.unlink(&node);
            }
            trace!("Retrying {:?} insert next to '{}'", side, anchor);
            backoff.snooze();
        }
    }

    /// A node can take a new successor while it is live or still first.
    /// Both conditions are monotonic: once false they stay false.
    pub(crate) fn is_splice_point(&self, node: &Node<E>) -> bool {
        node.is_active() || !node.has_prev()
    }

    /// Links `node` between `pred` and its current successor. Returns
    /// `false` without linking when `pred` stopped being a splice point.
    fn splice_after(&self, pred: &Arc<Node<E>>, node: &Arc<Node<E>>) -> bool {
        let backoff = Backoff::new();
        loop {
            if !self.is_splice_point(pred) {
                return false;
            }
            let next = pred.next();
            if next.as_ref().is_some_and(|n| self.is_terminator(n)) {
                return false;
            }
            node.lazy_set_prev(Some(pred.clone()));
            node.lazy_set_next(next.clone());
            if pred.cas_next(&next, Some(node.clone())) {
                match next {
                    Some(succ) => {
                        if node.next_is(&succ) {
                            succ.cas_prev(&Some(pred.clone()), Some(node.clone()));
                        }
                    }
                    None => {
                        let t = self.tail.load_full();
                        if Arc::ptr_eq(&t, pred) {
                            self.cas_tail(&t, node.clone());
                        }
                    }
                }
                return true;
            }
            backoff.spin();
        }
    }

    fn splice_before_first(&self, first: &Arc<Node<E>>, node: &Arc<Node<E>>) -> bool {
        node.lazy_set_prev(None);
        node.lazy_set_next(Some(first.clone()));
        if !first.cas_prev(&None, Some(node.clone())) {
            return false;
        }
        let h = self.head.load_full();
        if Arc::ptr_eq(&h, first) {
            self.cas_head(&h, node.clone());
        }
        true
    }
}
