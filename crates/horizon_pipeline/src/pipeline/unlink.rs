//! Physical removal of tombstoned nodes.
//!
//! Unlinking never decides membership; the item tombstone already did. The
//! code here only keeps the chain short and the caches close to the ends.
//! Every step is safe to repeat and safe to race with another thread doing
//! the same work.

use super::{Pipeline, Step};
use crate::node::{same, Node};
use crossbeam::utils::Backoff;
use std::sync::Arc;
use tracing::trace;

/// A dead run squeezed out of the chain, together with the node that now
/// follows the surviving predecessor.
pub(crate) type Squeezed<E> = (Vec<Arc<Node<E>>>, Arc<Node<E>>);

impl<E> Pipeline<E> {
    /// Unlinks the tombstoned node `x`. Calling it again, or on a node that
    /// is already out of the chain, is a no-op.
    pub(crate) fn unlink(&self, x: &Arc<Node<E>>) {
        match (self.step_prev(x), self.step_next(x)) {
            (Step::Detached, _) | (_, Step::Detached) | (Step::Boundary, Step::Boundary) => {}
            (Step::Boundary, Step::Node(_)) => self.unlink_first(x),
            (Step::Node(prev), Step::Boundary) => self.unlink_last(x, prev),
            (Step::Node(prev), Step::Node(next)) => self.unlink_interior(x, prev, next),
        }
    }

    /// `first` is dead but stays as the boundary; squeeze out the dead run
    /// behind it.
    fn unlink_first(&self, first: &Arc<Node<E>>) {
        let Some((run, succ)) = self.skip_deleted_successors(first) else {
            return;
        };
        self.skip_deleted_predecessors(&succ);
        if !first.has_prev() && self.is_splice_point_from_tail(&succ) && succ.prev_is(first) {
            self.update_head();
            self.update_tail();
            if let Some(last_dead) = run.last() {
                last_dead.lazy_set_prev(Some(self.prev_terminator.clone()));
            }
        }
    }

    /// `last` is dead but stays as the boundary; squeeze out the dead run
    /// in front of it.
    fn unlink_last(&self, last: &Arc<Node<E>>, prev: Arc<Node<E>>) {
        let mut p = prev.clone();
        let mut last_dead = None;
        while !p.is_active() {
            match self.step_prev(&p) {
                Step::Node(q) => {
                    last_dead = Some(p);
                    p = q;
                }
                Step::Boundary => break,
                Step::Detached => return,
            }
        }
        let Some(last_dead) = last_dead else {
            return;
        };
        if self.is_detached(&p) || !last.cas_prev(&Some(prev), Some(p.clone())) {
            return;
        }
        self.skip_deleted_successors(&p);
        if !last.has_next() && self.is_splice_point(&p) && p.next_is(last) {
            self.update_head();
            self.update_tail();
            last_dead.lazy_set_next(Some(self.next_terminator.clone()));
        }
    }

    fn unlink_interior(&self, x: &Arc<Node<E>>, prev: Arc<Node<E>>, next: Arc<Node<E>>) {
        let mut hops = 1;

        let mut active_pred = prev;
        let is_first = loop {
            if active_pred.is_active() {
                break false;
            }
            match self.step_prev(&active_pred) {
                Step::Node(q) => {
                    active_pred = q;
                    hops += 1;
                }
                Step::Boundary => break true,
                Step::Detached => return,
            }
        };

        let mut active_succ = next;
        let is_last = loop {
            if active_succ.is_active() {
                break false;
            }
            match self.step_next(&active_succ) {
                Step::Node(q) => {
                    active_succ = q;
                    hops += 1;
                }
                Step::Boundary => break true,
                Step::Detached => return,
            }
        };

        if hops < self.config.unlink_hop_threshold && !(is_first || is_last) {
            // Short interior runs are left for the next traversal to squeeze.
            trace!(hops, "Deferring unlink of interior node");
            return;
        }

        self.skip_deleted_successors(&active_pred);
        self.skip_deleted_predecessors(&active_succ);

        let pred_ok = if is_first {
            !active_pred.has_prev()
        } else {
            active_pred.is_active()
        };
        let succ_ok = if is_last {
            !active_succ.has_next()
        } else {
            active_succ.is_active()
        };
        if (is_first || is_last)
            && pred_ok
            && succ_ok
            && active_pred.next_is(&active_succ)
            && active_succ.prev_is(&active_pred)
        {
            // x is unreachable from both ends now. Move the caches off it
            // before marking it.
            self.update_head();
            self.update_tail();
            if is_first {
                x.lazy_set_prev(Some(self.prev_terminator.clone()));
            }
            if is_last {
                x.lazy_set_next(Some(self.next_terminator.clone()));
            }
            trace!(hops, is_first, is_last, "Unlinked node next to a pipeline end");
        }
    }

    fn is_splice_point_from_tail(&self, node: &Node<E>) -> bool {
        node.is_active() || !node.has_next()
    }

    /// Makes `x.next` skip the dead nodes directly after it. The thread whose
    /// CAS performs the squeeze owns the run and rewrites its links to point
    /// at the surviving neighbours, which keeps cursors parked inside the run
    /// ordered and stops dead nodes from keeping each other alive.
    ///
    /// Returns the squeezed run when this call performed the squeeze.
    pub(crate) fn skip_deleted_successors(&self, x: &Arc<Node<E>>) -> Option<Squeezed<E>> {
        let backoff = Backoff::new();
        loop {
            let next = x.next();
            let mut p = match self.classify(next.clone()) {
                Step::Node(n) => n,
                Step::Boundary | Step::Detached => return None,
            };

            let mut run = Vec::new();
            let mut stale = false;
            while !p.is_active() {
                match self.step_next(&p) {
                    Step::Node(q) => {
                        run.push(p);
                        p = q;
                    }
                    // a dead last node stays as the boundary
                    Step::Boundary => break,
                    Step::Detached => {
                        stale = true;
                        break;
                    }
                }
            }
            if !stale {
                if run.is_empty() {
                    return None;
                }
                if x.cas_next(&next, Some(p.clone())) {
                    self.retire_run(&run, x, &p);
                    trace!(len = run.len(), "Squeezed dead run out of pipeline");
                    return Some((run, p));
                }
            }
            if !self.is_splice_point(x) {
                return None;
            }
            backoff.spin();
        }
    }

    /// Makes `x.prev` skip the dead nodes directly before it. `prev` links
    /// are hints, so this gives up rather than spin on a detached chain.
    pub(crate) fn skip_deleted_predecessors(&self, x: &Arc<Node<E>>) {
        let backoff = Backoff::new();
        loop {
            let prev = x.prev();
            let mut p = match self.classify(prev.clone()) {
                Step::Node(p) => p,
                Step::Boundary | Step::Detached => return,
            };
            while !p.is_active() {
                match self.step_prev(&p) {
                    Step::Node(q) => p = q,
                    Step::Boundary => break,
                    Step::Detached => return,
                }
            }
            let fresh = Some(p);
            if same(&prev, &fresh) || x.cas_prev(&prev, fresh) {
                return;
            }
            if !self.is_splice_point_from_tail(x) {
                return;
            }
            backoff.spin();
        }
    }

    fn retire_run(&self, run: &[Arc<Node<E>>], pred: &Arc<Node<E>>, succ: &Arc<Node<E>>) {
        for node in run {
            node.lazy_set_prev(Some(pred.clone()));
            node.lazy_set_next(Some(succ.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::node::Node;
    use crate::{Pipeline, PipelineConfig};
    use std::sync::Arc;

    /// Counts every node reachable from the first node, live or dead.
    fn chain_len<E>(pipeline: &Pipeline<E>) -> usize {
        let mut count = 1;
        let mut p: Arc<Node<E>> = pipeline.first();
        while let Some(next) = pipeline.raw_succ(&p) {
            count += 1;
            p = next;
        }
        count
    }

    fn tombstone<E>(node: &Arc<Node<E>>) {
        let item = node.item().unwrap();
        assert!(node.cas_item(&item, None));
    }

    fn nth_node<E>(pipeline: &Pipeline<E>, index: usize) -> Arc<Node<E>> {
        let mut p = pipeline.first();
        for _ in 0..index {
            p = pipeline.raw_succ(&p).unwrap();
        }
        p
    }

    #[test]
    fn unlink_is_idempotent() {
        let pipeline = Pipeline::new();
        for (name, value) in [("a", 1), ("b", 2), ("c", 3)] {
            pipeline.add_last(name, value);
        }
        // chain: boundary, a, b, c
        let b = nth_node(&pipeline, 2);
        tombstone(&b);
        for _ in 0..3 {
            pipeline.unlink(&b);
        }
        assert_eq!(pipeline.names(), ["a", "c"]);
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn short_interior_unlink_is_deferred_then_helped() {
        let pipeline = Pipeline::new();
        for (name, value) in [("a", 1), ("b", 2), ("c", 3)] {
            pipeline.add_last(name, value);
        }
        let b = nth_node(&pipeline, 2);
        tombstone(&b);
        pipeline.unlink(&b);
        // one hop on each side: left in place
        assert_eq!(chain_len(&pipeline), 4);

        // a traversal crossing the dead node squeezes it
        assert_eq!(pipeline.to_vec().len(), 2);
        assert_eq!(chain_len(&pipeline), 3);
        // the squeezed node forwards to its former neighbours
        assert_eq!(b.prev().unwrap().item().as_deref(), Some(&1));
        assert_eq!(b.next().unwrap().item().as_deref(), Some(&3));
    }

    #[test]
    fn zero_threshold_unlinks_eagerly() {
        let pipeline = Pipeline::with_config(PipelineConfig::default().with_unlink_hop_threshold(0));
        for (name, value) in [("a", 1), ("b", 2), ("c", 3)] {
            pipeline.add_last(name, value);
        }
        let b = nth_node(&pipeline, 2);
        tombstone(&b);
        pipeline.unlink(&b);
        assert_eq!(chain_len(&pipeline), 3);
    }

    #[test]
    fn removal_at_the_tail_marks_terminator() {
        let pipeline = Pipeline::new();
        for (name, value) in [("a", 1), ("b", 2), ("c", 3)] {
            pipeline.add_last(name, value);
        }
        let b = nth_node(&pipeline, 2);
        let c = nth_node(&pipeline, 3);
        tombstone(&c);
        pipeline.unlink(&c);
        tombstone(&b);
        pipeline.unlink(&b);

        // c stays as the dead last node; b is squeezed and detached
        assert!(pipeline.is_detached(&b));
        assert!(Arc::ptr_eq(&pipeline.last(), &c));
        assert_eq!(pipeline.names(), ["a"]);
        assert_eq!(chain_len(&pipeline), 3);
    }

    #[test]
    fn removal_at_the_head_marks_terminator() {
        let pipeline = Pipeline::new();
        pipeline.add_last("a", 1);
        pipeline.add_last("b", 2);
        let a = nth_node(&pipeline, 1);
        tombstone(&a);
        pipeline.unlink(&a);

        assert!(pipeline.is_detached(&a));
        assert_eq!(chain_len(&pipeline), 2);
        assert_eq!(pipeline.peek_first().map(|(_, v)| *v), Some(2));
    }
}
