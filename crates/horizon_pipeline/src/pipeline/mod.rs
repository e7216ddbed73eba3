//! # Pipeline Core
//!
//! [`Pipeline`] is a lock-free, named, doubly-linked sequence. Every mutation
//! is a short retry loop around single-word compare-and-swap operations on
//! node links, so registration and removal can run concurrently with
//! traversals on any number of threads.
//!
//! ## Structure
//!
//! - `head` and `tail` are caches, not authorities. The true boundaries are
//!   the nodes whose `prev` (respectively `next`) link is empty. Readers walk
//!   past a stale cache and help move it forward.
//! - A new pipeline holds one dead boundary node so the caches are never empty.
//! - Removal is two-phase: the item is tombstoned (the linearization point),
//!   then the node is spliced out of the chain, possibly later and possibly
//!   by another thread.
//!
//! The operations themselves are split by concern across the submodules:
//! `link` (insertion), `unlink` (physical removal), `query` (read-only
//! lookups) and `modify` (removal, replacement, renaming).

mod link;
mod modify;
mod query;
mod unlink;

use crate::config::PipelineConfig;
use crate::node::{Link, Node};
use arc_swap::ArcSwap;
use crossbeam::utils::{Backoff, CachePadded};
use std::fmt;
use std::sync::Arc;

/// Classification of a node link as seen by a traversal.
pub(crate) enum Step<E> {
    /// A real neighbour.
    Node(Arc<Node<E>>),
    /// No neighbour: the node is a boundary of the chain.
    Boundary,
    /// A terminator sentinel: the node was detached at this end.
    Detached,
}

/// A lock-free, named, doubly-linked concurrent sequence.
///
/// Elements are `(name, value)` pairs. Names need not be unique; lookups
/// select among duplicates with an occurrence index and a [`Direction`].
/// Values are shared as `Arc<E>`, so the same value may sit in several
/// nodes at once.
///
/// All operations take `&self`; share a pipeline between threads with an
/// `Arc<Pipeline<E>>` or scoped borrows.
///
/// [`Direction`]: crate::Direction
pub struct Pipeline<E> {
    head: CachePadded<ArcSwap<Node<E>>>,
    tail: CachePadded<ArcSwap<Node<E>>>,
    prev_terminator: Arc<Node<E>>,
    next_terminator: Arc<Node<E>>,
    config: PipelineConfig,
}

impl<E> Pipeline<E> {
    /// Creates an empty pipeline with default tuning.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Creates an empty pipeline. Out-of-range settings are clamped.
    pub fn with_config(config: PipelineConfig) -> Self {
        let boundary = Arc::new(Node::dead());
        Self {
            head: CachePadded::new(ArcSwap::new(boundary.clone())),
            tail: CachePadded::new(ArcSwap::new(boundary)),
            prev_terminator: Arc::new(Node::dead()),
            next_terminator: Arc::new(Node::dead()),
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ========================================================================
    // Link classification
    // ========================================================================

    fn is_terminator(&self, node: &Arc<Node<E>>) -> bool {
        Arc::ptr_eq(node, &self.prev_terminator) || Arc::ptr_eq(node, &self.next_terminator)
    }

    fn classify(&self, link: Link<E>) -> Step<E> {
        match link {
            Some(node) if self.is_terminator(&node) => Step::Detached,
            Some(node) => Step::Node(node),
            None => Step::Boundary,
        }
    }

    pub(crate) fn step_prev(&self, node: &Node<E>) -> Step<E> {
        self.classify(node.prev())
    }

    pub(crate) fn step_next(&self, node: &Node<E>) -> Step<E> {
        self.classify(node.next())
    }

    fn is_detached(&self, node: &Node<E>) -> bool {
        matches!(self.step_prev(node), Step::Detached)
            || matches!(self.step_next(node), Step::Detached)
    }

    // ========================================================================
    // Head / tail caches
    // ========================================================================

    fn cas_head(&self, current: &Arc<Node<E>>, new: Arc<Node<E>>) -> bool {
        let previous = self.head.compare_and_swap(current, new);
        Arc::ptr_eq(&*previous, current)
    }

    fn cas_tail(&self, current: &Arc<Node<E>>, new: Arc<Node<E>>) -> bool {
        let previous = self.tail.compare_and_swap(current, new);
        Arc::ptr_eq(&*previous, current)
    }

    /// Walks `prev` links from the cached head to the true first node, two
    /// hops at a time, jumping to a fresher head whenever the cache moved.
    ///
    /// Returns the cache value the walk started from together with the first
    /// node, or `None` if the walk ran into a detached node and must restart.
    fn seek_first(&self) -> Option<(Arc<Node<E>>, Arc<Node<E>>)> {
        let mut h = self.head.load_full();
        let mut p = h.clone();
        loop {
            let q = match self.step_prev(&p) {
                Step::Boundary => return Some((h, p)),
                Step::Detached => {
                    if Arc::ptr_eq(&p, &h) {
                        self.repair_head(&h);
                    }
                    return None;
                }
                Step::Node(q) => q,
            };
            p = match self.step_prev(&q) {
                Step::Boundary => return Some((h, q)),
                Step::Detached => return None,
                Step::Node(r) => {
                    // Check for head updates every other hop.
                    let fresh = self.head.load_full();
                    if Arc::ptr_eq(&fresh, &h) {
                        r
                    } else {
                        h = fresh;
                        h.clone()
                    }
                }
            };
        }
    }

    fn seek_last(&self) -> Option<(Arc<Node<E>>, Arc<Node<E>>)> {
        let mut t = self.tail.load_full();
        let mut p = t.clone();
        loop {
            let q = match self.step_next(&p) {
                Step::Boundary => return Some((t, p)),
                Step::Detached => {
                    if Arc::ptr_eq(&p, &t) {
                        self.repair_tail(&t);
                    }
                    return None;
                }
                Step::Node(q) => q,
            };
            p = match self.step_next(&q) {
                Step::Boundary => return Some((t, q)),
                Step::Detached => return None,
                Step::Node(r) => {
                    // Check for tail updates every other hop.
                    let fresh = self.tail.load_full();
                    if Arc::ptr_eq(&fresh, &t) {
                        r
                    } else {
                        t = fresh;
                        t.clone()
                    }
                }
            };
        }
    }

    /// The cached head was detached at the head end; its forwarding `next`
    /// link is still ordered, so move the cache along it.
    fn repair_head(&self, h: &Arc<Node<E>>) {
        if let Step::Node(n) = self.step_next(h) {
            self.cas_head(h, n);
        }
    }

    fn repair_tail(&self, t: &Arc<Node<E>>) {
        if let Step::Node(p) = self.step_prev(t) {
            self.cas_tail(t, p);
        }
    }

    /// Returns the first node (the one whose `prev` is empty), moving the
    /// head cache onto it. The node may be dead.
    pub(crate) fn first(&self) -> Arc<Node<E>> {
        let backoff = Backoff::new();
        loop {
            if let Some((h, p)) = self.seek_first() {
                if Arc::ptr_eq(&h, &p) || self.cas_head(&h, p.clone()) {
                    return p;
                }
            }
            backoff.snooze();
        }
    }

    /// Returns the last node (the one whose `next` is empty), moving the
    /// tail cache onto it. The node may be dead.
    pub(crate) fn last(&self) -> Arc<Node<E>> {
        let backoff = Backoff::new();
        loop {
            if let Some((t, p)) = self.seek_last() {
                if Arc::ptr_eq(&t, &p) || self.cas_tail(&t, p.clone()) {
                    return p;
                }
            }
            backoff.snooze();
        }
    }

    /// Moves the head cache off a dead node onto the true first node.
    /// Best effort: gives up on contention or a detached walk.
    pub(crate) fn update_head(&self) {
        loop {
            let h = self.head.load_full();
            if h.is_active() || !h.has_prev() {
                return;
            }
            match self.seek_first() {
                Some((h, p)) => {
                    if Arc::ptr_eq(&h, &p) || self.cas_head(&h, p) {
                        return;
                    }
                }
                None => return,
            }
        }
    }

    pub(crate) fn update_tail(&self) {
        loop {
            let t = self.tail.load_full();
            if t.is_active() || !t.has_next() {
                return;
            }
            match self.seek_last() {
                Some((t, p)) => {
                    if Arc::ptr_eq(&t, &p) || self.cas_tail(&t, p) {
                        return;
                    }
                }
                None => return,
            }
        }
    }

    // ========================================================================
    // Neighbours
    // ========================================================================

    /// Forward step for traversals. A live node followed by dead ones gets
    /// the dead run squeezed out before stepping.
    pub(crate) fn succ(&self, p: &Arc<Node<E>>) -> Option<Arc<Node<E>>> {
        if p.is_active() {
            if let Step::Node(n) = self.step_next(p) {
                if !n.is_active() {
                    self.skip_deleted_successors(p);
                }
            }
        }
        self.raw_succ(p)
    }

    /// Forward step without helping.
    pub(crate) fn raw_succ(&self, p: &Node<E>) -> Option<Arc<Node<E>>> {
        match self.step_next(p) {
            Step::Node(n) => Some(n),
            Step::Boundary | Step::Detached => None,
        }
    }

    /// Backward step for traversals.
    ///
    /// Returns the nearest live node before `x`, or the dead first node when
    /// nothing before `x` is live, or `None` when `x` itself is first or was
    /// detached at the head end.
    ///
    /// `prev` links are hints. For a live `x` the answer is checked against
    /// the authoritative `next` chain and the hint is repaired on the way.
    pub(crate) fn predecessor(&self, x: &Arc<Node<E>>) -> Option<Arc<Node<E>>> {
        let hint = x.prev();
        let mut anchor = match self.classify(hint.clone()) {
            Step::Node(p) => p,
            Step::Boundary | Step::Detached => return None,
        };
        while !anchor.is_active() {
            match self.step_prev(&anchor) {
                Step::Node(p) => anchor = p,
                Step::Boundary => break,
                Step::Detached if x.is_active() => {
                    anchor = self.first();
                    break;
                }
                Step::Detached => return None,
            }
        }
        if !x.is_active() {
            return Some(anchor);
        }

        let mut best = anchor.clone();
        let mut p = anchor.clone();
        loop {
            match self.step_next(&p) {
                Step::Node(q) if Arc::ptr_eq(&q, x) => break,
                Step::Node(q) => {
                    if q.is_active() {
                        best = q.clone();
                    }
                    p = q;
                }
                // x left the chain while we walked
                Step::Boundary | Step::Detached => return Some(anchor),
            }
        }
        if best.is_active() && !x.prev_is(&best) {
            x.cas_prev(&hint, Some(best.clone()));
        }
        Some(best)
    }
}

impl<E> Default for Pipeline<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Drop for Pipeline<E> {
    fn drop(&mut self) {
        // Tear the chain down front to back so a long chain is released
        // iteratively instead of through nested Arc drops.
        let mut p = self.first();
        while let (_, Some(next)) = p.take_links() {
            p = next;
        }
        self.prev_terminator.take_links();
        self.next_terminator.take_links();
    }
}

impl<E: fmt::Debug> fmt::Debug for Pipeline<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl<E, N: Into<String>> FromIterator<(N, E)> for Pipeline<E> {
    fn from_iter<I: IntoIterator<Item = (N, E)>>(iter: I) -> Self {
        let pipeline = Pipeline::new();
        for (name, value) in iter {
            pipeline.add_last(name, value);
        }
        pipeline
    }
}

impl<E, N: Into<String>> Extend<(N, E)> for Pipeline<E> {
    fn extend<I: IntoIterator<Item = (N, E)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.add_last(name, value);
        }
    }
}
