//! # Pipeline Nodes
//!
//! A [`Node`] is the atomic building block of a [`Pipeline`](crate::Pipeline).
//! Every field is an independently swappable atomic cell, so a node can be
//! renamed, tombstoned, or relinked without any lock.
//!
//! ## Lifecycle
//!
//! 1. **Built**: links are written with plain stores while the node is still
//!    private to the inserting thread.
//! 2. **Published**: a successful CAS on a neighbour's link makes it reachable.
//! 3. **Tombstoned**: the item is CAS'd to `None`. Readers skip it from now on
//!    and the item never comes back.
//! 4. **Unlinked**: neighbours are spliced around it. Its own links are then
//!    rewritten to forward to the surviving neighbours or marked with one of
//!    the pipeline's terminator sentinels.

use arc_swap::{ArcSwap, ArcSwapOption};
use std::fmt;
use std::sync::Arc;

/// An optional strong link to a neighbouring node.
pub(crate) type Link<E> = Option<Arc<Node<E>>>;

/// Pointer equality for optional links. `None == None`.
pub(crate) fn same<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub(crate) struct Node<E> {
    name: ArcSwap<String>,
    item: ArcSwapOption<E>,
    prev: ArcSwapOption<Node<E>>,
    next: ArcSwapOption<Node<E>>,
}

impl<E> Node<E> {
    /// Creates an unpublished node holding `item`.
    pub(crate) fn new(name: String, item: Arc<E>) -> Self {
        Self {
            name: ArcSwap::from_pointee(name),
            item: ArcSwapOption::new(Some(item)),
            prev: ArcSwapOption::empty(),
            next: ArcSwapOption::empty(),
        }
    }

    /// Creates a node that never held an item: the initial boundary node
    /// and the terminator sentinels.
    pub(crate) fn dead() -> Self {
        Self {
            name: ArcSwap::from_pointee(String::new()),
            item: ArcSwapOption::empty(),
            prev: ArcSwapOption::empty(),
            next: ArcSwapOption::empty(),
        }
    }

    // ------------------------------------------------------------------------
    // Name
    // ------------------------------------------------------------------------

    pub(crate) fn name(&self) -> Arc<String> {
        self.name.load_full()
    }

    pub(crate) fn name_matches(&self, name: &str) -> bool {
        self.name.load().as_str() == name
    }

    pub(crate) fn rename(&self, name: String) {
        self.name.store(Arc::new(name));
    }

    // ------------------------------------------------------------------------
    // Item
    // ------------------------------------------------------------------------

    pub(crate) fn item(&self) -> Option<Arc<E>> {
        self.item.load_full()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.item.load().is_some()
    }

    /// Swaps the item from `current` to `new`. Passing `None` tombstones the
    /// node; this is the linearization point of every removal.
    pub(crate) fn cas_item(&self, current: &Arc<E>, new: Option<Arc<E>>) -> bool {
        let previous = self.item.compare_and_swap(current, new);
        matches!(&*previous, Some(p) if Arc::ptr_eq(p, current))
    }

    // ------------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------------

    pub(crate) fn prev(&self) -> Link<E> {
        self.prev.load_full()
    }

    pub(crate) fn next(&self) -> Link<E> {
        self.next.load_full()
    }

    pub(crate) fn has_prev(&self) -> bool {
        self.prev.load().is_some()
    }

    pub(crate) fn has_next(&self) -> bool {
        self.next.load().is_some()
    }

    pub(crate) fn prev_is(&self, other: &Arc<Node<E>>) -> bool {
        matches!(&*self.prev.load(), Some(p) if Arc::ptr_eq(p, other))
    }

    pub(crate) fn next_is(&self, other: &Arc<Node<E>>) -> bool {
        matches!(&*self.next.load(), Some(n) if Arc::ptr_eq(n, other))
    }

    pub(crate) fn cas_prev(&self, current: &Link<E>, new: Link<E>) -> bool {
        let previous = self.prev.compare_and_swap(current, new);
        same(&*previous, current)
    }

    pub(crate) fn cas_next(&self, current: &Link<E>, new: Link<E>) -> bool {
        let previous = self.next.compare_and_swap(current, new);
        same(&*previous, current)
    }

    /// Plain store. Only valid before publication, or when rewriting the
    /// links of a node that is already unreachable.
    pub(crate) fn lazy_set_prev(&self, prev: Link<E>) {
        self.prev.store(prev);
    }

    pub(crate) fn lazy_set_next(&self, next: Link<E>) {
        self.next.store(next);
    }

    /// Drops both links and hands them back, used by iterative teardown.
    pub(crate) fn take_links(&self) -> (Link<E>, Link<E>) {
        (self.prev.swap(None), self.next.swap(None))
    }
}

impl<E: fmt::Debug> fmt::Debug for Node<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name())
            .field("item", &self.item())
            .field("has_prev", &self.has_prev())
            .field("has_next", &self.has_next())
            .finish()
    }
}
