//! # Partitioned Cursor
//!
//! A [`PartitionedCursor`] hands out the pipeline's live values in
//! geometrically growing batches, which is what a work-stealing scheduler
//! needs to spread a scan over several threads. [`Pipeline::par_iter`] plugs
//! it into rayon.
//!
//! Like the iterators, a partitioned scan is weakly consistent.

use crate::node::Node;
use crate::pipeline::Pipeline;
use rayon::iter::{self as par, ParallelIterator};
use std::sync::Arc;

/// Batch-splitting cursor over a pipeline's values.
pub struct PartitionedCursor<'a, E> {
    pipeline: &'a Pipeline<E>,
    current: Option<Arc<Node<E>>>,
    batch: usize,
    exhausted: bool,
}

impl<'a, E> PartitionedCursor<'a, E> {
    pub(crate) fn new(pipeline: &'a Pipeline<E>) -> Self {
        Self {
            pipeline,
            current: None,
            batch: pipeline.config().initial_batch,
            exhausted: false,
        }
    }

    /// Lazily positions the cursor on the first node.
    fn current(&mut self) -> Option<Arc<Node<E>>> {
        if self.current.is_none() && !self.exhausted {
            self.current = Some(self.pipeline.first());
        }
        self.current.clone()
    }

    fn set_current(&mut self, node: Option<Arc<Node<E>>>) {
        if node.is_none() {
            self.exhausted = true;
        }
        self.current = node;
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Size of the next batch [`try_split`](Self::try_split) will copy.
    pub fn next_batch_size(&self) -> usize {
        self.batch
    }

    /// Copies up to the next batch size of live values out of the pipeline
    /// and advances past them.
    ///
    /// Returns `None` when the cursor is exhausted, when it sits on the last
    /// node, or when the probed window held no live value. The batch size
    /// doubles on every split, up to the configured maximum.
    pub fn try_split(&mut self) -> Option<Vec<Arc<E>>> {
        let mut p = self.current()?;
        let mut q = self.pipeline.raw_succ(&p)?;

        let n = self.batch;
        self.batch = n.saturating_mul(2).min(self.pipeline.config().max_batch);

        let mut buffer = Vec::new();
        loop {
            if let Some(item) = p.item() {
                buffer.push(item);
            }
            p = q;
            match self.pipeline.raw_succ(&p) {
                Some(next) if buffer.len() < n => q = next,
                _ => break,
            }
        }
        self.set_current(Some(p));

        if buffer.is_empty() {
            None
        } else {
            Some(buffer)
        }
    }
}

impl<E> Iterator for PartitionedCursor<'_, E> {
    type Item = Arc<E>;

    fn next(&mut self) -> Option<Arc<E>> {
        let mut p = self.current()?;
        loop {
            let item = p.item();
            let q = self.pipeline.raw_succ(&p);
            if let Some(item) = item {
                self.set_current(q);
                return Some(item);
            }
            match q {
                Some(q) => p = q,
                None => {
                    self.set_current(None);
                    return None;
                }
            }
        }
    }
}

// ============================================================================
// Rayon integration
// ============================================================================

/// Unit of work handed to rayon: either the shared cursor that can keep
/// splitting, or a batch already copied out of it.
enum Partition<'a, E> {
    Cursor(PartitionedCursor<'a, E>),
    Batch(Vec<Arc<E>>),
}

impl<'a, E> Partition<'a, E> {
    fn split(self) -> (Self, Option<Self>) {
        match self {
            Partition::Cursor(mut cursor) => {
                let batch = cursor.try_split();
                (Partition::Cursor(cursor), batch.map(Partition::Batch))
            }
            Partition::Batch(mut batch) if batch.len() > 1 => {
                let back = batch.split_off(batch.len() / 2);
                (Partition::Batch(batch), Some(Partition::Batch(back)))
            }
            other => (other, None),
        }
    }
}

enum PartitionIter<'a, E> {
    Cursor(PartitionedCursor<'a, E>),
    Batch(std::vec::IntoIter<Arc<E>>),
}

impl<'a, E> IntoIterator for Partition<'a, E> {
    type Item = Arc<E>;
    type IntoIter = PartitionIter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Partition::Cursor(cursor) => PartitionIter::Cursor(cursor),
            Partition::Batch(batch) => PartitionIter::Batch(batch.into_iter()),
        }
    }
}

impl<E> Iterator for PartitionIter<'_, E> {
    type Item = Arc<E>;

    fn next(&mut self) -> Option<Arc<E>> {
        match self {
            PartitionIter::Cursor(cursor) => cursor.next(),
            PartitionIter::Batch(batch) => batch.next(),
        }
    }
}

impl<E> Pipeline<E> {
    /// Returns a cursor that splits the pipeline into batches.
    pub fn partitioned_cursor(&self) -> PartitionedCursor<'_, E> {
        PartitionedCursor::new(self)
    }

    /// Parallel scan over the live values.
    ///
    /// Batches are cut from a shared [`PartitionedCursor`] as rayon asks for
    /// more work, so the scan starts immediately even on long pipelines.
    pub fn par_iter(&self) -> impl ParallelIterator<Item = Arc<E>> + '_
    where
        E: Send + Sync,
    {
        par::split(Partition::Cursor(self.partitioned_cursor()), Partition::split)
            .flat_map_iter(|partition| partition)
    }
}
