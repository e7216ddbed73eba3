//! Removal, replacement and renaming.
//!
//! Removal tombstones first and unlinks second. The tombstone CAS decides
//! which caller removed an element; losing it just means somebody else got
//! there first.

use super::Pipeline;
use crate::error::{PipelineError, Result};
use crate::iter::NodeWalk;
use crate::node::Node;
use crate::types::{Direction, Match, Strictness};
use crossbeam::utils::Backoff;
use std::sync::Arc;

impl<E> Pipeline<E> {
    /// Removes live elements accepted by `matcher`, scanning in `direction`.
    ///
    /// The first `occurrence` matches are skipped; after that up to `limit`
    /// matches are removed. Returns the removed `(name, value)` pairs in scan
    /// order.
    pub fn remove(
        &self,
        matcher: Match<'_, E>,
        occurrence: usize,
        direction: Direction,
        limit: usize,
    ) -> Vec<(String, Arc<E>)>
    where
        E: PartialEq,
    {
        self.remove_where(
            |node, item| matcher.matches(node.name().as_str(), item),
            occurrence,
            direction,
            limit,
        )
    }

    fn remove_where(
        &self,
        accept: impl Fn(&Node<E>, &E) -> bool,
        occurrence: usize,
        direction: Direction,
        limit: usize,
    ) -> Vec<(String, Arc<E>)> {
        let mut removed = Vec::new();
        if limit == 0 {
            return removed;
        }
        let mut skipped = 0;
        for (node, item) in NodeWalk::new(self, direction) {
            if !accept(&*node, &*item) {
                continue;
            }
            if skipped < occurrence {
                skipped += 1;
                continue;
            }
            if node.cas_item(&item, None) {
                self.unlink(&node);
                removed.push((node.name().as_ref().clone(), item));
                if removed.len() >= limit {
                    break;
                }
            }
        }
        removed
    }

    /// Removes the first live element named `name`.
    pub fn remove_named(&self, name: &str) -> Option<Arc<E>> {
        self.remove_where(|node, _| node.name_matches(name), 0, Direction::FromHead, 1)
            .pop()
            .map(|(_, item)| item)
    }

    /// Removes every live element equal to `value`; returns how many went.
    pub fn remove_value(&self, value: &E) -> usize
    where
        E: PartialEq,
    {
        self.remove(Match::Value(value), 0, Direction::FromHead, usize::MAX)
            .len()
    }

    pub fn remove_first_occurrence(&self, value: &E) -> bool
    where
        E: PartialEq,
    {
        !self
            .remove(Match::Value(value), 0, Direction::FromHead, 1)
            .is_empty()
    }

    pub fn remove_last_occurrence(&self, value: &E) -> bool
    where
        E: PartialEq,
    {
        !self
            .remove(Match::Value(value), 0, Direction::FromTail, 1)
            .is_empty()
    }

    /// Removes and returns the first live element.
    pub fn poll_first(&self) -> Option<(String, Arc<E>)> {
        'restart: loop {
            let first = self.first();
            let mut cursor = Some(first.clone());
            while let Some(node) = cursor {
                if let Some(item) = node.item() {
                    // something was added in front of us; start over
                    if first.has_prev() {
                        continue 'restart;
                    }
                    if node.cas_item(&item, None) {
                        self.unlink(&node);
                        return Some((node.name().as_ref().clone(), item));
                    }
                }
                cursor = self.succ(&node);
            }
            if first.has_prev() {
                continue 'restart;
            }
            return None;
        }
    }

    /// Removes and returns the last live element.
    pub fn poll_last(&self) -> Option<(String, Arc<E>)> {
        'restart: loop {
            let last = self.last();
            let mut cursor = Some(last.clone());
            while let Some(node) = cursor {
                if let Some(item) = node.item() {
                    if last.has_next() {
                        continue 'restart;
                    }
                    if node.cas_item(&item, None) {
                        self.unlink(&node);
                        return Some((node.name().as_ref().clone(), item));
                    }
                }
                cursor = self.predecessor(&node);
            }
            if last.has_next() {
                continue 'restart;
            }
            return None;
        }
    }

    /// Removes every element.
    pub fn clear(&self) {
        while self.poll_first().is_some() {}
    }

    /// Tombstones and unlinks `node` whatever it currently holds.
    pub(crate) fn remove_node(&self, node: &Arc<Node<E>>) -> Option<Arc<E>> {
        loop {
            let item = node.item()?;
            if node.cas_item(&item, None) {
                self.unlink(node);
                return Some(item);
            }
        }
    }

    // ========================================================================
    // Replacement
    // ========================================================================

    /// Replaces the value of the `occurrence`-th live element named `name`
    /// and returns the previous value.
    ///
    /// # Errors
    ///
    /// With [`Strictness::Strict`], [`PipelineError::NotFound`] when there is
    /// no such element. [`Strictness::IfPresent`] turns a miss into `Ok(None)`.
    pub fn set(
        &self,
        name: &str,
        value: impl Into<Arc<E>>,
        occurrence: usize,
        direction: Direction,
        strictness: Strictness,
    ) -> Result<Option<Arc<E>>> {
        self.swap_item(name, None, value.into(), occurrence, direction, strictness)
    }

    /// Like [`set`](Self::set), and also renames the element to `new_name`.
    pub fn replace(
        &self,
        name: &str,
        new_name: impl Into<String>,
        value: impl Into<Arc<E>>,
        occurrence: usize,
        direction: Direction,
        strictness: Strictness,
    ) -> Result<Option<Arc<E>>> {
        self.swap_item(
            name,
            Some(new_name.into()),
            value.into(),
            occurrence,
            direction,
            strictness,
        )
    }

    /// Sets the first element named `name` if there is one.
    pub fn set_if_present(&self, name: &str, value: impl Into<Arc<E>>) -> Option<Arc<E>> {
        self.set(name, value, 0, Direction::FromHead, Strictness::IfPresent)
            .ok()
            .flatten()
    }

    /// Replaces and renames the first element named `name` if there is one.
    pub fn replace_if_present(
        &self,
        name: &str,
        new_name: impl Into<String>,
        value: impl Into<Arc<E>>,
    ) -> Option<Arc<E>> {
        self.replace(name, new_name, value, 0, Direction::FromHead, Strictness::IfPresent)
            .ok()
            .flatten()
    }

    /// Renames the `occurrence`-th live element named `name` in place.
    pub fn rename(
        &self,
        name: &str,
        new_name: impl Into<String>,
        occurrence: usize,
        direction: Direction,
    ) -> Result<()> {
        let (node, _) = self
            .find_node(|node, _| node.name_matches(name), occurrence, direction)
            .ok_or_else(|| PipelineError::not_found(name, occurrence, direction))?;
        node.rename(new_name.into());
        Ok(())
    }

    fn swap_item(
        &self,
        name: &str,
        new_name: Option<String>,
        value: Arc<E>,
        occurrence: usize,
        direction: Direction,
        strictness: Strictness,
    ) -> Result<Option<Arc<E>>> {
        let backoff = Backoff::new();
        loop {
            let found = self.find_node(|node, _| node.name_matches(name), occurrence, direction);
            let Some((node, old)) = found else {
                return match strictness {
                    Strictness::Strict => Err(PipelineError::not_found(name, occurrence, direction)),
                    Strictness::IfPresent => Ok(None),
                };
            };
            if node.cas_item(&old, Some(value.clone())) {
                if let Some(new_name) = new_name {
                    node.rename(new_name);
                }
                return Ok(Some(old));
            }
            backoff.spin();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Direction, Match, Pipeline, PipelineError, Strictness};

    fn values(pipeline: &Pipeline<i32>) -> Vec<i32> {
        pipeline.iter().map(|v| *v).collect()
    }

    #[test]
    fn worked_example() {
        let pipeline = Pipeline::new();
        pipeline.add_last("A", 1);
        pipeline.add_first("B", 2);
        assert_eq!(values(&pipeline), [2, 1]);

        assert_eq!(pipeline.remove_named("A").as_deref(), Some(&1));
        assert_eq!(values(&pipeline), [2]);

        let previous = pipeline
            .set("B", 9, 0, Direction::FromHead, Strictness::Strict)
            .unwrap();
        assert_eq!(previous.as_deref(), Some(&2));
        assert_eq!(pipeline.get("B").as_deref(), Some(&9));
    }

    #[test]
    fn remove_with_occurrence_and_limit() {
        let pipeline: Pipeline<i32> = [("x", 1), ("y", 2), ("x", 3), ("x", 4), ("x", 5)]
            .into_iter()
            .collect();

        let removed = pipeline.remove(Match::Name("x"), 1, Direction::FromHead, 2);
        let removed: Vec<i32> = removed.iter().map(|(_, v)| **v).collect();
        assert_eq!(removed, [3, 4]);
        assert_eq!(values(&pipeline), [1, 2, 5]);

        let removed = pipeline.remove(Match::Any, 0, Direction::FromTail, 1);
        assert_eq!(removed[0].0, "x");
        assert_eq!(values(&pipeline), [1, 2]);

        assert!(pipeline
            .remove(Match::Entry("y", &1), 0, Direction::FromHead, 1)
            .is_empty());
        assert_eq!(
            pipeline.remove(Match::Entry("y", &2), 0, Direction::FromHead, 0).len(),
            0
        );
        assert_eq!(values(&pipeline), [1, 2]);
    }

    #[test]
    fn remove_by_value() {
        let pipeline: Pipeline<i32> = [("a", 7), ("b", 8), ("c", 7), ("d", 7)]
            .into_iter()
            .collect();
        assert!(pipeline.remove_last_occurrence(&7));
        assert_eq!(pipeline.names(), ["a", "b", "c"]);
        assert!(pipeline.remove_first_occurrence(&7));
        assert_eq!(pipeline.names(), ["b", "c"]);
        assert_eq!(pipeline.remove_value(&7), 1);
        assert_eq!(pipeline.remove_value(&7), 0);
        assert!(!pipeline.remove_first_occurrence(&42));
        assert_eq!(values(&pipeline), [8]);
    }

    #[test]
    fn poll_both_ends() {
        let pipeline: Pipeline<i32> = (1..=4).map(|i| (i.to_string(), i)).collect();
        assert_eq!(pipeline.poll_first().map(|(n, v)| (n, *v)), Some(("1".to_string(), 1)));
        assert_eq!(pipeline.poll_last().map(|(_, v)| *v), Some(4));
        assert_eq!(values(&pipeline), [2, 3]);
        pipeline.clear();
        assert!(pipeline.is_empty());
        assert!(pipeline.poll_first().is_none());
        assert!(pipeline.poll_last().is_none());

        // still usable after being emptied
        pipeline.add_last("again", 5);
        assert_eq!(values(&pipeline), [5]);
    }

    #[test]
    fn strict_and_lenient_set() {
        let pipeline: Pipeline<i32> = [("a", 1), ("a", 2)].into_iter().collect();

        let err = pipeline
            .set("missing", 0, 0, Direction::FromHead, Strictness::Strict)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
        assert!(pipeline
            .set("missing", 0, 0, Direction::FromHead, Strictness::IfPresent)
            .unwrap()
            .is_none());
        assert!(pipeline.set_if_present("missing", 0).is_none());

        let old = pipeline
            .set("a", 20, 0, Direction::FromTail, Strictness::Strict)
            .unwrap();
        assert_eq!(old.as_deref(), Some(&2));
        assert_eq!(values(&pipeline), [1, 20]);
    }

    #[test]
    fn replace_renames() {
        let pipeline: Pipeline<i32> = [("decoder", 1), ("handler", 2)].into_iter().collect();

        let old = pipeline.replace_if_present("decoder", "fast-decoder", 10);
        assert_eq!(old.as_deref(), Some(&1));
        assert_eq!(pipeline.names(), ["fast-decoder", "handler"]);
        assert_eq!(pipeline.get("fast-decoder").as_deref(), Some(&10));
        assert!(pipeline.replace_if_present("decoder", "x", 0).is_none());

        pipeline
            .rename("handler", "game-handler", 0, Direction::FromHead)
            .unwrap();
        assert!(pipeline.contains_key("game-handler"));
        assert!(pipeline
            .rename("handler", "x", 0, Direction::FromHead)
            .is_err());
    }
}
