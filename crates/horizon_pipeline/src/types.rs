//! Selector types shared by the pipeline operations.
//!
//! Instead of one method per combination of direction, strictness and match
//! criterion, operations take these small enums as arguments.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Direction
// ============================================================================

/// Which end of the pipeline a scan starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Walk `next` links starting at the head.
    #[default]
    FromHead,
    /// Walk `prev` links starting at the tail.
    FromTail,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::FromHead => Direction::FromTail,
            Direction::FromTail => Direction::FromHead,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::FromHead => write!(f, "from head"),
            Direction::FromTail => write!(f, "from tail"),
        }
    }
}

// ============================================================================
// Strictness
// ============================================================================

/// What a lookup-and-modify operation does when nothing matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strictness {
    /// Fail with [`PipelineError::NotFound`](crate::PipelineError::NotFound).
    #[default]
    Strict,
    /// Do nothing and report `Ok(None)`.
    IfPresent,
}

// ============================================================================
// Match
// ============================================================================

/// Criterion used by [`Pipeline::remove`](crate::Pipeline::remove).
#[derive(Debug)]
pub enum Match<'a, E> {
    /// Any live element whose name equals the given name.
    Name(&'a str),
    /// Any live element whose value equals the given value.
    Value(&'a E),
    /// Both name and value must match.
    Entry(&'a str, &'a E),
    /// Every live element.
    Any,
}

impl<E: PartialEq> Match<'_, E> {
    pub(crate) fn matches(&self, name: &str, value: &E) -> bool {
        match self {
            Match::Name(n) => *n == name,
            Match::Value(v) => *v == value,
            Match::Entry(n, v) => *n == name && *v == value,
            Match::Any => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_criteria() {
        assert!(Match::Name("a").matches("a", &1));
        assert!(!Match::Name("a").matches("b", &1));
        assert!(Match::Value(&1).matches("whatever", &1));
        assert!(Match::Entry("a", &1).matches("a", &1));
        assert!(!Match::Entry("a", &1).matches("a", &2));
        assert!(Match::<i32>::Any.matches("", &0));
    }

    #[test]
    fn direction_reverses_and_prints() {
        assert_eq!(Direction::FromHead.reversed(), Direction::FromTail);
        assert_eq!(Direction::FromTail.to_string(), "from tail");
        assert_eq!(Direction::default(), Direction::FromHead);
    }
}
