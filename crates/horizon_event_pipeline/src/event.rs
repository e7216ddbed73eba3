//! # Events and Priorities
//!
//! Any `Send + Debug` type can flow through an [`EventPipeline`](crate::EventPipeline).
//! Events that support cancellation override the two cancellation methods;
//! the defaults describe an event that can never be cancelled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An event dispatched through an event pipeline.
///
/// # Examples
///
/// ```rust
/// use horizon_event_pipeline::Event;
///
/// #[derive(Debug)]
/// struct PlayerChat {
///     message: String,
///     cancelled: bool,
/// }
///
/// impl Event for PlayerChat {
///     fn is_cancelled(&self) -> bool {
///         self.cancelled
///     }
///
///     fn set_cancelled(&mut self, cancelled: bool) {
///         self.cancelled = cancelled;
///     }
/// }
/// ```
pub trait Event: Send + fmt::Debug + 'static {
    fn is_cancelled(&self) -> bool {
        false
    }

    fn set_cancelled(&mut self, _cancelled: bool) {}
}

/// Dispatch priority of a handler. Handlers run from `Lowest` to `Monitor`;
/// within one priority, in registration order.
///
/// `Monitor` is meant for handlers that only observe the final state of an
/// event.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
    Monitor,
}

impl Priority {
    /// Every priority, in dispatch order.
    pub const ALL: [Priority; 6] = [
        Priority::Lowest,
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Highest,
        Priority::Monitor,
    ];

    /// Name of the slot node that marks the start of this priority's
    /// section in the pipeline.
    pub fn slot_name(self) -> &'static str {
        match self {
            Priority::Lowest => "lowest",
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Highest => "highest",
            Priority::Monitor => "monitor",
        }
    }

    pub fn from_slot_name(name: &str) -> Option<Priority> {
        Priority::ALL.into_iter().find(|p| p.slot_name() == name)
    }

    /// The priority dispatched right after this one.
    pub fn next(self) -> Option<Priority> {
        match self {
            Priority::Lowest => Some(Priority::Low),
            Priority::Low => Some(Priority::Normal),
            Priority::Normal => Some(Priority::High),
            Priority::High => Some(Priority::Highest),
            Priority::Highest => Some(Priority::Monitor),
            Priority::Monitor => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_chain_in_dispatch_order() {
        let mut chain = vec![Priority::Lowest];
        while let Some(next) = chain.last().and_then(|p| p.next()) {
            chain.push(next);
        }
        assert_eq!(chain, Priority::ALL);
        assert!(Priority::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn slot_names_round_trip() {
        for priority in Priority::ALL {
            assert_eq!(Priority::from_slot_name(priority.slot_name()), Some(priority));
        }
        assert_eq!(Priority::from_slot_name("urgent"), None);
        assert_eq!(Priority::High.to_string(), "high");
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn default_event_is_not_cancellable() {
        #[derive(Debug)]
        struct Tick;
        impl Event for Tick {}

        let mut tick = Tick;
        tick.set_cancelled(true);
        assert!(!tick.is_cancelled());
    }
}
