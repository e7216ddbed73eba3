//! # Event Dispatch
//!
//! [`EventPipeline`] keeps its handlers in a [`Pipeline`] seeded with one
//! slot node per [`Priority`]. A handler registered at some priority is
//! inserted right before the slot of the next priority, which places it
//! after every handler already registered at its own priority. `run` walks
//! the pipeline from head to tail, so handlers execute in priority order and
//! in registration order within a priority.
//!
//! ```text
//! [lowest] h1 h2 [low] [normal] h3 [high] [highest] [monitor] h4
//! ```
//!
//! Since the handlers live in an ordinary pipeline, callers may also anchor
//! registrations on slot or handler names directly through
//! [`EventPipeline::pipeline`].

use crate::config::EventPipelineConfig;
use crate::error::EventError;
use crate::event::{Event, Priority};
use crate::exception::{ExceptionEvent, ExceptionPipeline};
use crate::handler::{EventHandler, FnHandler, HandlerEntry, HandlerId, SlotMarker};
use crate::timing::Timings;
use horizon_pipeline::{Direction, Pipeline};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace};

/// How a single `run` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every eligible handler ran. `skipped` counts handlers passed over
    /// because the event was cancelled.
    Completed { invoked: usize, skipped: usize },
    /// `handler` failed; handlers after it did not run for this event.
    Faulted { handler: String, invoked: usize },
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchOutcome::Completed { .. })
    }

    /// Number of handlers invoked, the faulted one included.
    pub fn invoked(&self) -> usize {
        match self {
            DispatchOutcome::Completed { invoked, .. } | DispatchOutcome::Faulted { invoked, .. } => {
                *invoked
            }
        }
    }
}

/// Priority-ordered dispatch of events of type `T`.
pub struct EventPipeline<T: Event> {
    pipeline: Pipeline<HandlerEntry<T>>,
    sentinel: Arc<HandlerEntry<T>>,
    exceptions: ExceptionPipeline<T>,
    timings: Timings,
    collect_timings: AtomicBool,
}

impl<T: Event> EventPipeline<T> {
    pub fn new() -> Self {
        Self::with_config(EventPipelineConfig::default())
    }

    pub fn with_config(config: EventPipelineConfig) -> Self {
        let events = Self {
            exceptions: ExceptionPipeline::with_config(config.pipeline.clone()),
            pipeline: Pipeline::with_config(config.pipeline),
            sentinel: Arc::new(HandlerEntry::new(SlotMarker)),
            timings: Timings::new(),
            collect_timings: AtomicBool::new(config.collect_timings),
        };
        events.seed_slots();
        events
    }

    fn seed_slots(&self) {
        for priority in Priority::ALL {
            self.pipeline
                .add_last(priority.slot_name(), Arc::clone(&self.sentinel));
        }
        trace!("Seeded {} priority slots", Priority::ALL.len());
    }

    fn is_slot(&self, entry: &Arc<HandlerEntry<T>>) -> bool {
        Arc::ptr_eq(entry, &self.sentinel)
    }

    /// Registers `handler` after every handler already registered at
    /// `priority`.
    ///
    /// # Errors
    ///
    /// [`EventError::ReservedName`] when `name` is a priority slot name, and
    /// [`EventError::Pipeline`] when the slot to insert before is missing,
    /// which only happens while a concurrent [`clear`](Self::clear) is
    /// re-seeding the slots.
    pub fn register(
        &self,
        priority: Priority,
        name: impl Into<String>,
        handler: impl EventHandler<T> + 'static,
    ) -> Result<HandlerId, EventError> {
        let name = name.into();
        if Priority::from_slot_name(&name).is_some() {
            return Err(EventError::ReservedName(name));
        }

        let entry = HandlerEntry::new(handler);
        let id = entry.id();
        match priority.next() {
            Some(next) => self.pipeline.insert_before(
                next.slot_name(),
                name.as_str(),
                entry,
                0,
                Direction::FromHead,
            )?,
            None => self.pipeline.add_last(name.as_str(), entry),
        }

        debug!("📝 Registered handler '{}' at {} priority ({})", name, priority, id);
        Ok(id)
    }

    /// Registers a closure; see [`register`](Self::register).
    pub fn register_fn<F>(
        &self,
        priority: Priority,
        name: impl Into<String>,
        handler: F,
    ) -> Result<HandlerId, EventError>
    where
        F: Fn(&mut T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.register(priority, name, FnHandler::new(handler))
    }

    /// Removes the first handler named `name`, along with its timings.
    /// Priority slots cannot be removed this way.
    pub fn unregister(&self, name: &str) -> bool {
        if Priority::from_slot_name(name).is_some() {
            return false;
        }
        match self.pipeline.remove_named(name) {
            Some(entry) => {
                self.timings.remove(entry.id());
                debug!("🗑️ Unregistered handler '{}'", name);
                true
            }
            None => false,
        }
    }

    /// The underlying handler pipeline, for anchor-based registration.
    pub fn pipeline(&self) -> &Pipeline<HandlerEntry<T>> {
        &self.pipeline
    }

    pub fn exception_pipeline(&self) -> &ExceptionPipeline<T> {
        &self.exceptions
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn reset_timings(&self) {
        self.timings.clear();
    }

    pub fn set_collect_timings(&self, collect: bool) {
        self.collect_timings.store(collect, Ordering::Relaxed);
    }

    pub fn collects_timings(&self) -> bool {
        self.collect_timings.load(Ordering::Relaxed)
    }

    /// Dispatches `event` to every live handler in priority order.
    ///
    /// A handler that returns an error or panics is reported through the
    /// exception pipeline, and dispatch of this event stops there. Faults
    /// never reach the caller.
    pub fn run(&self, event: &mut T) -> DispatchOutcome {
        let mut invoked = 0;
        let mut skipped = 0;

        for (name, entry) in self.pipeline.entries() {
            if self.is_slot(&entry) {
                continue;
            }
            if event.is_cancelled() && entry.ignores_cancelled() {
                skipped += 1;
                continue;
            }

            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| entry.handle(event)))
                .unwrap_or_else(|payload| Err(EventError::panicked(&name, payload)));
            invoked += 1;

            match result {
                Ok(()) => {
                    if self.collects_timings() {
                        self.timings.record(entry.id(), &name, started.elapsed());
                    }
                }
                Err(e) => {
                    debug!("Handler '{}' faulted after {} invocations", name, invoked);
                    self.raise(event, &name, e);
                    return DispatchOutcome::Faulted {
                        handler: name,
                        invoked,
                    };
                }
            }
        }

        DispatchOutcome::Completed { invoked, skipped }
    }

    fn raise(&self, event: &mut T, handler: &str, error: EventError) {
        let result = {
            let mut exception = ExceptionEvent::new(&*event, handler, error);
            self.exceptions.handle(&mut exception)
        };
        if let Err(fatal) = result {
            error!(
                "❌ Exception handling failed for handler '{}': {}; cancelling {:?}",
                handler, fatal, event
            );
            event.set_cancelled(true);
        }
    }

    /// Drops every handler, re-seeds the priority slots and resets the
    /// exception pipeline. Timings are kept.
    pub fn clear(&self) {
        self.pipeline.clear();
        self.seed_slots();
        self.exceptions.reset();
    }

    /// Like [`clear`](Self::clear), and also drops all timings.
    pub fn reset(&self) {
        self.clear();
        self.reset_timings();
    }

    /// Names of the registered handlers in dispatch order, slots excluded.
    pub fn handler_names(&self) -> Vec<String> {
        self.pipeline
            .entries()
            .filter(|(_, entry)| !self.is_slot(entry))
            .map(|(name, _)| name)
            .collect()
    }
}

impl<T: Event> Default for EventPipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Event> fmt::Debug for EventPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPipeline")
            .field("pipeline", &self.pipeline.names())
            .field("exceptions", &self.exceptions)
            .field("collect_timings", &self.collects_timings())
            .finish()
    }
}
