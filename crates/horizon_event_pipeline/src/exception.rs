//! # Exception Pipeline
//!
//! Faults raised by event handlers are wrapped in an [`ExceptionEvent`] and
//! walked through a second [`Pipeline`] of named exception handlers. The
//! walk stops once some handler cancels the exception. A `"default"` handler
//! that logs the fault and cancels it sits at the end of a fresh pipeline;
//! handlers added through [`ExceptionPipeline::add_handler`] run before it.

use crate::error::EventError;
use crate::event::Event;
use crate::handler::HandlerId;
use horizon_pipeline::{Direction, Pipeline, PipelineConfig};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Name of the handler every exception pipeline is seeded with.
pub const DEFAULT_EXCEPTION_HANDLER: &str = "default";

/// A handler fault, together with the event that was being dispatched.
#[derive(Debug)]
pub struct ExceptionEvent<'a, T: Event> {
    event: &'a T,
    handler: String,
    error: EventError,
    cancelled: bool,
}

impl<'a, T: Event> ExceptionEvent<'a, T> {
    pub fn new(event: &'a T, handler: impl Into<String>, error: EventError) -> Self {
        Self {
            event,
            handler: handler.into(),
            error,
            cancelled: false,
        }
    }

    /// The event whose dispatch faulted.
    pub fn event(&self) -> &T {
        self.event
    }

    /// Name of the handler that faulted.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn error(&self) -> &EventError {
        &self.error
    }

    /// Marks the exception as handled; no further exception handlers run.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Handles faults of an event pipeline. Exception handlers are expected not
/// to fail themselves; one that does ends the dispatch of the faulted event.
pub trait ExceptionHandler<T: Event>: Send + Sync {
    fn handle(&self, exception: &mut ExceptionEvent<'_, T>) -> Result<(), EventError>;
}

impl<T, F> ExceptionHandler<T> for F
where
    T: Event,
    F: Fn(&mut ExceptionEvent<'_, T>) -> Result<(), EventError> + Send + Sync,
{
    fn handle(&self, exception: &mut ExceptionEvent<'_, T>) -> Result<(), EventError> {
        self(exception)
    }
}

/// Logs the fault and cancels the exception.
struct LogAndCancel;

impl<T: Event> ExceptionHandler<T> for LogAndCancel {
    fn handle(&self, exception: &mut ExceptionEvent<'_, T>) -> Result<(), EventError> {
        error!(
            "❌ Handler '{}' failed while dispatching {:?}: {}",
            exception.handler(),
            exception.event(),
            exception.error()
        );
        exception.cancel();
        Ok(())
    }
}

/// A named exception handler as stored in the exception pipeline.
pub struct ExceptionEntry<T: Event> {
    id: HandlerId,
    handler: Box<dyn ExceptionHandler<T>>,
}

impl<T: Event> ExceptionEntry<T> {
    pub fn new(handler: impl ExceptionHandler<T> + 'static) -> Self {
        Self {
            id: HandlerId::new(),
            handler: Box::new(handler),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }
}

impl<T: Event> PartialEq for ExceptionEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Event> fmt::Debug for ExceptionEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionEntry").field("id", &self.id).finish()
    }
}

pub struct ExceptionPipeline<T: Event> {
    pipeline: Pipeline<ExceptionEntry<T>>,
}

impl<T: Event> ExceptionPipeline<T> {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let exceptions = Self {
            pipeline: Pipeline::with_config(config),
        };
        exceptions.seed();
        exceptions
    }

    fn seed(&self) {
        self.pipeline
            .add_last(DEFAULT_EXCEPTION_HANDLER, ExceptionEntry::new(LogAndCancel));
    }

    /// Drops every exception handler and re-registers the default one.
    pub fn reset(&self) {
        self.pipeline.clear();
        self.seed();
    }

    /// The underlying pipeline, for anchor-based registration.
    pub fn pipeline(&self) -> &Pipeline<ExceptionEntry<T>> {
        &self.pipeline
    }

    /// Registers `handler` ahead of the default handler, or at the end when
    /// the default handler has been removed.
    pub fn add_handler(
        &self,
        name: impl Into<String>,
        handler: impl ExceptionHandler<T> + 'static,
    ) -> HandlerId {
        let entry = Arc::new(ExceptionEntry::new(handler));
        let id = entry.id();
        let name = name.into();
        if let Err(e) = self.pipeline.insert_before(
            DEFAULT_EXCEPTION_HANDLER,
            name.clone(),
            Arc::clone(&entry),
            0,
            Direction::FromTail,
        ) {
            debug!("{}; appending exception handler '{}'", e, name);
            self.pipeline.add_last(name, entry);
        }
        id
    }

    /// Walks the exception through the registered handlers.
    ///
    /// # Errors
    ///
    /// The error (or panic) of an exception handler that failed. The walk
    /// stops there.
    pub fn handle(&self, exception: &mut ExceptionEvent<'_, T>) -> Result<(), EventError> {
        for (name, entry) in self.pipeline.entries() {
            match panic::catch_unwind(AssertUnwindSafe(|| entry.handler.handle(exception))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(payload) => return Err(EventError::panicked(&name, payload)),
            }
            if exception.is_cancelled() {
                return Ok(());
            }
        }

        warn!(
            "⚠️ Unhandled exception from handler '{}': {}",
            exception.handler(),
            exception.error()
        );
        exception.cancel();
        Ok(())
    }
}

impl<T: Event> Default for ExceptionPipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Event> fmt::Debug for ExceptionPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionPipeline")
            .field("handlers", &self.pipeline.names())
            .finish()
    }
}
