use crate::error::EventError;
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

/// Identifies one registration of a handler. Timings are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId(pub Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A handler invoked synchronously on the dispatching thread.
pub trait EventHandler<T: Event>: Send + Sync {
    fn handle(&self, event: &mut T) -> Result<(), EventError>;

    /// Handlers returning `true` are skipped for events that are already
    /// cancelled when their turn comes.
    fn ignores_cancelled(&self) -> bool {
        false
    }
}

/// Adapts a closure into an [`EventHandler`].
pub struct FnHandler<T, F>
where
    T: Event,
    F: Fn(&mut T) -> Result<(), EventError> + Send + Sync,
{
    handler: F,
    ignore_cancelled: bool,
    _phantom: PhantomData<fn(&mut T)>,
}

impl<T, F> FnHandler<T, F>
where
    T: Event,
    F: Fn(&mut T) -> Result<(), EventError> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            ignore_cancelled: false,
            _phantom: PhantomData,
        }
    }

    /// Skip this handler for events that are already cancelled.
    pub fn ignore_cancelled(mut self) -> Self {
        self.ignore_cancelled = true;
        self
    }
}

impl<T, F> EventHandler<T> for FnHandler<T, F>
where
    T: Event,
    F: Fn(&mut T) -> Result<(), EventError> + Send + Sync,
{
    fn handle(&self, event: &mut T) -> Result<(), EventError> {
        (self.handler)(event)
    }

    fn ignores_cancelled(&self) -> bool {
        self.ignore_cancelled
    }
}

/// Placeholder stored in the priority slot nodes. Never invoked.
pub(crate) struct SlotMarker;

impl<T: Event> EventHandler<T> for SlotMarker {
    fn handle(&self, _event: &mut T) -> Result<(), EventError> {
        Ok(())
    }
}

/// The value stored in an event pipeline node: a handler and the id of its
/// registration. Two entries are equal when they come from the same
/// registration.
pub struct HandlerEntry<T: Event> {
    id: HandlerId,
    handler: Box<dyn EventHandler<T>>,
}

impl<T: Event> HandlerEntry<T> {
    pub fn new(handler: impl EventHandler<T> + 'static) -> Self {
        Self {
            id: HandlerId::new(),
            handler: Box::new(handler),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn handle(&self, event: &mut T) -> Result<(), EventError> {
        self.handler.handle(event)
    }

    pub fn ignores_cancelled(&self) -> bool {
        self.handler.ignores_cancelled()
    }
}

impl<T: Event> PartialEq for HandlerEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Event> Eq for HandlerEntry<T> {}

impl<T: Event> fmt::Debug for HandlerEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("id", &self.id)
            .field("ignores_cancelled", &self.ignores_cancelled())
            .finish()
    }
}
