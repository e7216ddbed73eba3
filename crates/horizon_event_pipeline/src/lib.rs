//! # Horizon Event Pipeline
//!
//! Priority-ordered dispatch of typed events on top of
//! [`horizon_pipeline::Pipeline`].
//!
//! ## Core Features
//!
//! - **Priorities**: handlers run from [`Priority::Lowest`] to
//!   [`Priority::Monitor`], in registration order within a priority
//! - **Cancellation**: handlers may opt out of events that were cancelled
//!   before their turn
//! - **Fault Isolation**: a handler error or panic stops dispatch of that one
//!   event and is routed through an [`ExceptionPipeline`]
//! - **Timings**: per-handler execution statistics in a concurrent map
//!
//! ## Quick Start Example
//!
//! ```rust
//! use horizon_event_pipeline::{Event, EventError, EventPipeline, Priority};
//!
//! #[derive(Debug)]
//! struct PlayerJoined {
//!     greeting: String,
//! }
//!
//! impl Event for PlayerJoined {}
//!
//! let events = EventPipeline::new();
//! events
//!     .register_fn(Priority::Normal, "greeter", |e: &mut PlayerJoined| {
//!         e.greeting.push_str(", welcome");
//!         Ok::<(), EventError>(())
//!     })
//!     .unwrap();
//!
//! let mut event = PlayerJoined { greeting: "Hello".to_string() };
//! assert!(events.run(&mut event).is_completed());
//! assert_eq!(event.greeting, "Hello, welcome");
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod exception;
pub mod handler;
pub mod timing;

pub use config::EventPipelineConfig;
pub use dispatch::{DispatchOutcome, EventPipeline};
pub use error::EventError;
pub use event::{Event, Priority};
pub use exception::{
    ExceptionEntry, ExceptionEvent, ExceptionHandler, ExceptionPipeline, DEFAULT_EXCEPTION_HANDLER,
};
pub use handler::{EventHandler, FnHandler, HandlerEntry, HandlerId};
pub use timing::{TimingRecord, Timings};
