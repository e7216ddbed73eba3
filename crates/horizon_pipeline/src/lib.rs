//! # Horizon Pipeline
//!
//! A lock-free, named, doubly-linked concurrent sequence for the Horizon game
//! server. Network and event processing stages register themselves as named
//! elements and can be inserted, replaced, or removed while other threads
//! are walking the pipeline.
//!
//! ## Core Features
//!
//! - **Lock-Free**: every mutation is a short CAS retry loop, no mutexes
//! - **Named Elements**: insert relative to an anchor name, pick among
//!   duplicate names by occurrence and scan direction
//! - **Weakly Consistent Iteration**: forward and reverse iterators that
//!   tolerate concurrent modification and can remove as they go
//! - **Parallel Scans**: a batch-splitting cursor feeding rayon
//!
//! ## Quick Start Example
//!
//! ```rust
//! use horizon_pipeline::{Direction, Pipeline, Strictness};
//!
//! let pipeline = Pipeline::new();
//! pipeline.add_last("decoder", 1);
//! pipeline.add_last("handler", 3);
//! pipeline
//!     .insert_after("decoder", "inflater", 2, 0, Direction::FromHead)
//!     .unwrap();
//!
//! assert_eq!(pipeline.names(), ["decoder", "inflater", "handler"]);
//!
//! pipeline
//!     .set("handler", 4, 0, Direction::FromHead, Strictness::Strict)
//!     .unwrap();
//! assert_eq!(pipeline.get("handler").as_deref(), Some(&4));
//! ```
//!
//! ## Memory Model
//!
//! Nodes are reference counted through [`arc_swap`] cells. Removing an
//! element tombstones it first (the point at which every observer agrees it
//! is gone) and splices it out of the chain second. Nodes spliced out of the
//! chain keep ordered forwarding links so an iterator parked on one resumes
//! at the right place.

pub mod config;
pub mod cursor;
pub mod error;
pub mod iter;
mod node;
pub mod pipeline;
pub mod types;

pub use config::PipelineConfig;
pub use cursor::PartitionedCursor;
pub use error::{PipelineError, Result};
pub use iter::{Entries, Iter};
pub use pipeline::Pipeline;
pub use types::{Direction, Match, Strictness};
