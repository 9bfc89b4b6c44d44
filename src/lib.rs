//! # serialq
//!
//! An asynchronous serial queue for owners that talk over a single shared
//! channel and must never interleave two commands.
//!
//! Work submitted through [`SerialQueue::enqueue`] runs one item at a time.
//! Disposal is idempotent and race-free: exactly one caller tears the queue
//! down, after any in-flight item finishes, and every later submission is
//! rejected with [`Error::Disposed`].

pub mod config;
pub mod error;
pub mod queue;
pub mod telemetry;
pub mod timeline;

pub use error::{Error, Result};
pub use queue::{QueueId, QueueState, SerialQueue};
