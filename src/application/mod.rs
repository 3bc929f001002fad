//! Application layer orchestrating the payment lifecycle over the domain ports.
//!
//! [`coordinator::CreationCoordinator`] owns the idempotent write path,
//! [`processor::StatusProcessor`] settles payments from queued events,
//! [`paginator::Paginator`] serves reads, and [`worker::StatusWorker`] drives
//! the processor from the queue.

pub mod coordinator;
pub mod paginator;
pub mod processor;
pub mod worker;

pub use coordinator::{CreateOutcome, CreationCoordinator};
pub use paginator::{Page, Paginator};
pub use processor::{FixedOutcome, OutcomePolicy, ProcessedItem, RandomOutcome, StatusProcessor};
pub use worker::{StatusWorker, WorkerConfig};
