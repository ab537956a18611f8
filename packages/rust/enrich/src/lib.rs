//! Background enrichment worker.
//!
//! Polls storage for articles missing a summary or embedding, runs them
//! through the configured inference provider, and persists the results.
//! One failed record never blocks the rest of the batch.

pub mod scheduler;

pub use scheduler::{Scheduler, SchedulerConfig};
