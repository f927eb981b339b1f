//! Run orchestration.
//!
//! [`Coordinator`] spawns one parameter server and W workers, drains the
//! metrics channels, joins everything and decides whether the final shared
//! model is good enough to keep.

pub mod coordinator;

#[cfg(test)]
mod tests;

pub use coordinator::{Coordinator, CoordinatorError, TrainingOutcome};
