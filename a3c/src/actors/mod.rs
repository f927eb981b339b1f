//! Worker threads and their stop rules.
//!
//! - `Worker`: episode loop with push-and-pull at every sync point
//! - `StopCondition`: per-worker convergence over its own score history
//! - `StopSignal`: optional flag shared by all workers

pub mod stop_condition;
pub mod worker;

#[cfg(test)]
mod tests;

pub use stop_condition::{StopCondition, StopSignal};
pub use worker::{Worker, WorkerError, WorkerHandle, WorkerSettings};
