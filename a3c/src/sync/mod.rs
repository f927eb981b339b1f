//! Push-and-pull synchronization between workers and the shared model.
//!
//! - `parameter_server`: thread that owns the shared model and [`SharedAdam`](crate::optim::SharedAdam)
//! - `client`: worker handle and the [`push_and_pull`] round

pub mod client;
pub mod parameter_server;

#[cfg(test)]
mod tests;

pub use client::{push_and_pull, SyncClient, SyncError, SyncReport, SyncSettings};
pub use parameter_server::{ParameterServer, ParameterServerHandle, ServerOutcome};
