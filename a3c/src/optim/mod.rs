//! Optimizer shared by all workers.
//!
//! [`SharedAdam`] is never touched by workers directly: it lives inside the
//! parameter server thread (see [`crate::sync`]), which applies one request
//! at a time.

pub mod params;
pub mod shared_adam;

pub use params::flatten_params;
pub use shared_adam::{SharedAdam, SharedAdamConfig};
