//! Model persistence.
//!
//! ## Example
//!
//! ```rust,ignore
//! use a3c::checkpoint::{ModelDescriptor, ModelStore};
//!
//! let store = ModelStore::new("models/cartpole");
//! store.save(&model, &ModelDescriptor::new("CartPole", architecture))?;
//!
//! let (model, descriptor) = store.load::<Backend>(&device)?;
//! ```

pub mod model_store;

pub use model_store::{CheckpointError, ModelDescriptor, ModelStore, FORMAT_VERSION};
