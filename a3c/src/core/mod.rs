//! Core data structures shared by workers and the parameter server.

pub mod model_slot;
pub mod trajectory;

pub use model_slot::{
    decode_weights, encode_weights, model_slot, ModelSlot, SharedModelSlot, WeightRecorder,
};
pub use trajectory::TrajectoryBuffer;
