//! Neural network pieces: the policy/value contract and the default network.

pub mod actor_critic;

use std::fmt;

pub use actor_critic::{
    action_probs, choose_action, sample_categorical, state_value, states_tensor, tensor_to_vec,
    ActorCriticConfig, ActorCriticNet, PolicyValueModel,
};

/// Error reading model outputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Tensor data could not be read back as `f32`.
    TensorData(String),
    /// Forward pass produced no elements.
    EmptyOutput,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::TensorData(e) => write!(f, "tensor data error: {}", e),
            ModelError::EmptyOutput => write!(f, "model produced an empty output"),
        }
    }
}

impl std::error::Error for ModelError {}
