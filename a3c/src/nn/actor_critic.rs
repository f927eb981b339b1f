//! Policy/value network used by workers and the parameter server.
//!
//! Shared trunk feeding two heads:
//!
//! ```text
//! obs ──► Linear(obs, 24) ─ relu ─► Linear(24, 48) ─ relu ─┬─► Linear(48, 24) ─ relu ─► Linear(24, A)   logits
//!                                                          └─► Linear(48, 24) ─ relu ─► Linear(24, 1)   value
//! ```

use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Anything that maps a batch of states to action logits and state values.
///
/// Both the local copies held by workers and the shared copy owned by the
/// parameter server go through this trait.
pub trait PolicyValueModel<B: Backend>: Module<B> {
    /// `states: [batch, obs]` → `(logits: [batch, n_actions], values: [batch, 1])`.
    fn forward(&self, states: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>);
}

/// Architecture description of [`ActorCriticNet`].
///
/// Serialized into the model descriptor so that a saved network can be
/// rebuilt before its weights are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCriticConfig {
    pub obs_size: usize,
    pub n_actions: usize,
    pub trunk_hidden: usize,
    pub trunk_out: usize,
    pub head_hidden: usize,
}

impl ActorCriticConfig {
    /// 24/48/24 layout.
    pub fn new(obs_size: usize, n_actions: usize) -> Self {
        Self {
            obs_size,
            n_actions,
            trunk_hidden: 24,
            trunk_out: 48,
            head_hidden: 24,
        }
    }

    pub fn with_hidden(mut self, trunk_hidden: usize, trunk_out: usize, head_hidden: usize) -> Self {
        self.trunk_hidden = trunk_hidden;
        self.trunk_out = trunk_out;
        self.head_hidden = head_hidden;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ActorCriticNet<B> {
        // Xavier uniform with ReLU gain.
        let init = Initializer::XavierUniform {
            gain: std::f64::consts::SQRT_2,
        };
        let linear = |d_in: usize, d_out: usize| {
            LinearConfig::new(d_in, d_out)
                .with_initializer(init.clone())
                .init(device)
        };

        ActorCriticNet {
            trunk_0: linear(self.obs_size, self.trunk_hidden),
            trunk_1: linear(self.trunk_hidden, self.trunk_out),
            policy_hidden: linear(self.trunk_out, self.head_hidden),
            policy_out: linear(self.head_hidden, self.n_actions),
            value_hidden: linear(self.trunk_out, self.head_hidden),
            value_out: linear(self.head_hidden, 1),
        }
    }
}

#[derive(Module, Debug)]
pub struct ActorCriticNet<B: Backend> {
    trunk_0: Linear<B>,
    trunk_1: Linear<B>,
    policy_hidden: Linear<B>,
    policy_out: Linear<B>,
    value_hidden: Linear<B>,
    value_out: Linear<B>,
}

impl<B: Backend> PolicyValueModel<B> for ActorCriticNet<B> {
    fn forward(&self, states: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let x = relu(self.trunk_0.forward(states));
        let x = relu(self.trunk_1.forward(x));

        let pi = relu(self.policy_hidden.forward(x.clone()));
        let logits = self.policy_out.forward(pi);

        let v = relu(self.value_hidden.forward(x));
        let values = self.value_out.forward(v);

        (logits, values)
    }
}

/// Build a `[rows, cols]` tensor from row-major data.
pub fn states_tensor<B: Backend>(
    flat: &[f32],
    rows: usize,
    cols: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(flat, device).reshape([rows, cols])
}

/// Copy a tensor's elements out as `f32`.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, ModelError> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ModelError::TensorData(format!("{:?}", e)))
}

/// Action probabilities for a single state.
pub fn action_probs<B: Backend, M: PolicyValueModel<B>>(
    model: &M,
    state: &[f32],
    device: &B::Device,
) -> Result<Vec<f32>, ModelError> {
    let input = states_tensor::<B>(state, 1, state.len(), device);
    let (logits, _) = model.forward(input);
    tensor_to_vec(softmax(logits, 1))
}

/// Sample an action from the categorical distribution over `softmax(logits)`.
pub fn choose_action<B: Backend, M: PolicyValueModel<B>>(
    model: &M,
    state: &[f32],
    device: &B::Device,
) -> Result<usize, ModelError> {
    let probs = action_probs(model, state, device)?;
    sample_categorical(&probs, fastrand::f32())
}

/// Value estimate of a single state.
pub fn state_value<B: Backend, M: PolicyValueModel<B>>(
    model: &M,
    state: &[f32],
    device: &B::Device,
) -> Result<f32, ModelError> {
    let input = states_tensor::<B>(state, 1, state.len(), device);
    let (_, values) = model.forward(input);
    tensor_to_vec(values)?
        .first()
        .copied()
        .ok_or(ModelError::EmptyOutput)
}

/// Inverse-CDF sampling with a uniform draw `u` in `[0, 1)`.
///
/// Falls back to the last action when rounding leaves the cumulative sum
/// slightly below 1.
pub fn sample_categorical(probs: &[f32], u: f32) -> Result<usize, ModelError> {
    if probs.is_empty() {
        return Err(ModelError::EmptyOutput);
    }
    let mut cumsum = 0.0;
    for (action, p) in probs.iter().enumerate() {
        cumsum += p;
        if u < cumsum {
            return Ok(action);
        }
    }
    Ok(probs.len() - 1)
}
