//! Actor-critic loss over a buffered segment.
//!
//! ```text
//! L = mean_t[ (R_t - V(s_t))²  -  log π(a_t | s_t) · A_t ]
//! ```
//!
//! `R_t` and `A_t` come from [`estimate_advantages`] using value estimates
//! taken from the same forward pass. Both enter the graph as constants, so
//! the policy term never pushes gradient into the value branch through the
//! advantage.

use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::ElementConversion;

use crate::algorithms::returns::{estimate_advantages, AdvantageEstimate};
use crate::config::AdvantageKind;
use crate::core::TrajectoryBuffer;
use crate::nn::{states_tensor, tensor_to_vec, ModelError, PolicyValueModel};

/// Loss tensor plus scalar diagnostics.
#[derive(Debug)]
pub struct A3CLoss<B: Backend> {
    /// Scalar loss, shape `[1]`, ready for `backward()`.
    pub total: Tensor<B, 1>,
    pub value_loss: f32,
    pub policy_loss: f32,
    pub estimate: AdvantageEstimate,
}

/// Compute the loss of `model` on the segment in `buffer`.
pub fn a3c_loss<B: Backend, M: PolicyValueModel<B>>(
    model: &M,
    buffer: &TrajectoryBuffer,
    bootstrap: f32,
    gamma: f32,
    kind: AdvantageKind,
    device: &B::Device,
) -> Result<A3CLoss<B>, ModelError> {
    let k = buffer.len();
    if k == 0 {
        return Err(ModelError::EmptyOutput);
    }

    let states = states_tensor::<B>(buffer.states(), k, buffer.obs_size(), device);
    let (logits, values) = model.forward(states);
    let values = values.reshape([k]);

    let value_estimates = tensor_to_vec(values.clone().detach())?;
    let estimate = estimate_advantages(kind, buffer.rewards(), &value_estimates, bootstrap, gamma);

    let returns = Tensor::<B, 1>::from_floats(estimate.returns.as_slice(), device);
    let advantages = Tensor::<B, 1>::from_floats(estimate.advantages.as_slice(), device);

    let value_term = (returns - values).powf_scalar(2.0);

    let action_indices: Vec<i32> = buffer.actions().iter().map(|&a| a as i32).collect();
    let action_indices =
        Tensor::<B, 1, Int>::from_ints(action_indices.as_slice(), device).reshape([k, 1]);
    let log_probs = log_softmax(logits, 1).gather(1, action_indices).reshape([k]);
    let policy_term = log_probs.neg() * advantages;

    let value_loss: f32 = value_term.clone().mean().into_scalar().elem();
    let policy_loss: f32 = policy_term.clone().mean().into_scalar().elem();
    let total = (value_term + policy_term).mean();

    Ok(A3CLoss {
        total,
        value_loss,
        policy_loss,
        estimate,
    })
}
