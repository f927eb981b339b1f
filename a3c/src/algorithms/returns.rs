//! Bootstrapped returns and advantages for a rollout segment.
//!
//! A segment is the run of transitions collected between two synchronization
//! points. It ends either in a true terminal state (bootstrap with 0) or
//! mid-episode (bootstrap with the local model's value of the next state).
//!
//! ## Formulas
//!
//! n-step return, computed backward from `R = V_boot`:
//!
//! ```text
//! R_t = r_t + γ R_{t+1},    R_k = V_boot
//! A_t = R_t - V(s_t)
//! ```
//!
//! Generalized advantage estimation over the same segment:
//!
//! ```text
//! δ_t = r_t + γ V(s_{t+1}) - V(s_t),    V(s_k) = V_boot
//! A_t = δ_t + γλ A_{t+1}
//! R_t = A_t + V(s_t)
//! ```

use crate::config::AdvantageKind;

/// Value used to seed the backward pass.
///
/// Zero only when the environment genuinely terminated; a forced sync or a
/// reward cap keeps the model's own estimate, so `next_value` is only
/// evaluated for non-terminal segments.
pub fn bootstrap_value<E>(
    terminated: bool,
    next_value: impl FnOnce() -> Result<f32, E>,
) -> Result<f32, E> {
    if terminated {
        Ok(0.0)
    } else {
        next_value()
    }
}

/// Discounted returns of a segment, folded backward from `bootstrap`.
pub fn discounted_returns(rewards: &[f32], bootstrap: f32, gamma: f32) -> Vec<f32> {
    let mut returns = vec![0.0f32; rewards.len()];
    let mut running = bootstrap;
    for t in (0..rewards.len()).rev() {
        running = rewards[t] + gamma * running;
        returns[t] = running;
    }
    returns
}

/// GAE over one segment. Returns `(advantages, returns)`.
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    bootstrap: f32,
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert_eq!(values.len(), n, "one value estimate per reward");

    let mut advantages = vec![0.0f32; n];
    let mut returns = vec![0.0f32; n];

    let mut gae = 0.0f32;
    let mut next_value = bootstrap;

    for t in (0..n).rev() {
        let delta = rewards[t] + gamma * next_value - values[t];
        gae = delta + gamma * gae_lambda * gae;

        advantages[t] = gae;
        returns[t] = gae + values[t];

        next_value = values[t];
    }

    (advantages, returns)
}

/// Regression targets and advantages for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvantageEstimate {
    /// Value-loss targets.
    pub returns: Vec<f32>,
    /// Policy-gradient weights. Plain numbers, so never part of the graph.
    pub advantages: Vec<f32>,
}

/// Estimate targets and advantages with the configured estimator.
///
/// `values` must be fresh estimates from the model being trained, one per
/// buffered state.
pub fn estimate_advantages(
    kind: AdvantageKind,
    rewards: &[f32],
    values: &[f32],
    bootstrap: f32,
    gamma: f32,
) -> AdvantageEstimate {
    assert_eq!(rewards.len(), values.len(), "one value estimate per reward");

    match kind {
        AdvantageKind::Simple => {
            let returns = discounted_returns(rewards, bootstrap, gamma);
            let advantages = returns.iter().zip(values).map(|(r, v)| r - v).collect();
            AdvantageEstimate { returns, advantages }
        }
        AdvantageKind::Gae { lambda } => {
            let (advantages, returns) = compute_gae(rewards, values, bootstrap, gamma, lambda);
            AdvantageEstimate { returns, advantages }
        }
    }
}
