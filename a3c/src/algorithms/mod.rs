//! Algorithm components.
//!
//! - `returns`: bootstrapped n-step returns and GAE over a rollout segment
//! - `loss`: combined value/policy loss used by push-and-pull

pub mod loss;
pub mod returns;

#[cfg(test)]
mod tests;

pub use loss::{a3c_loss, A3CLoss};
pub use returns::{
    bootstrap_value, compute_gae, discounted_returns, estimate_advantages, AdvantageEstimate,
};
