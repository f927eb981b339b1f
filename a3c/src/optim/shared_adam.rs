//! Adam shared by every worker, plus a global step counter.
//!
//! The update itself is burn's [`Adam`] behind an [`OptimizerAdaptor`]: one
//! first/second moment pair per parameter, created on the parameter's first
//! gradient. [`SharedAdam`] adds the run-wide counter that numbers pushes.
//! The instance is owned by the parameter server thread, so a step (moments,
//! parameters and counter together) is never observed half-done.
//!
//! ```text
//! m ← β1·m + (1-β1)·g
//! v ← β2·v + (1-β2)·g²
//! θ ← θ - lr · (m / (1-β1^t)) / (√(v / (1-β2^t)) + ε)
//! ```

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;

use crate::config::{check_range, ConfigError};

/// Hyperparameters of [`SharedAdam`].
#[derive(Debug, Clone, PartialEq)]
pub struct SharedAdamConfig {
    pub learning_rate: f64,
    pub beta_1: f32,
    pub beta_2: f32,
    pub epsilon: f32,
}

impl Default for SharedAdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.003,
            beta_1: 0.92,
            beta_2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl SharedAdamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_betas(mut self, beta_1: f32, beta_2: f32) -> Self {
        self.beta_1 = beta_1;
        self.beta_2 = beta_2;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ConfigError::OutOfRange {
                field: "learning_rate",
                value: self.learning_rate as f32,
                min: 0.0,
                max: f32::INFINITY,
            });
        }
        check_range("beta_1", self.beta_1, 0.0, 0.999_999)?;
        check_range("beta_2", self.beta_2, 0.0, 0.999_999)?;
        if !(self.epsilon > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "epsilon",
                value: self.epsilon,
                min: f32::MIN_POSITIVE,
                max: f32::INFINITY,
            });
        }
        Ok(())
    }
}

/// Adam state shared by every worker's updates.
pub struct SharedAdam<B: AutodiffBackend, M: AutodiffModule<B>> {
    config: SharedAdamConfig,
    optimizer: OptimizerAdaptor<Adam, M, B>,
    steps: u64,
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> SharedAdam<B, M> {
    /// Fresh optimizer: no moments, step 0.
    pub fn new(config: SharedAdamConfig) -> Self {
        let optimizer = AdamConfig::new()
            .with_beta_1(config.beta_1)
            .with_beta_2(config.beta_2)
            .with_epsilon(config.epsilon)
            .init();
        Self {
            config,
            optimizer,
            steps: 0,
        }
    }

    pub fn config(&self) -> &SharedAdamConfig {
        &self.config
    }

    /// Steps applied so far.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Parameters that have received at least one gradient.
    pub fn tracked_params(&self) -> usize {
        self.optimizer.to_record().len()
    }

    /// Apply one update with `grads` and return the updated model.
    ///
    /// The counter advances even when `grads` is empty. Parameters without
    /// a gradient keep their value and their moments.
    pub fn step(&mut self, model: M, grads: GradientsParams) -> M {
        self.steps += 1;
        self.optimizer.step(self.config.learning_rate, model, grads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::flatten_params;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::{Linear, LinearConfig};
    use burn::prelude::*;

    type TestBackend = Autodiff<NdArray<f32>>;
    type TinyAdam = SharedAdam<TestBackend, TinyNet<TestBackend>>;

    #[derive(Module, Debug)]
    struct TinyNet<B: Backend> {
        linear: Linear<B>,
    }

    impl<B: Backend> TinyNet<B> {
        fn new(device: &B::Device) -> Self {
            Self {
                linear: LinearConfig::new(2, 1).init(device),
            }
        }

        fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
            self.linear.forward(x)
        }
    }

    /// loss = sum(W·x + b) gives dL/dW = x, dL/db = 1.
    fn grads_for(model: &TinyNet<TestBackend>, x: [f32; 2]) -> GradientsParams {
        let device = Default::default();
        let input = Tensor::<TestBackend, 1>::from_floats(x, &device).reshape([1, 2]);
        let loss = model.forward(input).sum();
        GradientsParams::from_grads(loss.backward(), model)
    }

    #[test]
    fn test_default_config() {
        let config = SharedAdamConfig::default();
        assert_eq!(config.learning_rate, 0.003);
        assert_eq!(config.beta_1, 0.92);
        assert_eq!(config.beta_2, 0.999);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SharedAdamConfig::new().with_learning_rate(0.0).validate().is_err());
        assert!(SharedAdamConfig::new().with_betas(1.0, 0.999).validate().is_err());
        assert!(SharedAdamConfig::new().with_epsilon(0.0).validate().is_err());
    }

    /// First step of Adam moves every parameter by ≈ lr against the gradient sign.
    #[test]
    fn test_first_step_matches_closed_form() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(&device);
        let before = flatten_params(&model).unwrap();

        let grads = grads_for(&model, [2.0, -3.0]);
        let mut adam = TinyAdam::new(SharedAdamConfig::default().with_learning_rate(0.1));
        let model = adam.step(model, grads);
        let after = flatten_params(&model).unwrap();

        // Traversal order: weight [2, 1] then bias [1]; gradients 2, -3, 1.
        let expected_delta = [-0.1, 0.1, -0.1];
        assert_eq!(before.len(), 3);
        for i in 0..3 {
            let delta = after[i] - before[i];
            assert!(
                (delta - expected_delta[i]).abs() < 1e-4,
                "param {}: delta {}",
                i,
                delta
            );
        }
        assert_eq!(adam.step_count(), 1);
        assert_eq!(adam.tracked_params(), 2);
    }

    #[test]
    fn test_second_step_uses_accumulated_moments() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(&device);
        let config = SharedAdamConfig::default().with_learning_rate(0.01);
        let mut adam = TinyAdam::new(config.clone());

        let grads = grads_for(&model, [1.0, 1.0]);
        let model = adam.step(model, grads);
        let before = flatten_params(&model).unwrap();

        // Same gradient again: m̂ = g, v̂ = g², so the step is still ≈ lr.
        let grads = grads_for(&model, [1.0, 1.0]);
        let model = adam.step(model, grads);
        let after = flatten_params(&model).unwrap();

        for (b, a) in before.iter().zip(&after) {
            assert!(((a - b) + 0.01).abs() < 1e-4);
        }
        assert_eq!(adam.step_count(), 2);
    }

    #[test]
    fn test_empty_gradients_still_count_a_step() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(&device);
        let before = flatten_params(&model).unwrap();

        let mut adam = TinyAdam::new(SharedAdamConfig::default());
        let model = adam.step(model, GradientsParams::new());

        assert_eq!(flatten_params(&model).unwrap(), before);
        assert_eq!(adam.step_count(), 1);
        assert_eq!(adam.tracked_params(), 0);
    }

    #[test]
    fn test_updated_params_remain_trainable() {
        let device = Default::default();
        let model = TinyNet::<TestBackend>::new(&device);
        let mut adam = TinyAdam::new(SharedAdamConfig::default());

        let grads = grads_for(&model, [1.0, 2.0]);
        let model = adam.step(model, grads);

        // A second backward pass must still produce gradients for every param.
        let grads = grads_for(&model, [1.0, 2.0]);
        assert_eq!(grads.len(), 2);
    }
}
