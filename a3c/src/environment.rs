//! Environment abstraction for worker threads.
//!
//! A worker drives exactly one environment instance, so the contract is scalar:
//! one observation in, one action out. Implementations must be `Send` because
//! they are moved into the worker thread at spawn time.

use std::fmt;

use cartpole::CartPole;

/// Error raised by an environment during reset or step.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvError {
    /// Action index outside `0..n_actions`.
    InvalidAction { action: usize, n_actions: usize },
    /// `step` called before the first `reset`.
    NotReset,
    /// Environment-specific failure.
    Backend(String),
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvError::InvalidAction { action, n_actions } => {
                write!(f, "action {} out of range for {} actions", action, n_actions)
            }
            EnvError::NotReset => write!(f, "step called before reset"),
            EnvError::Backend(msg) => write!(f, "environment error: {}", msg),
        }
    }
}

impl std::error::Error for EnvError {}

/// Auxiliary step information.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepInfo {
    /// Steps taken since the last reset.
    pub episode_steps: usize,
    /// Episode ended on a step limit rather than a terminal state.
    pub truncated: bool,
}

/// Result of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    /// Post-step observation.
    pub state: Vec<f32>,
    pub reward: f32,
    /// Episode ended (terminal state or truncation).
    pub done: bool,
    pub info: StepInfo,
}

/// Scalar environment driven by one worker.
pub trait Environment: Send {
    /// Short name used in history file names.
    fn name(&self) -> &str;

    fn obs_size(&self) -> usize;

    fn n_actions(&self) -> usize;

    /// Start a new episode and return the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>, EnvError>;

    fn step(&mut self, action: usize) -> Result<EnvStep, EnvError>;

    /// Display the current state. Only the demo worker calls this.
    fn render(&self) {}
}

/// Cart-pole adapter for worker threads.
///
/// Wraps [`cartpole::CartPole`] without a step limit. Rendering writes a text
/// picture of the track to the log.
#[derive(Debug, Clone)]
pub struct CartPoleEnv {
    inner: CartPole,
    started: bool,
}

impl CartPoleEnv {
    pub const NAME: &'static str = "CartPole";

    pub fn new(seed: u64) -> Self {
        Self {
            inner: CartPole::new(seed),
            started: false,
        }
    }

    /// Truncate episodes after `max_steps` ticks.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.inner = self.inner.with_max_steps(max_steps);
        self
    }
}

impl Environment for CartPoleEnv {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn obs_size(&self) -> usize {
        cartpole::OBS_SIZE
    }

    fn n_actions(&self) -> usize {
        cartpole::N_ACTIONS
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.started = true;
        Ok(self.inner.reset().to_vec())
    }

    fn step(&mut self, action: usize) -> Result<EnvStep, EnvError> {
        if !self.started {
            return Err(EnvError::NotReset);
        }
        if action >= cartpole::N_ACTIONS {
            return Err(EnvError::InvalidAction {
                action,
                n_actions: cartpole::N_ACTIONS,
            });
        }

        let result = self.inner.step(action);
        Ok(EnvStep {
            state: result.observation.to_vec(),
            reward: result.reward,
            done: result.done(),
            info: StepInfo {
                episode_steps: self.inner.ticks() as usize,
                truncated: result.truncated,
            },
        })
    }

    fn render(&self) {
        log::info!("{}", self.inner.render_ascii());
    }
}
