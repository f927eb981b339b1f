//! Configuration for asynchronous actor-critic training.

use std::fmt;
use std::path::PathBuf;

use crate::optim::SharedAdamConfig;

/// Validation error for configuration parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count parameter (n_workers, sync_interval, etc.) must be positive.
    InvalidCount {
        field: &'static str,
        value: usize,
    },
    /// A parameter is outside its valid range.
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::OutOfRange { field, value, min, max } => {
                write!(f, "{} must be in [{}, {}], got {}", field, min, max, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub(crate) fn check_range(
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

/// How advantages and value targets are derived from a rollout segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdvantageKind {
    /// Bootstrapped n-step return minus the value estimate.
    Simple,
    /// Generalized advantage estimation with the given λ.
    Gae { lambda: f32 },
}

impl AdvantageKind {
    /// Label used in history file names.
    pub fn label(&self) -> &'static str {
        match self {
            AdvantageKind::Simple => "Simple",
            AdvantageKind::Gae { .. } => "GAE",
        }
    }

    pub fn lambda(&self) -> Option<f32> {
        match self {
            AdvantageKind::Simple => None,
            AdvantageKind::Gae { lambda } => Some(*lambda),
        }
    }
}

/// Scope of a worker's convergence decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPolicy {
    /// A converged worker ends only its own loop.
    #[default]
    PerWorker,
    /// A converged worker raises a shared flag every worker polls between episodes.
    Global,
}

/// Whether the run updates the shared model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Workers push gradients; the model may be saved at the end.
    #[default]
    Train,
    /// A loaded model is run without updates on a single worker; never saved.
    Evaluate,
}

/// Configuration for an A3C training run.
///
/// # Example
///
/// ```rust,ignore
/// let config = A3CConfig::new()
///     .with_n_workers(8)
///     .with_gamma(0.9)
///     .with_max_episodes(3000)
///     .with_model_dir("models/cartpole");
/// config.validate()?;
/// ```
#[derive(Debug, Clone)]
pub struct A3CConfig {
    // === Topology ===
    /// Number of worker threads (forced to 1 in evaluation mode).
    pub n_workers: usize,
    pub mode: RunMode,
    /// Worker that renders its environment each step.
    pub demo_worker: Option<usize>,
    /// Base seed; worker `i` uses `seed + i`.
    pub seed: u64,

    // === Rollout ===
    /// Transitions buffered before a push-and-pull.
    pub sync_interval: usize,
    pub gamma: f32,
    pub advantage: AdvantageKind,
    /// Reward substituted on the terminating transition (`None` keeps the env reward).
    pub terminal_penalty: Option<f32>,
    /// Cumulative episode reward at which the episode is cut.
    pub reward_cap: f32,

    // === Budget and stopping ===
    /// Global episode budget across all workers.
    pub max_episodes: usize,
    /// Mean score a worker's recent history must reach to stop.
    pub stop_threshold: f32,
    /// Stop window in training mode (`None` means the worker count).
    pub stop_window: Option<usize>,
    /// Stop window in evaluation mode.
    pub eval_window: usize,
    pub stop_policy: StopPolicy,
    /// Smoothing factor of the running reward.
    pub reward_smoothing: f64,

    // === Persistence ===
    /// Mean of the most recent rewards required before saving.
    pub save_threshold: f32,
    pub model_dir: Option<PathBuf>,

    // === Optimizer ===
    pub optimizer: SharedAdamConfig,

    // === Logging ===
    /// Episodes between console progress lines.
    pub log_interval: usize,
}

impl Default for A3CConfig {
    fn default() -> Self {
        Self {
            n_workers: default_worker_count(),
            mode: RunMode::Train,
            demo_worker: None,
            seed: 0,
            sync_interval: 20,
            gamma: 0.9,
            advantage: AdvantageKind::Simple,
            terminal_penalty: Some(-1.0),
            reward_cap: 600.0,
            max_episodes: 3000,
            stop_threshold: 500.0,
            stop_window: None,
            eval_window: 100,
            stop_policy: StopPolicy::PerWorker,
            reward_smoothing: 0.99,
            save_threshold: 300.0,
            model_dir: None,
            optimizer: SharedAdamConfig::default(),
            log_interval: 10,
        }
    }
}

/// Available hardware parallelism, or 1 if it cannot be queried.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl A3CConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker threads actually spawned.
    pub fn effective_workers(&self) -> usize {
        match self.mode {
            RunMode::Train => self.n_workers,
            RunMode::Evaluate => 1,
        }
    }

    /// Window `K` of the per-worker stop condition.
    pub fn effective_stop_window(&self) -> usize {
        match self.mode {
            RunMode::Train => self.stop_window.unwrap_or(self.n_workers),
            RunMode::Evaluate => self.eval_window,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_workers == 0 {
            return Err(ConfigError::InvalidCount {
                field: "n_workers",
                value: 0,
            });
        }
        if self.sync_interval == 0 {
            return Err(ConfigError::InvalidCount {
                field: "sync_interval",
                value: 0,
            });
        }
        if self.max_episodes == 0 {
            return Err(ConfigError::InvalidCount {
                field: "max_episodes",
                value: 0,
            });
        }
        if self.effective_stop_window() == 0 {
            return Err(ConfigError::InvalidCount {
                field: "stop_window",
                value: 0,
            });
        }

        // gamma in (0, 1)
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "gamma",
                value: self.gamma,
                min: 0.0,
                max: 1.0,
            });
        }
        if let AdvantageKind::Gae { lambda } = self.advantage {
            check_range("gae_lambda", lambda, 0.0, 1.0)?;
        }
        check_range(
            "reward_smoothing",
            self.reward_smoothing as f32,
            0.0,
            1.0,
        )?;
        if !(self.reward_cap > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "reward_cap",
                value: self.reward_cap,
                min: f32::MIN_POSITIVE,
                max: f32::INFINITY,
            });
        }

        self.optimizer.validate()
    }

    // === Builder methods ===

    pub fn with_n_workers(mut self, n: usize) -> Self {
        self.n_workers = n;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_demo_worker(mut self, worker: Option<usize>) -> Self {
        self.demo_worker = worker;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sync_interval(mut self, interval: usize) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_advantage(mut self, advantage: AdvantageKind) -> Self {
        self.advantage = advantage;
        self
    }

    pub fn with_terminal_penalty(mut self, penalty: Option<f32>) -> Self {
        self.terminal_penalty = penalty;
        self
    }

    pub fn with_reward_cap(mut self, cap: f32) -> Self {
        self.reward_cap = cap;
        self
    }

    pub fn with_max_episodes(mut self, episodes: usize) -> Self {
        self.max_episodes = episodes;
        self
    }

    pub fn with_stop_threshold(mut self, threshold: f32) -> Self {
        self.stop_threshold = threshold;
        self
    }

    pub fn with_stop_window(mut self, window: usize) -> Self {
        self.stop_window = Some(window);
        self
    }

    pub fn with_eval_window(mut self, window: usize) -> Self {
        self.eval_window = window;
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    pub fn with_save_threshold(mut self, threshold: f32) -> Self {
        self.save_threshold = threshold;
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    pub fn with_optimizer(mut self, optimizer: SharedAdamConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.optimizer.learning_rate = lr;
        self
    }

    pub fn with_log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval;
        self
    }
}
