//! Run orchestration: spawn, drain, join, accept, save.
//!
//! ```text
//!                 ┌──────────────────────┐
//!  workers ──────►│  parameter server    │  PushRequest / PushAck
//!     │           └──────────────────────┘
//!     │ reward / duration / action envelopes
//!     ▼
//!  coordinator ── drains until every worker has terminated on every channel,
//!                 sole writer of the training progress workers poll
//! ```

use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;

use crate::actors::{StopSignal, Worker, WorkerSettings};
use crate::checkpoint::{CheckpointError, ModelDescriptor, ModelStore};
use crate::config::{A3CConfig, ConfigError, RunMode};
use crate::environment::Environment;
use crate::messages::MetricsChannels;
use crate::metrics::{
    training_progress, ConsoleLogger, MetricsAggregator, MetricsHistory, MetricsLogger,
};
use crate::nn::PolicyValueModel;
use crate::optim::SharedAdam;
use crate::sync::{ParameterServer, SyncError};

/// Error that aborts a run.
#[derive(Debug)]
pub enum CoordinatorError {
    Config(ConfigError),
    /// A worker thread could not be started.
    Spawn(io::Error),
    /// The parameter server could not be started.
    Server(SyncError),
    /// The parameter server thread panicked; the shared model is lost.
    ServerPanicked,
    Checkpoint(CheckpointError),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorError::Config(e) => write!(f, "invalid configuration: {}", e),
            CoordinatorError::Spawn(e) => write!(f, "failed to spawn thread: {}", e),
            CoordinatorError::Server(e) => write!(f, "{}", e),
            CoordinatorError::ServerPanicked => write!(f, "parameter server panicked"),
            CoordinatorError::Checkpoint(e) => write!(f, "failed to save model: {}", e),
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoordinatorError::Config(e) => Some(e),
            CoordinatorError::Spawn(e) => Some(e),
            CoordinatorError::Server(e) => Some(e),
            CoordinatorError::ServerPanicked => None,
            CoordinatorError::Checkpoint(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CoordinatorError {
    fn from(e: ConfigError) -> Self {
        CoordinatorError::Config(e)
    }
}

impl From<CheckpointError> for CoordinatorError {
    fn from(e: CheckpointError) -> Self {
        CoordinatorError::Checkpoint(e)
    }
}

/// Result of a finished run.
pub struct TrainingOutcome<M> {
    /// Shared model after the last optimizer step.
    pub model: M,
    /// Drained histories and each worker's finish reason.
    pub history: MetricsHistory,
    pub optimizer_steps: u64,
    pub elapsed: Duration,
    /// Mean of the most recent rewards, one per worker.
    pub recent_mean: Option<f32>,
    /// `recent_mean` reached the save threshold.
    pub accepted: bool,
    pub saved: bool,
}

impl<M> TrainingOutcome<M> {
    pub fn episodes(&self) -> usize {
        self.history.episodes()
    }

    /// Workers that ended on an error or a panic.
    pub fn failures(&self) -> usize {
        self.history
            .finished
            .values()
            .filter(|reason| reason.is_failure())
            .count()
    }
}

/// Runs one training (or evaluation) session.
///
/// # Example
///
/// ```rust,ignore
/// let config = A3CConfig::new().with_n_workers(8).with_model_dir("models/cartpole");
/// let outcome = Coordinator::<Backend, ActorCriticNet<Backend>>::new(config)
///     .with_descriptor(ModelDescriptor::new("CartPole", architecture))
///     .run(
///         |device| architecture.init(device),
///         architecture.init(&device),
///         |id| CartPoleEnv::new(seed + id as u64),
///     )?;
/// ```
pub struct Coordinator<B: AutodiffBackend, M> {
    config: A3CConfig,
    descriptor: Option<ModelDescriptor>,
    logger: Option<Box<dyn MetricsLogger>>,
    device: B::Device,
    _model: PhantomData<M>,
}

impl<B, M> Coordinator<B, M>
where
    B: AutodiffBackend,
    M: PolicyValueModel<B> + AutodiffModule<B> + 'static,
    M::InnerModule: PolicyValueModel<B::InnerBackend>,
{
    pub fn new(config: A3CConfig) -> Self {
        Self {
            config,
            descriptor: None,
            logger: None,
            device: B::Device::default(),
            _model: PhantomData,
        }
    }

    /// Metadata written next to the weights when the model is saved.
    pub fn with_descriptor(mut self, descriptor: ModelDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Replace the default console logger.
    pub fn with_logger(mut self, logger: Box<dyn MetricsLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_device(mut self, device: B::Device) -> Self {
        self.device = device;
        self
    }

    pub fn config(&self) -> &A3CConfig {
        &self.config
    }

    /// Train `initial_model` with one environment per worker from `env_factory`.
    ///
    /// `model_factory` builds each worker's local model; only its
    /// architecture matters, since the shared weights are loaded into it.
    /// Blocks until every worker has finished and the parameter server has
    /// returned the final model.
    pub fn run<MF, E, F>(
        self,
        model_factory: MF,
        initial_model: M,
        env_factory: F,
    ) -> Result<TrainingOutcome<M>, CoordinatorError>
    where
        MF: Fn(&B::Device) -> M,
        E: Environment + 'static,
        F: Fn(usize) -> E,
    {
        let Self {
            config,
            descriptor,
            logger,
            device,
            ..
        } = self;
        config.validate()?;

        let n_workers = config.effective_workers();
        let started = Instant::now();
        log::info!(
            "Starting {:?} run: {} workers, sync every {} steps, gamma {}, {} estimator",
            config.mode,
            n_workers,
            config.sync_interval,
            config.gamma,
            config.advantage.label()
        );

        let server = ParameterServer::<B, M>::spawn(
            initial_model,
            SharedAdam::new(config.optimizer.clone()),
        )
        .map_err(CoordinatorError::Server)?;

        let channels = MetricsChannels::new();
        let progress = training_progress(config.reward_smoothing);
        let stop_signal = StopSignal::new();

        let mut handles = Vec::with_capacity(n_workers);
        let mut spawn_error = None;
        for worker_id in 0..n_workers {
            let worker = Worker::<B, M, E>::new(
                WorkerSettings::from_config(&config, worker_id),
                env_factory(worker_id),
                model_factory(&device),
                server.client(worker_id),
                channels.sender(worker_id),
                progress.reader(),
                stop_signal.clone(),
                device.clone(),
            );
            match worker.spawn() {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    log::error!("failed to spawn worker {}: {}", worker_id, e);
                    // Wind down the workers already running.
                    stop_signal.raise();
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        let logger = logger.unwrap_or_else(|| Box::new(ConsoleLogger::new(config.log_interval)));
        let history =
            MetricsAggregator::new(handles.len(), progress, logger).drain(channels.into_receiver());

        for handle in handles {
            let worker_id = handle.worker_id;
            match handle.join() {
                Ok(Ok(reason)) => log::debug!("worker {} joined: {:?}", worker_id, reason),
                Ok(Err(e)) => log::warn!("worker {} ended with error: {}", worker_id, e),
                Err(_) => log::warn!("worker {} panicked", worker_id),
            }
        }

        let server_outcome = server
            .shutdown()
            .map_err(|_| CoordinatorError::ServerPanicked)?;
        if let Some(e) = spawn_error {
            return Err(CoordinatorError::Spawn(e));
        }

        let optimizer_steps = server_outcome.optimizer.step_count();
        let recent_mean = history.recent_mean(n_workers);
        let accepted = recent_mean.is_some_and(|mean| mean >= config.save_threshold);
        log::info!(
            "Run finished: {} episodes, {} optimizer steps, recent mean reward {:?} ({})",
            history.episodes(),
            optimizer_steps,
            recent_mean,
            if accepted { "accepted" } else { "not accepted" }
        );

        let mut saved = false;
        if config.mode == RunMode::Train && accepted {
            match (&config.model_dir, descriptor) {
                (Some(dir), Some(descriptor)) => {
                    let descriptor = descriptor.with_progress(optimizer_steps, history.episodes());
                    ModelStore::new(dir).save::<B, M>(&server_outcome.model, &descriptor)?;
                    saved = true;
                }
                (Some(dir), None) => log::warn!(
                    "not saving to {}: no model descriptor configured",
                    dir.display()
                ),
                (None, _) => {}
            }
        }

        Ok(TrainingOutcome {
            model: server_outcome.model,
            history,
            optimizer_steps,
            elapsed: started.elapsed(),
            recent_mean,
            accepted,
            saved,
        })
    }
}
