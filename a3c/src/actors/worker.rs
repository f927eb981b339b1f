//! Worker thread: the episode loop.
//!
//! Each worker owns one environment and a local copy of the policy/value
//! model, built on its own thread from the shared snapshot bytes. It acts
//! with an inference copy of the local model (no autodiff graph), buffers
//! transitions, and at every sync point pushes the segment's gradient to the
//! parameter server and pulls the latest shared weights back. Episode metrics go to the coordinator over
//! the metrics channels; the worker never writes global progress itself.

use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::thread::JoinHandle;
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;

use crate::config::{A3CConfig, RunMode, StopPolicy};
use crate::core::TrajectoryBuffer;
use crate::environment::{EnvError, Environment};
use crate::messages::{FinishReason, MetricsSender};
use crate::metrics::{smoothed_update, ProgressReader};
use crate::nn::{choose_action, ModelError, PolicyValueModel};
use crate::sync::{push_and_pull, SyncClient, SyncError, SyncSettings};

use super::stop_condition::{StopCondition, StopSignal};

/// Fault that ends a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerError {
    Env(EnvError),
    Sync(SyncError),
    Model(ModelError),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Env(e) => write!(f, "environment: {}", e),
            WorkerError::Sync(e) => write!(f, "sync: {}", e),
            WorkerError::Model(e) => write!(f, "model: {}", e),
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<EnvError> for WorkerError {
    fn from(e: EnvError) -> Self {
        WorkerError::Env(e)
    }
}

impl From<SyncError> for WorkerError {
    fn from(e: SyncError) -> Self {
        WorkerError::Sync(e)
    }
}

impl From<ModelError> for WorkerError {
    fn from(e: ModelError) -> Self {
        WorkerError::Model(e)
    }
}

/// Per-worker view of the run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub worker_id: usize,
    /// Seed for action sampling.
    pub seed: u64,
    pub mode: RunMode,
    pub sync: SyncSettings,
    pub sync_interval: usize,
    pub terminal_penalty: Option<f32>,
    pub reward_cap: f32,
    pub max_episodes: usize,
    /// Smoothing factor used to score each finished episode.
    pub reward_smoothing: f64,
    pub stop: StopCondition,
    pub stop_policy: StopPolicy,
    /// Render the environment every step.
    pub render: bool,
}

impl WorkerSettings {
    pub fn from_config(config: &A3CConfig, worker_id: usize) -> Self {
        Self {
            worker_id,
            seed: config.seed.wrapping_add(worker_id as u64),
            mode: config.mode,
            sync: SyncSettings {
                gamma: config.gamma,
                advantage: config.advantage,
            },
            sync_interval: config.sync_interval,
            terminal_penalty: config.terminal_penalty,
            reward_cap: config.reward_cap,
            max_episodes: config.max_episodes,
            reward_smoothing: config.reward_smoothing,
            stop: StopCondition::new(config.stop_threshold, config.effective_stop_window()),
            stop_policy: config.stop_policy,
            render: config.demo_worker == Some(worker_id),
        }
    }
}

/// Sends the worker's termination on every exit path, panics included.
struct TerminationGuard {
    metrics: MetricsSender,
    reason: Option<FinishReason>,
}

impl TerminationGuard {
    fn new(metrics: MetricsSender) -> Self {
        Self {
            metrics,
            reason: None,
        }
    }

    fn finish(&mut self, reason: FinishReason) {
        self.reason = Some(reason);
    }
}

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        let reason = self.reason.take().unwrap_or_else(|| {
            if std::thread::panicking() {
                FinishReason::Panicked(format!("worker {} panicked", self.metrics.worker_id()))
            } else {
                FinishReason::Failed("worker exited without a finish reason".to_string())
            }
        });
        self.metrics.send_terminated(reason);
    }
}

/// Handle to a spawned worker thread.
pub struct WorkerHandle {
    pub worker_id: usize,
    thread: JoinHandle<Result<FinishReason, WorkerError>>,
}

impl WorkerHandle {
    pub fn join(self) -> std::thread::Result<Result<FinishReason, WorkerError>> {
        self.thread.join()
    }
}

/// One asynchronous actor-learner.
pub struct Worker<B: AutodiffBackend, M, E> {
    settings: WorkerSettings,
    env: E,
    /// Receives the shared weights when the thread starts.
    template: M,
    client: SyncClient,
    metrics: MetricsSender,
    progress: ProgressReader,
    stop_signal: StopSignal,
    device: B::Device,
    _backend: PhantomData<B>,
}

impl<B, M, E> Worker<B, M, E>
where
    B: AutodiffBackend,
    M: PolicyValueModel<B> + AutodiffModule<B> + 'static,
    M::InnerModule: PolicyValueModel<B::InnerBackend>,
    E: Environment + 'static,
{
    /// Create a worker around a freshly built `template` model.
    ///
    /// The template's own weights are never used: the thread loads the
    /// current shared snapshot into it before the first episode.
    pub fn new(
        settings: WorkerSettings,
        env: E,
        template: M,
        client: SyncClient,
        metrics: MetricsSender,
        progress: ProgressReader,
        stop_signal: StopSignal,
        device: B::Device,
    ) -> Self {
        Self {
            settings,
            env,
            template,
            client,
            metrics,
            progress,
            stop_signal,
            device,
            _backend: PhantomData,
        }
    }

    /// Run on a thread named `a3c-worker-{id}`.
    pub fn spawn(self) -> io::Result<WorkerHandle> {
        let worker_id = self.settings.worker_id;
        let thread = std::thread::Builder::new()
            .name(format!("a3c-worker-{}", worker_id))
            .spawn(move || self.run())?;
        Ok(WorkerHandle { worker_id, thread })
    }

    /// Play episodes until the stop condition, the global stop flag or the
    /// episode budget ends the loop.
    ///
    /// Exactly one termination is sent on each metrics channel, whatever the
    /// outcome.
    pub fn run(self) -> Result<FinishReason, WorkerError> {
        let worker_id = self.settings.worker_id;
        let mut guard = TerminationGuard::new(self.metrics.clone());
        fastrand::seed(self.settings.seed);

        let result = self.run_episodes();
        match &result {
            Ok(reason) => {
                log::debug!("worker {} finished: {:?}", worker_id, reason);
                guard.finish(reason.clone());
            }
            Err(e) => {
                log::error!("worker {} failed: {}", worker_id, e);
                guard.finish(FinishReason::Failed(e.to_string()));
            }
        }
        result
    }

    fn run_episodes(self) -> Result<FinishReason, WorkerError> {
        let Self {
            settings,
            mut env,
            template,
            client,
            metrics,
            progress,
            stop_signal,
            device,
            ..
        } = self;

        let (mut local, version) = client.pull::<B, M>(template, &device)?;
        let mut policy = local.valid();
        log::debug!(
            "worker {} loaded shared weights v{}",
            settings.worker_id,
            version
        );

        let mut buffer = TrajectoryBuffer::new(env.obs_size(), settings.sync_interval);
        let mut scores: Vec<i64> = Vec::new();

        loop {
            if stop_signal.is_raised() {
                return Ok(FinishReason::Stopped);
            }
            if progress.episodes() >= settings.max_episodes {
                return Ok(FinishReason::Completed);
            }

            let started = Instant::now();
            let mut state = env.reset()?;
            let mut episode_reward = 0.0f32;
            let mut last_action;
            buffer.clear();

            loop {
                if settings.render {
                    env.render();
                }

                let action =
                    choose_action::<B::InnerBackend, M::InnerModule>(&policy, &state, &device)?;
                let step = env.step(action)?;
                last_action = action;

                let terminated = step.done && !step.info.truncated;
                let reward = match settings.terminal_penalty {
                    Some(penalty) if terminated => penalty,
                    _ => step.reward,
                };
                episode_reward += reward;
                buffer.push(&state, action, reward);

                let capped = episode_reward >= settings.reward_cap;
                if buffer.is_full() || step.done || capped {
                    if settings.mode == RunMode::Train {
                        let (shared, report) = push_and_pull::<B, M>(
                            &client,
                            local,
                            &buffer,
                            terminated,
                            &step.state,
                            settings.sync,
                            &device,
                        )?;
                        local = shared;
                        policy = local.valid();
                        log::trace!(
                            "worker {} step {} | value_loss {:.4} | policy_loss {:.4}",
                            settings.worker_id,
                            report.step,
                            report.value_loss,
                            report.policy_loss
                        );
                    }
                    buffer.clear();
                }

                state = step.state;
                if step.done || capped {
                    break;
                }
            }

            metrics.send_episode(episode_reward, started.elapsed(), last_action);

            // The published value does not include this episode yet.
            let smoothed = smoothed_update(
                progress.smoothed_reward(),
                episode_reward as f64,
                settings.reward_smoothing,
            );
            scores.push(smoothed as i64);

            let completed = progress.episodes().max(scores.len());
            if settings.stop.is_met(&scores, completed) {
                log::info!(
                    "worker {} converged after {} episodes (score {})",
                    settings.worker_id,
                    scores.len(),
                    smoothed as i64
                );
                if settings.stop_policy == StopPolicy::Global {
                    stop_signal.raise();
                }
                return Ok(FinishReason::Converged);
            }
        }
    }
}
