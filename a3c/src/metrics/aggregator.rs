//! Coordinator-side draining of the metrics channels.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::messages::{FinishReason, MetricEnvelope, MetricPayload, MetricsReceiver};

use super::logger::{EpisodeSnapshot, MetricsLogger};
use super::progress::ProgressWriter;

/// Everything read from one metrics channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDrain<T> {
    /// Values in arrival order, with the sending worker.
    pub values: Vec<(usize, T)>,
    /// First termination reason seen per worker.
    pub terminated: BTreeMap<usize, FinishReason>,
    /// Every sender was dropped before all terminations arrived.
    pub disconnected: bool,
}

/// Read `rx` until `n_workers` distinct workers have terminated or every
/// sender is gone. `on_value` sees each value as it arrives.
///
/// A repeated termination from the same worker is counted once.
pub fn drain_channel<T>(
    rx: &Receiver<MetricEnvelope<T>>,
    n_workers: usize,
    mut on_value: impl FnMut(usize, &T),
) -> ChannelDrain<T> {
    let mut drain = ChannelDrain {
        values: Vec::new(),
        terminated: BTreeMap::new(),
        disconnected: false,
    };

    while drain.terminated.len() < n_workers {
        let Ok(envelope) = rx.recv() else {
            drain.disconnected = true;
            break;
        };
        match envelope.payload {
            MetricPayload::Value(value) => {
                on_value(envelope.worker_id, &value);
                drain.values.push((envelope.worker_id, value));
            }
            MetricPayload::Terminated(reason) => {
                drain.terminated.entry(envelope.worker_id).or_insert(reason);
            }
        }
    }

    drain
}

/// Histories collected over one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsHistory {
    /// Episode rewards in the order the coordinator received them.
    pub rewards: Vec<f32>,
    pub durations: Vec<Duration>,
    /// Last action of each episode.
    pub actions: Vec<usize>,
    /// Termination reason per worker id.
    pub finished: BTreeMap<usize, FinishReason>,
}

impl MetricsHistory {
    /// Mean of the most recent `n` rewards, `None` if there are none.
    pub fn recent_mean(&self, n: usize) -> Option<f32> {
        let n = n.min(self.rewards.len());
        if n == 0 {
            return None;
        }
        let tail = &self.rewards[self.rewards.len() - n..];
        Some(tail.iter().sum::<f32>() / n as f32)
    }

    pub fn episodes(&self) -> usize {
        self.rewards.len()
    }

    /// 95% interval of the mean last action over all episodes.
    pub fn action_interval(&self) -> Option<ConfidenceInterval> {
        let actions: Vec<f64> = self.actions.iter().map(|&a| a as f64).collect();
        ConfidenceInterval::normal_95(&actions)
    }
}

/// `mean ± half_width` under a normal approximation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub half_width: f64,
    pub samples: usize,
}

impl ConfidenceInterval {
    const Z_95: f64 = 1.96;

    /// Uses the sample standard deviation; a single sample has zero width.
    pub fn normal_95(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n == 0 {
            return None;
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let half_width = if n > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            Self::Z_95 * (var / n as f64).sqrt()
        } else {
            0.0
        };
        Some(Self {
            mean,
            half_width,
            samples: n,
        })
    }

    pub fn low(&self) -> f64 {
        self.mean - self.half_width
    }

    pub fn high(&self) -> f64 {
        self.mean + self.half_width
    }
}

/// Drains all three channels, keeps [`TrainingProgress`](super::ProgressReader)
/// current and feeds the logger.
pub struct MetricsAggregator {
    n_workers: usize,
    progress: ProgressWriter,
    logger: Box<dyn MetricsLogger>,
    started: Instant,
}

impl MetricsAggregator {
    pub fn new(n_workers: usize, progress: ProgressWriter, logger: Box<dyn MetricsLogger>) -> Self {
        Self {
            n_workers,
            progress,
            logger,
            started: Instant::now(),
        }
    }

    /// Block until every worker has terminated on every channel.
    ///
    /// Rewards are drained first since they drive the progress state that
    /// workers poll. Durations and actions are read afterwards.
    pub fn drain(mut self, receiver: MetricsReceiver) -> MetricsHistory {
        let progress = &mut self.progress;
        let logger = &mut self.logger;
        let started = self.started;

        let rewards = drain_channel(&receiver.rewards, self.n_workers, |worker_id, &reward| {
            let update = progress.record_episode(reward);
            logger.log(&EpisodeSnapshot {
                episode: update.episode,
                worker_id,
                reward,
                smoothed_reward: update.smoothed_reward,
                elapsed: started.elapsed(),
            });
        });
        self.logger.flush();

        let durations = drain_channel(&receiver.durations, self.n_workers, |_, _| {});
        let actions = drain_channel(&receiver.actions, self.n_workers, |_, _| {});

        if rewards.disconnected || durations.disconnected || actions.disconnected {
            log::warn!(
                "metrics channels closed with {}/{} workers terminated",
                rewards.terminated.len(),
                self.n_workers
            );
        }

        MetricsHistory {
            rewards: rewards.values.into_iter().map(|(_, r)| r).collect(),
            durations: durations.values.into_iter().map(|(_, d)| d).collect(),
            actions: actions.values.into_iter().map(|(_, a)| a).collect(),
            finished: rewards.terminated,
        }
    }
}
