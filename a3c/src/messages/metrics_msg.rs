//! Per-episode metrics sent from workers to the coordinator.
//!
//! Three independent channels carry the episode reward, the episode duration
//! and the last action. Every message is wrapped in a [`MetricEnvelope`] that
//! names its sender, and each worker closes each channel with exactly one
//! [`MetricPayload::Terminated`]. The consumer stops once it has seen a
//! termination from every spawned worker rather than at the first one.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::time::Duration;

/// Reason why a worker finished.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishReason {
    /// The worker's own stop condition was met.
    Converged,
    /// Another worker raised the global stop flag.
    Stopped,
    /// The global episode budget was exhausted.
    Completed,
    /// Environment, model or synchronization fault.
    Failed(String),
    /// The worker thread panicked.
    Panicked(String),
}

impl FinishReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, FinishReason::Failed(_) | FinishReason::Panicked(_))
    }
}

/// Value or end-of-stream marker.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricPayload<T> {
    Value(T),
    Terminated(FinishReason),
}

/// Message on a metrics channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEnvelope<T> {
    pub worker_id: usize,
    pub payload: MetricPayload<T>,
}

impl<T> MetricEnvelope<T> {
    pub fn value(worker_id: usize, value: T) -> Self {
        Self {
            worker_id,
            payload: MetricPayload::Value(value),
        }
    }

    pub fn terminated(worker_id: usize, reason: FinishReason) -> Self {
        Self {
            worker_id,
            payload: MetricPayload::Terminated(reason),
        }
    }
}

pub type RewardMsg = MetricEnvelope<f32>;
pub type DurationMsg = MetricEnvelope<Duration>;
pub type ActionMsg = MetricEnvelope<usize>;

/// A worker's handle on the three metrics channels.
#[derive(Debug, Clone)]
pub struct MetricsSender {
    worker_id: usize,
    reward_tx: Sender<RewardMsg>,
    duration_tx: Sender<DurationMsg>,
    action_tx: Sender<ActionMsg>,
}

impl MetricsSender {
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Report a finished episode on all three channels.
    ///
    /// A closed channel means the coordinator is gone; the report is dropped.
    pub fn send_episode(&self, reward: f32, duration: Duration, last_action: usize) {
        let _ = self.reward_tx.send(MetricEnvelope::value(self.worker_id, reward));
        let _ = self.duration_tx.send(MetricEnvelope::value(self.worker_id, duration));
        let _ = self.action_tx.send(MetricEnvelope::value(self.worker_id, last_action));
    }

    /// Close this worker's stream on all three channels.
    pub fn send_terminated(&self, reason: FinishReason) {
        let _ = self
            .reward_tx
            .send(MetricEnvelope::terminated(self.worker_id, reason.clone()));
        let _ = self
            .duration_tx
            .send(MetricEnvelope::terminated(self.worker_id, reason.clone()));
        let _ = self
            .action_tx
            .send(MetricEnvelope::terminated(self.worker_id, reason));
    }
}

/// Consumer side of the metrics channels.
#[derive(Debug)]
pub struct MetricsReceiver {
    pub rewards: Receiver<RewardMsg>,
    pub durations: Receiver<DurationMsg>,
    pub actions: Receiver<ActionMsg>,
}

/// Channel set created by the coordinator before spawning workers.
#[derive(Debug)]
pub struct MetricsChannels {
    reward_tx: Sender<RewardMsg>,
    duration_tx: Sender<DurationMsg>,
    action_tx: Sender<ActionMsg>,
    receiver: MetricsReceiver,
}

impl MetricsChannels {
    /// Create three unbounded channels.
    pub fn new() -> Self {
        let (reward_tx, rewards) = unbounded();
        let (duration_tx, durations) = unbounded();
        let (action_tx, actions) = unbounded();
        Self {
            reward_tx,
            duration_tx,
            action_tx,
            receiver: MetricsReceiver {
                rewards,
                durations,
                actions,
            },
        }
    }

    /// Sender tagged with `worker_id`.
    pub fn sender(&self, worker_id: usize) -> MetricsSender {
        MetricsSender {
            worker_id,
            reward_tx: self.reward_tx.clone(),
            duration_tx: self.duration_tx.clone(),
            action_tx: self.action_tx.clone(),
        }
    }

    /// Drop the coordinator's own senders and keep the receiving side, so that
    /// the channels disconnect once every worker sender is gone.
    pub fn into_receiver(self) -> MetricsReceiver {
        self.receiver
    }
}

impl Default for MetricsChannels {
    fn default() -> Self {
        Self::new()
    }
}
