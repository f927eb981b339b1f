//! Convergence checks evaluated by each worker after every episode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-worker stop rule over the worker's own score history.
///
/// Met when the mean of the last `min(window, len)` scores reaches
/// `threshold` and at least `window` episodes have been completed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopCondition {
    pub threshold: f32,
    pub window: usize,
}

impl StopCondition {
    pub fn new(threshold: f32, window: usize) -> Self {
        Self { threshold, window }
    }

    pub fn is_met(&self, scores: &[i64], episodes_completed: usize) -> bool {
        if scores.is_empty() || episodes_completed < self.window {
            return false;
        }
        let n = self.window.min(scores.len()).max(1);
        let tail = &scores[scores.len() - n..];
        let mean = tail.iter().sum::<i64>() as f64 / n as f64;
        mean >= self.threshold as f64
    }
}

/// Shared flag raised by the first converged worker under
/// [`StopPolicy::Global`](crate::config::StopPolicy::Global).
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
