//! Global training progress: episode count and smoothed reward.
//!
//! The coordinator is the only writer. It holds the single
//! [`ProgressWriter`] and updates it for every reward it drains. Workers hold
//! cloneable [`ProgressReader`]s and only ever observe published values,
//! which may lag behind their own most recent episode.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Running reward update.
///
/// First episode: `running = reward`. Afterwards:
/// `running = smoothing * running + (1 - smoothing) * reward`.
pub fn smoothed_update(previous: Option<f64>, reward: f64, smoothing: f64) -> f64 {
    match previous {
        None => reward,
        Some(running) => smoothing * running + (1.0 - smoothing) * reward,
    }
}

#[derive(Debug)]
struct ProgressState {
    episodes: AtomicUsize,
    /// `f64` bit pattern of the smoothed reward.
    smoothed_bits: AtomicU64,
    has_reward: AtomicBool,
}

/// Values published after one recorded episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Global episode number (1-based).
    pub episode: usize,
    pub smoothed_reward: f64,
}

/// Exclusive write access to the progress state. Not cloneable.
#[derive(Debug)]
pub struct ProgressWriter {
    state: Arc<ProgressState>,
    smoothing: f64,
}

impl ProgressWriter {
    /// Count one finished episode and fold its reward into the running value.
    pub fn record_episode(&mut self, reward: f32) -> ProgressUpdate {
        let previous = self.state.has_reward.load(Ordering::Acquire).then(|| {
            f64::from_bits(self.state.smoothed_bits.load(Ordering::Acquire))
        });
        let smoothed = smoothed_update(previous, reward as f64, self.smoothing);

        self.state
            .smoothed_bits
            .store(smoothed.to_bits(), Ordering::Release);
        self.state.has_reward.store(true, Ordering::Release);
        let episode = self.state.episodes.fetch_add(1, Ordering::AcqRel) + 1;

        ProgressUpdate {
            episode,
            smoothed_reward: smoothed,
        }
    }

    pub fn reader(&self) -> ProgressReader {
        ProgressReader {
            state: Arc::clone(&self.state),
        }
    }
}

/// Read-only view shared with workers.
#[derive(Debug, Clone)]
pub struct ProgressReader {
    state: Arc<ProgressState>,
}

impl ProgressReader {
    /// Episodes recorded by the coordinator so far.
    pub fn episodes(&self) -> usize {
        self.state.episodes.load(Ordering::Acquire)
    }

    /// Current smoothed reward, `None` before the first episode.
    pub fn smoothed_reward(&self) -> Option<f64> {
        if self.state.has_reward.load(Ordering::Acquire) {
            Some(f64::from_bits(self.state.smoothed_bits.load(Ordering::Acquire)))
        } else {
            None
        }
    }
}

/// Create the progress state with its single writer.
pub fn training_progress(smoothing: f64) -> ProgressWriter {
    ProgressWriter {
        state: Arc::new(ProgressState {
            episodes: AtomicUsize::new(0),
            smoothed_bits: AtomicU64::new(0f64.to_bits()),
            has_reward: AtomicBool::new(false),
        }),
        smoothing,
    }
}
