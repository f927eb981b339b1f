//! Per-worker rollout segment buffer.
//!
//! Holds the `(state, action, reward)` tuples collected between two
//! synchronization points. Insertion order is preserved and the buffer is
//! cleared right after every push-and-pull, so it never holds more than one
//! segment.

/// Ordered rollout segment owned by a single worker.
#[derive(Debug, Clone)]
pub struct TrajectoryBuffer {
    obs_size: usize,
    capacity: usize,
    /// Row-major `[len, obs_size]`.
    states: Vec<f32>,
    actions: Vec<usize>,
    rewards: Vec<f32>,
}

impl TrajectoryBuffer {
    /// Create a buffer for `capacity` transitions of `obs_size`-dim states.
    pub fn new(obs_size: usize, capacity: usize) -> Self {
        Self {
            obs_size,
            capacity,
            states: Vec::with_capacity(obs_size * capacity),
            actions: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
        }
    }

    /// Append one transition.
    ///
    /// # Panics
    ///
    /// If `state.len()` differs from the configured observation size.
    pub fn push(&mut self, state: &[f32], action: usize, reward: f32) {
        assert_eq!(
            state.len(),
            self.obs_size,
            "state has {} elements, buffer expects {}",
            state.len(),
            self.obs_size
        );
        self.states.extend_from_slice(state);
        self.actions.push(action);
        self.rewards.push(reward);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Segment reached the sync interval.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn obs_size(&self) -> usize {
        self.obs_size
    }

    /// All states, row-major.
    pub fn states(&self) -> &[f32] {
        &self.states
    }

    pub fn actions(&self) -> &[usize] {
        &self.actions
    }

    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// Drop every transition, keeping the allocation.
    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
    }
}
