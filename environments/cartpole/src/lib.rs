//! Scalar cart-pole environment.
//!
//! One pole balanced on a cart, driven by a left/right force. The physics are
//! the classic control formulation (Euler integration, 0.02s tick). Each
//! instance owns its own seeded generator so that actor threads can run fully
//! independent copies.
//!
//! ```text
//! observation = [x, x_dot, theta, theta_dot]
//! actions     = 0 (push left), 1 (push right)
//! reward      = 1.0 per step, including the terminating one
//! ```
//!
//! By default the environment is *unwrapped*: there is no step limit, the
//! episode only ends when the pole falls or the cart leaves the track. A limit
//! can be set with [`CartPole::with_max_steps`].

mod rng;

use rand::SeedableRng;
use rng::{random_uniform, Xoshiro256StarStar};

const GRAVITY: f32 = 9.8;
const CART_MASS: f32 = 1.0;
const POLE_MASS: f32 = 0.1;
const POLE_LENGTH: f32 = 0.5;
const FORCE_MAG: f32 = 10.0;
const DT: f32 = 0.02;
const X_THRESHOLD: f32 = 2.4;
const THETA_THRESHOLD: f32 = 12.0 * std::f32::consts::PI / 180.0;
const INIT_RANGE: f32 = 0.05;

/// Dimension of the observation vector.
pub const OBS_SIZE: usize = 4;
/// Number of discrete actions.
pub const N_ACTIONS: usize = 2;

/// Result of a single [`CartPole::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartPoleStep {
    pub observation: [f32; OBS_SIZE],
    pub reward: f32,
    /// Pole fell or cart left the track.
    pub terminated: bool,
    /// Step limit reached (never set when unwrapped).
    pub truncated: bool,
}

impl CartPoleStep {
    /// Episode is over for either reason.
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Single cart-pole instance.
#[derive(Debug, Clone)]
pub struct CartPole {
    x: f32,
    x_dot: f32,
    theta: f32,
    theta_dot: f32,
    ticks: u32,
    max_steps: Option<u32>,
    rng: Xoshiro256StarStar,
}

impl CartPole {
    /// Create an unwrapped cart-pole seeded with `seed`.
    ///
    /// The state is zeroed until the first [`reset`](Self::reset).
    pub fn new(seed: u64) -> Self {
        Self {
            x: 0.0,
            x_dot: 0.0,
            theta: 0.0,
            theta_dot: 0.0,
            ticks: 0,
            max_steps: None,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
        }
    }

    /// Truncate episodes after `max_steps` ticks.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Reset to a random state near upright and return the observation.
    pub fn reset(&mut self) -> [f32; OBS_SIZE] {
        self.x = random_uniform(&mut self.rng, -INIT_RANGE, INIT_RANGE);
        self.x_dot = random_uniform(&mut self.rng, -INIT_RANGE, INIT_RANGE);
        self.theta = random_uniform(&mut self.rng, -INIT_RANGE, INIT_RANGE);
        self.theta_dot = random_uniform(&mut self.rng, -INIT_RANGE, INIT_RANGE);
        self.ticks = 0;
        self.observation()
    }

    /// Advance one tick. Any action other than 1 pushes left.
    pub fn step(&mut self, action: usize) -> CartPoleStep {
        let force = if action == 1 { FORCE_MAG } else { -FORCE_MAG };

        let cos_theta = self.theta.cos();
        let sin_theta = self.theta.sin();

        let total_mass = CART_MASS + POLE_MASS;
        let pole_mass_length = POLE_MASS * POLE_LENGTH;

        let temp = (force + pole_mass_length * self.theta_dot * self.theta_dot * sin_theta)
            / total_mass;
        let denom = POLE_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / total_mass);
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp) / denom.max(1e-6);
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        self.x += DT * self.x_dot;
        self.x_dot += DT * x_acc;
        self.theta += DT * self.theta_dot;
        self.theta_dot += DT * theta_acc;
        self.ticks += 1;

        let terminated = self.x.abs() > X_THRESHOLD || self.theta.abs() > THETA_THRESHOLD;
        let truncated = self.max_steps.is_some_and(|max| self.ticks >= max);

        CartPoleStep {
            observation: self.observation(),
            reward: 1.0,
            terminated,
            truncated,
        }
    }

    /// Current observation.
    pub fn observation(&self) -> [f32; OBS_SIZE] {
        [self.x, self.x_dot, self.theta, self.theta_dot]
    }

    /// Ticks since the last reset.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// One-line ASCII picture of the track, cart and pole lean.
    pub fn render_ascii(&self) -> String {
        const WIDTH: usize = 41;
        let span = 2.0 * X_THRESHOLD;
        let pos = ((self.x + X_THRESHOLD) / span * (WIDTH - 1) as f32)
            .round()
            .clamp(0.0, (WIDTH - 1) as f32) as usize;

        let pole = if self.theta > 0.05 {
            '/'
        } else if self.theta < -0.05 {
            '\\'
        } else {
            '|'
        };

        let track: String = (0..WIDTH)
            .map(|i| if i == pos { pole } else { '-' })
            .collect();
        format!(
            "[{}] t={:<5} x={:+.3} theta={:+.3}",
            track, self.ticks, self.x, self.theta
        )
    }
}
