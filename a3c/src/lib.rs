//! # A3C: Asynchronous Advantage Actor-Critic
//!
//! Several worker threads each play their own copy of an environment with a
//! local copy of a policy/value network. Every few steps a worker computes the
//! gradient of its rollout segment, pushes it to a parameter server that owns
//! the shared network and its Adam state, and pulls the updated network back.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Worker 0          Worker 1          Worker N                    │
//! │  ┌────────┐        ┌────────┐        ┌────────┐                  │
//! │  │ env    │        │ env    │        │ env    │                  │
//! │  │ local  │        │ local  │        │ local  │                  │
//! │  │ buffer │        │ buffer │        │ buffer │                  │
//! │  └─┬───▲──┘        └─┬───▲──┘        └─┬───▲──┘                  │
//! │    │   │ pull        │   │             │   │                     │
//! │    │ push            │   │             │   │                     │
//! │    ▼   │             ▼   │             ▼   │                     │
//! │  ┌─────┴──────────────────────────────────────┐                  │
//! │  │ Parameter server: SharedAdam + shared net  │──► ModelSlot     │
//! │  └────────────────────────────────────────────┘                  │
//! │                                                                  │
//! │  reward / duration / action envelopes ──► Coordinator            │
//! │  (sole writer of TrainingProgress)                               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use a3c::{A3CConfig, ActorCriticConfig, CartPoleEnv, Coordinator, ModelDescriptor};
//!
//! let config = A3CConfig::new()
//!     .with_n_workers(8)
//!     .with_gamma(0.9)
//!     .with_model_dir("models/cartpole");
//!
//! let architecture = ActorCriticConfig::new(4, 2);
//! let outcome = Coordinator::<B, _>::new(config)
//!     .with_descriptor(ModelDescriptor::new(CartPoleEnv::NAME, architecture))
//!     .run(
//!         |device| architecture.init(device),
//!         architecture.init(&device),
//!         |id| CartPoleEnv::new(id as u64),
//!     )?;
//! ```

pub mod actors;
pub mod algorithms;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod environment;
pub mod messages;
pub mod metrics;
pub mod nn;
pub mod optim;
pub mod runners;
pub mod sync;

pub use config::{A3CConfig, AdvantageKind, ConfigError, RunMode, StopPolicy};
pub use environment::{CartPoleEnv, EnvError, EnvStep, Environment, StepInfo};

pub use core::model_slot::{
    decode_weights, encode_weights, model_slot, ModelSlot, SharedModelSlot,
};
pub use core::trajectory::TrajectoryBuffer;

pub use messages::{FinishReason, MetricEnvelope, MetricPayload, MetricsChannels};

pub use nn::{ActorCriticConfig, ActorCriticNet, ModelError, PolicyValueModel};
pub use optim::{SharedAdam, SharedAdamConfig};

pub use actors::{StopCondition, StopSignal, Worker, WorkerError};
pub use sync::{push_and_pull, ParameterServer, SyncClient, SyncError};

pub use checkpoint::{CheckpointError, ModelDescriptor, ModelStore};
pub use metrics::{
    ConsoleLogger, CsvLogger, HistoryError, HistoryKey, MetricsHistory, MetricsLogger,
    MultiLogger, ProgressReader,
};

pub use runners::{Coordinator, CoordinatorError, TrainingOutcome};
