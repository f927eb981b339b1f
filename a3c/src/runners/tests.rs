//! End-to-end runs with deterministic environments.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use burn::backend::{Autodiff, NdArray};
use burn::tensor::backend::Backend;
use tempfile::tempdir;

use super::*;
use crate::checkpoint::{ModelDescriptor, ModelStore};
use crate::config::{A3CConfig, ConfigError, RunMode, StopPolicy};
use crate::environment::testing::ScriptedEnv;
use crate::messages::FinishReason;
use crate::metrics::MultiLogger;
use crate::nn::{ActorCriticConfig, ActorCriticNet};
use crate::optim::flatten_params;

type TestBackend = Autodiff<NdArray<f32>>;
type Net = ActorCriticNet<TestBackend>;

fn architecture() -> ActorCriticConfig {
    ActorCriticConfig::new(4, 2)
}

fn fresh_model(device: &<TestBackend as Backend>::Device) -> Net {
    architecture().init::<TestBackend>(device)
}

fn initial_model() -> Net {
    fresh_model(&Default::default())
}

fn coordinator(config: A3CConfig) -> Coordinator<TestBackend, Net> {
    Coordinator::new(config).with_logger(Box::new(MultiLogger::new()))
}

/// Never converges; ends on the episode budget.
fn budget_config(n_workers: usize, max_episodes: usize) -> A3CConfig {
    A3CConfig::new()
        .with_n_workers(n_workers)
        .with_max_episodes(max_episodes)
        .with_sync_interval(2)
        .with_stop_threshold(1.0e9)
}

#[test]
fn test_budget_run_end_to_end() {
    let outcome = coordinator(budget_config(3, 12))
        .run(fresh_model, initial_model(), |_| ScriptedEnv::new(5))
        .unwrap();

    assert!(outcome.episodes() >= 12);
    assert_eq!(outcome.history.finished.len(), 3);
    assert!(outcome
        .history
        .finished
        .values()
        .all(|reason| *reason == FinishReason::Completed));
    assert_eq!(outcome.failures(), 0);

    // Five-step episodes with a sync interval of two push three times each.
    assert_eq!(outcome.optimizer_steps, 3 * outcome.episodes() as u64);
    assert!(outcome.history.rewards.iter().all(|&r| r == 3.0));
    assert_eq!(outcome.recent_mean, Some(3.0));

    // Default save threshold is out of reach.
    assert!(!outcome.accepted);
    assert!(!outcome.saved);
}

#[test]
fn test_multi_worker_runs_finish_under_watchdog() {
    for round in 0..5 {
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            let outcome = coordinator(budget_config(3, 12))
                .run(fresh_model, initial_model(), |_| ScriptedEnv::new(5));
            let _ = done_tx.send(outcome.map(|o| (o.episodes(), o.failures())));
        });

        let (episodes, failures) = done_rx
            .recv_timeout(Duration::from_secs(60))
            .unwrap_or_else(|_| panic!("round {}: 3-worker run did not finish", round))
            .unwrap();
        assert!(episodes >= 12);
        assert_eq!(failures, 0);
    }
}

#[test]
fn test_accepted_model_is_saved() {
    let dir = tempdir().unwrap();
    let config = budget_config(2, 4)
        .with_save_threshold(0.0)
        .with_model_dir(dir.path().join("model"));

    let outcome = coordinator(config)
        .with_descriptor(ModelDescriptor::new("Scripted", architecture()))
        .run(fresh_model, initial_model(), |_| ScriptedEnv::new(5))
        .unwrap();

    assert!(outcome.accepted);
    assert!(outcome.saved);

    let store = ModelStore::new(dir.path().join("model"));
    let (loaded, descriptor) = store.load::<TestBackend>(&Default::default()).unwrap();
    assert_eq!(descriptor.optimizer_steps, outcome.optimizer_steps);
    assert_eq!(descriptor.episodes, outcome.episodes());
    assert_eq!(
        flatten_params(&loaded).unwrap(),
        flatten_params(&outcome.model).unwrap()
    );
}

#[test]
fn test_accepted_without_descriptor_is_not_saved() {
    let dir = tempdir().unwrap();
    let config = budget_config(1, 2)
        .with_save_threshold(0.0)
        .with_model_dir(dir.path().join("model"));

    let outcome = coordinator(config)
        .run(fresh_model, initial_model(), |_| ScriptedEnv::new(3))
        .unwrap();
    assert!(outcome.accepted);
    assert!(!outcome.saved);
    assert!(!ModelStore::new(dir.path().join("model")).exists());
}

#[test]
fn test_evaluation_run_uses_one_worker_and_no_updates() {
    let dir = tempdir().unwrap();
    let config = A3CConfig::new()
        .with_n_workers(4)
        .with_mode(RunMode::Evaluate)
        .with_eval_window(3)
        .with_stop_threshold(0.0)
        .with_save_threshold(0.0)
        .with_model_dir(dir.path());

    let model = initial_model();
    let before = flatten_params(&model).unwrap();
    let outcome = coordinator(config)
        .with_descriptor(ModelDescriptor::new("Scripted", architecture()))
        .run(fresh_model, model, |_| ScriptedEnv::new(4))
        .unwrap();

    assert_eq!(outcome.history.finished.len(), 1);
    assert_eq!(outcome.history.finished[&0], FinishReason::Converged);
    assert_eq!(outcome.episodes(), 3);
    assert_eq!(outcome.optimizer_steps, 0);
    assert_eq!(flatten_params(&outcome.model).unwrap(), before);
    assert!(outcome.accepted);
    assert!(!outcome.saved);
}

#[test]
fn test_global_stop_policy() {
    let config = A3CConfig::new()
        .with_n_workers(3)
        .with_stop_threshold(0.0)
        .with_stop_window(1)
        .with_stop_policy(StopPolicy::Global);

    let outcome = coordinator(config)
        .run(fresh_model, initial_model(), |_| ScriptedEnv::new(5))
        .unwrap();

    let reasons: Vec<_> = outcome.history.finished.values().cloned().collect();
    assert_eq!(reasons.len(), 3);
    assert!(reasons.contains(&FinishReason::Converged));
    assert!(reasons
        .iter()
        .all(|r| matches!(r, FinishReason::Converged | FinishReason::Stopped)));
}

#[test]
fn test_failing_worker_does_not_stall_the_run() {
    let outcome = coordinator(budget_config(3, 6))
        .run(fresh_model, initial_model(), |worker_id| {
            let mut env = ScriptedEnv::new(5);
            if worker_id == 1 {
                env.fail_at = Some(2);
            }
            env
        })
        .unwrap();

    assert_eq!(outcome.failures(), 1);
    assert!(outcome.history.finished[&1].is_failure());
    assert_eq!(outcome.history.finished[&0], FinishReason::Completed);
    assert!(outcome.episodes() >= 6);
}

#[test]
fn test_invalid_config_rejected_before_spawning() {
    let result = coordinator(A3CConfig::new().with_n_workers(0))
        .run(fresh_model, initial_model(), |_| ScriptedEnv::new(5));
    assert!(matches!(
        result,
        Err(CoordinatorError::Config(ConfigError::InvalidCount {
            field: "n_workers",
            ..
        }))
    ));
}
