//! Worker loop tests with a single worker and a live coordinator-side drain.

use burn::backend::{Autodiff, NdArray};

use super::*;
use crate::config::{A3CConfig, RunMode};
use crate::environment::testing::ScriptedEnv;
use crate::messages::{FinishReason, MetricsChannels};
use crate::metrics::{training_progress, MetricsAggregator, MetricsHistory, MultiLogger};
use crate::nn::{ActorCriticConfig, ActorCriticNet};
use crate::optim::SharedAdam;
use crate::sync::ParameterServer;

type TestBackend = Autodiff<NdArray<f32>>;
type Net = ActorCriticNet<TestBackend>;

struct SingleRun {
    joined: std::thread::Result<Result<FinishReason, WorkerError>>,
    history: MetricsHistory,
    /// Optimizer steps applied by the server.
    pushes: u64,
}

fn run_single(config: A3CConfig, env: ScriptedEnv, stop_signal: StopSignal) -> SingleRun {
    run_single_after(config, env, stop_signal, &[])
}

/// Like [`run_single`], with `prior` episode rewards already published.
fn run_single_after(
    config: A3CConfig,
    env: ScriptedEnv,
    stop_signal: StopSignal,
    prior: &[f32],
) -> SingleRun {
    let device = Default::default();
    let architecture = ActorCriticConfig::new(4, 2);
    let model = architecture.init::<TestBackend>(&device);
    let server = ParameterServer::spawn(model, SharedAdam::new(config.optimizer.clone())).unwrap();

    let channels = MetricsChannels::new();
    let mut writer = training_progress(config.reward_smoothing);
    for &reward in prior {
        writer.record_episode(reward);
    }
    let worker = Worker::<TestBackend, Net, ScriptedEnv>::new(
        WorkerSettings::from_config(&config, 0),
        env,
        architecture.init::<TestBackend>(&device),
        server.client(0),
        channels.sender(0),
        writer.reader(),
        stop_signal,
        device,
    );
    let handle = worker.spawn().unwrap();

    let history =
        MetricsAggregator::new(1, writer, Box::new(MultiLogger::new())).drain(channels.into_receiver());
    let joined = handle.join();
    let pushes = server.slot().version();
    server.shutdown().unwrap();

    SingleRun {
        joined,
        history,
        pushes,
    }
}

/// Converges after its first episode.
fn one_episode_config() -> A3CConfig {
    A3CConfig::new()
        .with_n_workers(1)
        .with_stop_threshold(0.0)
        .with_stop_window(1)
}

#[test]
fn test_sync_points_per_episode() {
    // Pushes at steps 2, 4 and on the terminal step 5.
    let run = run_single(
        one_episode_config().with_sync_interval(2),
        ScriptedEnv::new(5),
        StopSignal::new(),
    );

    assert_eq!(run.joined.unwrap(), Ok(FinishReason::Converged));
    assert_eq!(run.pushes, 3);
    // 1 + 1 + 1 + 1 - 1
    assert_eq!(run.history.rewards, vec![3.0]);
    assert_eq!(run.history.finished[&0], FinishReason::Converged);
}

#[test]
fn test_terminal_penalty_can_be_disabled() {
    let run = run_single(
        one_episode_config().with_terminal_penalty(None),
        ScriptedEnv::new(3),
        StopSignal::new(),
    );
    assert_eq!(run.history.rewards, vec![3.0]);
    assert_eq!(run.pushes, 1);
}

#[test]
fn test_truncated_episode_keeps_its_reward() {
    let mut env = ScriptedEnv::new(3);
    env.truncate = true;
    let run = run_single(one_episode_config(), env, StopSignal::new());

    assert_eq!(run.joined.unwrap(), Ok(FinishReason::Converged));
    // No terminal penalty on the last step.
    assert_eq!(run.history.rewards, vec![3.0]);
    assert_eq!(run.pushes, 1);
}

#[test]
fn test_reward_cap_ends_episode() {
    let run = run_single(
        one_episode_config().with_reward_cap(4.0),
        ScriptedEnv::new(10),
        StopSignal::new(),
    );
    assert_eq!(run.history.rewards, vec![4.0]);
    assert_eq!(run.pushes, 1);
}

#[test]
fn test_episode_budget_completes_worker() {
    let config = A3CConfig::new()
        .with_n_workers(1)
        .with_max_episodes(3)
        .with_stop_threshold(1.0e9)
        .with_stop_window(1);
    let run = run_single(config, ScriptedEnv::new(4), StopSignal::new());

    assert_eq!(run.joined.unwrap(), Ok(FinishReason::Completed));
    // Progress is published asynchronously, so the worker may overshoot.
    assert!(run.history.episodes() >= 3);
    assert_eq!(run.history.durations.len(), run.history.episodes());
    assert_eq!(run.history.actions.len(), run.history.episodes());
}

#[test]
fn test_score_includes_own_episode() {
    // Published smoothed reward is 100. Folding in this worker's reward of 2
    // gives 0.99 * 100 + 0.01 * 2 = 99.02, which scores 99 and stays below
    // the threshold; the published value alone would have converged.
    let config = A3CConfig::new()
        .with_n_workers(1)
        .with_max_episodes(3)
        .with_stop_threshold(99.5)
        .with_stop_window(1);
    let run = run_single_after(config, ScriptedEnv::new(4), StopSignal::new(), &[100.0]);

    assert_eq!(run.joined.unwrap(), Ok(FinishReason::Completed));
    assert_eq!(run.history.rewards[0], 2.0);
}

#[test]
fn test_evaluation_mode_never_pushes() {
    let config = A3CConfig::new()
        .with_mode(RunMode::Evaluate)
        .with_eval_window(2)
        .with_stop_threshold(0.0);
    let run = run_single(config, ScriptedEnv::new(6), StopSignal::new());

    assert_eq!(run.joined.unwrap(), Ok(FinishReason::Converged));
    assert_eq!(run.history.episodes(), 2);
    assert_eq!(run.pushes, 0);
}

#[test]
fn test_raised_stop_signal_stops_before_first_episode() {
    let signal = StopSignal::new();
    signal.raise();
    let run = run_single(one_episode_config(), ScriptedEnv::new(5), signal);

    assert_eq!(run.joined.unwrap(), Ok(FinishReason::Stopped));
    assert!(run.history.rewards.is_empty());
    assert_eq!(run.history.finished[&0], FinishReason::Stopped);
}

#[test]
fn test_environment_failure_still_terminates() {
    let mut env = ScriptedEnv::new(5);
    env.fail_at = Some(3);
    let run = run_single(one_episode_config(), env, StopSignal::new());

    assert!(matches!(run.joined.unwrap(), Err(WorkerError::Env(_))));
    assert!(run.history.rewards.is_empty());
    assert!(run.history.finished[&0].is_failure());
}

#[test]
fn test_panic_still_terminates() {
    let mut env = ScriptedEnv::new(5);
    env.panic_at = Some(2);
    let run = run_single(one_episode_config(), env, StopSignal::new());

    assert!(run.joined.is_err());
    assert!(matches!(run.history.finished[&0], FinishReason::Panicked(_)));
}

#[test]
fn test_settings_from_config() {
    let config = A3CConfig::new()
        .with_n_workers(4)
        .with_seed(10)
        .with_demo_worker(Some(2));
    let settings = WorkerSettings::from_config(&config, 2);
    assert_eq!(settings.seed, 12);
    assert!(settings.render);
    assert_eq!(settings.stop.window, 4);
    assert!(!WorkerSettings::from_config(&config, 0).render);
}
