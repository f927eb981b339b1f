//! Tests for the parameter server and push-and-pull.

use std::collections::BTreeSet;
use std::thread;

use burn::backend::{Autodiff, NdArray};
use burn::optim::GradientsParams;

use super::*;
use crate::config::AdvantageKind;
use crate::core::TrajectoryBuffer;
use crate::nn::{ActorCriticConfig, ActorCriticNet};
use crate::optim::{flatten_params, SharedAdam, SharedAdamConfig};

type TestBackend = Autodiff<NdArray<f32>>;
type Net = ActorCriticNet<TestBackend>;

fn fresh_model() -> Net {
    ActorCriticConfig::new(4, 2).init::<TestBackend>(&Default::default())
}

fn spawn_server_with(model: Net) -> ParameterServerHandle<TestBackend, Net> {
    ParameterServer::spawn(model, SharedAdam::new(SharedAdamConfig::default())).unwrap()
}

fn spawn_server() -> ParameterServerHandle<TestBackend, Net> {
    spawn_server_with(fresh_model())
}

/// A worker's local model: fresh architecture, shared weights.
fn pull_local(client: &SyncClient) -> (Net, u64) {
    client
        .pull::<TestBackend, Net>(fresh_model(), &Default::default())
        .unwrap()
}

fn settings() -> SyncSettings {
    SyncSettings {
        gamma: 0.9,
        advantage: AdvantageKind::Simple,
    }
}

fn segment() -> TrajectoryBuffer {
    let mut buffer = TrajectoryBuffer::new(4, 20);
    buffer.push(&[0.01, 0.0, 0.02, -0.01], 0, 1.0);
    buffer.push(&[0.02, 0.1, 0.01, -0.05], 1, 1.0);
    buffer.push(&[0.03, 0.2, -0.01, -0.09], 1, -1.0);
    buffer
}

#[test]
fn test_step_counter_is_exact_under_contention() {
    let server = spawn_server();
    let n_workers = 4;
    let pushes_per_worker = 25;

    let workers: Vec<_> = (0..n_workers)
        .map(|id| {
            let client = server.client(id);
            thread::spawn(move || {
                (0..pushes_per_worker)
                    .map(|_| client.push(GradientsParams::new()).unwrap().step)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut steps = BTreeSet::new();
    let mut total = 0;
    for worker in workers {
        let acked = worker.join().unwrap();
        // Each worker sees its own acks strictly increasing.
        assert!(acked.windows(2).all(|w| w[0] < w[1]));
        total += acked.len();
        steps.extend(acked);
    }

    // No duplicates, no gaps.
    assert_eq!(total, 100);
    assert_eq!(steps, (1..=100).collect::<BTreeSet<u64>>());
    assert_eq!(server.slot().version(), 100);

    let outcome = server.shutdown().unwrap();
    assert_eq!(outcome.optimizer.step_count(), 100);
}

#[test]
fn test_pull_loads_shared_weights_into_template() {
    let shared = fresh_model();
    let expected = flatten_params(&shared).unwrap();
    let server = spawn_server_with(shared);

    let template = fresh_model();
    assert_ne!(flatten_params(&template).unwrap(), expected);

    let (local, version) = server
        .client(0)
        .pull::<TestBackend, Net>(template, &Default::default())
        .unwrap();
    assert_eq!(version, 0);
    assert_eq!(flatten_params(&local).unwrap(), expected);
    server.shutdown().unwrap();
}

#[test]
fn test_pull_fidelity_single_worker() {
    let server = spawn_server();
    let client = server.client(0);
    let device = Default::default();

    let (local, version) = pull_local(&client);
    assert_eq!(version, 0);
    let before = flatten_params(&local).unwrap();

    let (local, report) = push_and_pull::<TestBackend, Net>(
        &client,
        local,
        &segment(),
        false,
        &[0.04, 0.3, -0.03, -0.1],
        settings(),
        &device,
    )
    .unwrap();

    assert_eq!(report.step, 1);
    assert_eq!(report.pulled_version, 1);
    assert!(report.value_loss.is_finite());

    let local_params = flatten_params(&local).unwrap();
    assert_ne!(local_params, before, "push must change the shared model");

    let outcome = server.shutdown().unwrap();
    assert_eq!(flatten_params(&outcome.model).unwrap(), local_params);
}

#[test]
fn test_repeated_rounds_advance_version() {
    let server = spawn_server();
    let client = server.client(0);
    let device = Default::default();

    let (mut local, _) = pull_local(&client);
    for expected_step in 1..=3 {
        let (next, report) = push_and_pull::<TestBackend, Net>(
            &client,
            local,
            &segment(),
            true,
            &[0.0; 4],
            settings(),
            &device,
        )
        .unwrap();
        assert_eq!(report.step, expected_step);
        local = next;
    }
    assert_eq!(server.slot().version(), 3);
    server.shutdown().unwrap();
}

#[test]
fn test_push_after_shutdown_fails() {
    let server = spawn_server();
    let client = server.client(0);
    server.shutdown().unwrap();

    assert_eq!(
        client.push(GradientsParams::new()),
        Err(SyncError::ServerUnavailable)
    );
}

#[test]
fn test_empty_buffer_is_rejected() {
    let server = spawn_server();
    let client = server.client(0);
    let device = Default::default();
    let (local, _) = pull_local(&client);

    let result = push_and_pull::<TestBackend, Net>(
        &client,
        local,
        &TrajectoryBuffer::new(4, 20),
        true,
        &[0.0; 4],
        settings(),
        &device,
    );
    assert!(matches!(result, Err(SyncError::EmptyBuffer)));
    assert_eq!(server.slot().version(), 0);
    server.shutdown().unwrap();
}

#[test]
fn test_gae_round_trip() {
    let server = spawn_server();
    let client = server.client(2);
    let device = Default::default();
    let (local, _) = pull_local(&client);

    let settings = SyncSettings {
        gamma: 0.99,
        advantage: AdvantageKind::Gae { lambda: 0.95 },
    };
    let (_, report) = push_and_pull::<TestBackend, Net>(
        &client,
        local,
        &segment(),
        false,
        &[0.0; 4],
        settings,
        &device,
    )
    .unwrap();
    assert_eq!(report.step, 1);
    server.shutdown().unwrap();
}
