//! Tests for the messages submodule.

use std::thread;
use std::time::Duration;

use super::*;

// =============================================================================
// MetricEnvelope
// =============================================================================

#[test]
fn test_envelope_constructors() {
    let value = MetricEnvelope::value(3, 12.5f32);
    assert_eq!(value.worker_id, 3);
    assert_eq!(value.payload, MetricPayload::Value(12.5));

    let done = MetricEnvelope::<f32>::terminated(3, FinishReason::Completed);
    assert_eq!(done.payload, MetricPayload::Terminated(FinishReason::Completed));
}

#[test]
fn test_finish_reason_failure_classification() {
    assert!(!FinishReason::Converged.is_failure());
    assert!(!FinishReason::Stopped.is_failure());
    assert!(!FinishReason::Completed.is_failure());
    assert!(FinishReason::Failed("env".into()).is_failure());
    assert!(FinishReason::Panicked("boom".into()).is_failure());
}

// =============================================================================
// MetricsChannels
// =============================================================================

#[test]
fn test_episode_lands_on_all_three_channels() {
    let channels = MetricsChannels::new();
    let sender = channels.sender(1);
    let rx = channels.into_receiver();

    sender.send_episode(42.0, Duration::from_millis(5), 1);

    assert_eq!(rx.rewards.recv().unwrap(), MetricEnvelope::value(1, 42.0));
    assert_eq!(
        rx.durations.recv().unwrap(),
        MetricEnvelope::value(1, Duration::from_millis(5))
    );
    assert_eq!(rx.actions.recv().unwrap(), MetricEnvelope::value(1, 1));
}

#[test]
fn test_terminated_lands_on_all_three_channels() {
    let channels = MetricsChannels::new();
    let sender = channels.sender(0);
    let rx = channels.into_receiver();

    sender.send_terminated(FinishReason::Converged);

    assert_eq!(
        rx.rewards.recv().unwrap().payload,
        MetricPayload::<f32>::Terminated(FinishReason::Converged)
    );
    assert_eq!(
        rx.durations.recv().unwrap().payload,
        MetricPayload::<Duration>::Terminated(FinishReason::Converged)
    );
    assert_eq!(
        rx.actions.recv().unwrap().payload,
        MetricPayload::<usize>::Terminated(FinishReason::Converged)
    );
}

#[test]
fn test_channels_disconnect_after_all_senders_drop() {
    let channels = MetricsChannels::new();
    let senders: Vec<_> = (0..2).map(|id| channels.sender(id)).collect();
    let rx = channels.into_receiver();

    let handles: Vec<_> = senders
        .into_iter()
        .map(|sender| {
            thread::spawn(move || {
                sender.send_episode(1.0, Duration::ZERO, 0);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(rx.rewards.iter().count(), 2);
    assert!(rx.rewards.recv().is_err());
}

#[test]
fn test_send_after_receiver_dropped_is_silent() {
    let channels = MetricsChannels::new();
    let sender = channels.sender(0);
    drop(channels);

    sender.send_episode(1.0, Duration::ZERO, 0);
    sender.send_terminated(FinishReason::Completed);
}

// =============================================================================
// Thread safety
// =============================================================================

#[test]
fn test_message_types_are_send() {
    fn assert_send<T: Send>() {}
    assert_send::<MetricsSender>();
    assert_send::<MetricsReceiver>();
    assert_send::<ServerMsg>();
    assert_send::<PushAck>();
}
