//! Message types exchanged between workers, the parameter server and the coordinator.

pub mod metrics_msg;
pub mod server_msg;

#[cfg(test)]
mod tests;

pub use metrics_msg::{
    ActionMsg, DurationMsg, FinishReason, MetricEnvelope, MetricPayload, MetricsChannels,
    MetricsReceiver, MetricsSender, RewardMsg,
};
pub use server_msg::{PushAck, PushRequest, ServerMsg};
