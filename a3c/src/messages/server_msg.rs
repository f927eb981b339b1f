//! Requests handled by the parameter server.

use burn::optim::GradientsParams;
use crossbeam_channel::Sender;

/// Messages sent to the parameter server.
pub enum ServerMsg {
    /// Apply one worker's gradients as one optimizer step.
    Push(PushRequest),
    /// Stop the server loop. Pushes queued ahead of it are still applied.
    Shutdown,
}

/// One worker's gradients, keyed by the shared model's parameter ids.
pub struct PushRequest {
    pub worker_id: usize,
    pub grads: GradientsParams,
    /// Acknowledgement channel, answered once the step is applied and published.
    pub reply: Sender<PushAck>,
}

/// Confirmation of an applied push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushAck {
    /// Optimizer step produced by this push (1-based).
    pub step: u64,
}

impl std::fmt::Debug for ServerMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerMsg::Push(req) => f
                .debug_struct("Push")
                .field("worker_id", &req.worker_id)
                .field("n_grads", &req.grads.len())
                .finish(),
            ServerMsg::Shutdown => write!(f, "Shutdown"),
        }
    }
}
