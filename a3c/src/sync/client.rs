//! Worker side of the push-and-pull protocol.

use std::fmt;

use burn::module::{AutodiffModule, Module};
use burn::optim::GradientsParams;
use burn::record::RecorderError;
use burn::tensor::backend::{AutodiffBackend, Backend};
use crossbeam_channel::{bounded, Sender};

use crate::algorithms::{a3c_loss, bootstrap_value};
use crate::config::AdvantageKind;
use crate::core::{decode_weights, SharedModelSlot, TrajectoryBuffer};
use crate::messages::{PushAck, PushRequest, ServerMsg};
use crate::nn::{state_value, ModelError, PolicyValueModel};

/// Failure of a push-and-pull round.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The parameter server stopped before acknowledging.
    ServerUnavailable,
    /// Push-and-pull needs at least one buffered transition.
    EmptyBuffer,
    /// Loss or bootstrap computation failed.
    Model(ModelError),
    /// Weights could not be serialized or loaded.
    Transfer(String),
    /// The parameter server thread could not be started.
    Spawn(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::ServerUnavailable => write!(f, "parameter server unavailable"),
            SyncError::EmptyBuffer => write!(f, "push-and-pull called with an empty buffer"),
            SyncError::Model(e) => write!(f, "model error: {}", e),
            SyncError::Transfer(e) => write!(f, "weight transfer failed: {}", e),
            SyncError::Spawn(e) => write!(f, "failed to spawn parameter server: {}", e),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<ModelError> for SyncError {
    fn from(e: ModelError) -> Self {
        SyncError::Model(e)
    }
}

impl From<RecorderError> for SyncError {
    fn from(e: RecorderError) -> Self {
        SyncError::Transfer(format!("{:?}", e))
    }
}

/// A worker's connection to the parameter server and the shared snapshot.
#[derive(Clone)]
pub struct SyncClient {
    worker_id: usize,
    server_tx: Sender<ServerMsg>,
    slot: SharedModelSlot,
}

impl SyncClient {
    pub(crate) fn new(worker_id: usize, server_tx: Sender<ServerMsg>, slot: SharedModelSlot) -> Self {
        Self {
            worker_id,
            server_tx,
            slot,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Send gradients and block until the server has applied them.
    pub fn push(&self, grads: GradientsParams) -> Result<PushAck, SyncError> {
        let (reply, ack_rx) = bounded(1);
        self.server_tx
            .send(ServerMsg::Push(PushRequest {
                worker_id: self.worker_id,
                grads,
                reply,
            }))
            .map_err(|_| SyncError::ServerUnavailable)?;
        ack_rx.recv().map_err(|_| SyncError::ServerUnavailable)
    }

    /// Load the latest published shared weights into `local`.
    ///
    /// Every parameter of `local` is replaced by a tensor built from the
    /// snapshot bytes. Not ordered with respect to other workers' pushes.
    pub fn pull<B: Backend, M: Module<B>>(
        &self,
        local: M,
        device: &B::Device,
    ) -> Result<(M, u64), SyncError> {
        let (bytes, version) = self.slot.snapshot_versioned();
        let model = decode_weights(local, bytes, device)?;
        Ok((model, version))
    }
}

/// Rollout settings used by [`push_and_pull`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub gamma: f32,
    pub advantage: AdvantageKind,
}

/// Outcome of one push-and-pull round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncReport {
    /// Optimizer step produced by this worker's push.
    pub step: u64,
    /// Version of the snapshot pulled afterwards (≥ `step`).
    pub pulled_version: u64,
    pub value_loss: f32,
    pub policy_loss: f32,
}

/// Merge the segment's gradient into the shared model and refresh `local`.
///
/// 1. Bootstrap with 0 if `terminated`, else `V_local(bootstrap_state)`
///    evaluated without autodiff.
/// 2. Loss on the buffered segment, backward through the local model.
/// 3. Push the gradients; the server applies them as one optimizer step.
/// 4. Load the latest shared snapshot into the local model.
///
/// `local` is consumed; any error is fatal to the calling worker. The caller
/// clears the buffer.
pub fn push_and_pull<B, M>(
    client: &SyncClient,
    local: M,
    buffer: &TrajectoryBuffer,
    terminated: bool,
    bootstrap_state: &[f32],
    settings: SyncSettings,
    device: &B::Device,
) -> Result<(M, SyncReport), SyncError>
where
    B: AutodiffBackend,
    M: PolicyValueModel<B> + AutodiffModule<B>,
    M::InnerModule: PolicyValueModel<B::InnerBackend>,
{
    if buffer.is_empty() {
        return Err(SyncError::EmptyBuffer);
    }

    let bootstrap = bootstrap_value(terminated, || {
        state_value::<B::InnerBackend, M::InnerModule>(&local.valid(), bootstrap_state, device)
    })?;
    let loss = a3c_loss::<B, M>(
        &local,
        buffer,
        bootstrap,
        settings.gamma,
        settings.advantage,
        device,
    )?;

    let grads = GradientsParams::from_grads(loss.total.backward(), &local);
    let ack = client.push(grads)?;

    let (shared, pulled_version) = client.pull::<B, M>(local, device)?;
    Ok((
        shared,
        SyncReport {
            step: ack.step,
            pulled_version,
            value_loss: loss.value_loss,
            policy_loss: loss.policy_loss,
        },
    ))
}
