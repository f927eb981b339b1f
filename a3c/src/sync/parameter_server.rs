//! Single-owner service holding the shared model and its optimizer.
//!
//! Workers never touch the shared parameters or the Adam moments. They send
//! [`PushRequest`]s over a channel; the server thread applies them one at a
//! time, in arrival order, publishes the new weights to the model slot as
//! record bytes and acknowledges with the step number. The receive loop is
//! the only serialization point in the system, and the server's model is the
//! only autodiff module it ever touches.
//!
//! ```text
//! worker 0 ─┐                     ┌──────────────────────┐
//! worker 1 ─┼── PushRequest ────► │ recv → adam.step     │ ──► ModelSlot (latest)
//! worker N ─┘ ◄── PushAck{step} ─ │      → publish, ack  │        ▲
//!                                 └──────────────────────┘        │ pull()
//!                                                         workers ┘
//! ```

use std::thread::JoinHandle;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::core::{encode_weights, model_slot, SharedModelSlot};
use crate::messages::{PushAck, ServerMsg};
use crate::optim::SharedAdam;

use super::{SyncClient, SyncError};

/// State handed back when the server stops.
pub struct ServerOutcome<B: AutodiffBackend, M: AutodiffModule<B>> {
    /// Shared model after the last applied step.
    pub model: M,
    pub optimizer: SharedAdam<B, M>,
}

/// Handle to a running parameter server.
pub struct ParameterServerHandle<B: AutodiffBackend, M: AutodiffModule<B>> {
    tx: Sender<ServerMsg>,
    slot: SharedModelSlot,
    thread: JoinHandle<ServerOutcome<B, M>>,
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> ParameterServerHandle<B, M> {
    /// Client for one worker.
    pub fn client(&self, worker_id: usize) -> SyncClient {
        SyncClient::new(worker_id, self.tx.clone(), self.slot.clone())
    }

    pub fn slot(&self) -> &SharedModelSlot {
        &self.slot
    }

    /// Ask the server to stop and wait for its final state.
    ///
    /// Requests already queued ahead of the shutdown are still applied.
    pub fn shutdown(self) -> std::thread::Result<ServerOutcome<B, M>> {
        let _ = self.tx.send(ServerMsg::Shutdown);
        drop(self.tx);
        self.thread.join()
    }
}

/// The shared model's owner.
pub struct ParameterServer<B: AutodiffBackend, M: AutodiffModule<B>> {
    model: M,
    optimizer: SharedAdam<B, M>,
    slot: SharedModelSlot,
    rx: Receiver<ServerMsg>,
}

impl<B, M> ParameterServer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    /// Spawn the server thread owning `model` and `optimizer`.
    ///
    /// The slot starts out holding the weights of `model` at version 0.
    pub fn spawn(
        model: M,
        optimizer: SharedAdam<B, M>,
    ) -> Result<ParameterServerHandle<B, M>, SyncError> {
        let slot = model_slot(encode_weights(&model)?);
        let (tx, rx) = unbounded();

        let server = Self {
            model,
            optimizer,
            slot: slot.clone(),
            rx,
        };
        let thread = std::thread::Builder::new()
            .name("a3c-parameter-server".to_string())
            .spawn(move || server.run())
            .map_err(|e| SyncError::Spawn(e.to_string()))?;

        Ok(ParameterServerHandle { tx, slot, thread })
    }

    fn run(self) -> ServerOutcome<B, M> {
        let Self {
            mut model,
            mut optimizer,
            slot,
            rx,
        } = self;

        // Ends on Shutdown or once every sender is gone.
        while let Ok(msg) = rx.recv() {
            match msg {
                ServerMsg::Push(request) => {
                    model = optimizer.step(model, request.grads);
                    let step = optimizer.step_count();
                    match encode_weights(&model) {
                        Ok(bytes) => slot.publish(bytes, step),
                        // Workers keep pulling the previous snapshot.
                        Err(e) => log::error!("failed to encode weights at step {}: {:?}", step, e),
                    }

                    log::trace!("step {} applied for worker {}", step, request.worker_id);
                    // A worker that died after pushing is not an error here.
                    let _ = request.reply.send(PushAck { step });
                }
                ServerMsg::Shutdown => break,
            }
        }

        log::debug!(
            "parameter server stopping after {} steps",
            optimizer.step_count()
        );
        ServerOutcome { model, optimizer }
    }
}
