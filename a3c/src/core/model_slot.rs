//! Latest-value slot for the shared model's weights.
//!
//! The parameter server publishes the shared model as serialized record bytes
//! after every optimizer step; workers pull by loading those bytes into their
//! own local model. Tensors never cross threads: every worker rebuilds fresh
//! parameters from the bytes, so no autodiff graph node is shared between
//! the server and a worker, or between two workers.
//!
//! Unlike a queue, the slot never empties and never accumulates: a publish
//! replaces the previous snapshot.
//!
//! ```text
//! server                                     worker
//! ┌──────────────────┐                       ┌──────────────────┐
//! │ adam.step        │                       │ local model      │
//! │   ↓              │                       │   ↑              │
//! │ encode_weights() │                       │ decode_weights() │
//! │   ↓              │                       │   ↑              │
//! │ Vec<u8> ───────────── ModelSlot ────────►│ Vec<u8>          │
//! └──────────────────┘                       └──────────────────┘
//! ```
//!
//! The lock is only held for the swap on publish and for the byte copy on
//! pull, never across an optimizer step. A pull can therefore observe a
//! snapshot newer than the caller's own push.

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder, RecorderError};
use burn::tensor::backend::Backend;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Recorder used for every in-memory weight transfer.
pub type WeightRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// Serialize `model`'s parameters.
pub fn encode_weights<B: Backend, M: Module<B>>(model: &M) -> Result<Vec<u8>, RecorderError> {
    Recorder::<B>::record(&WeightRecorder::default(), model.clone().into_record(), ())
}

/// Load serialized parameters into `template`, replacing all of its tensors.
pub fn decode_weights<B: Backend, M: Module<B>>(
    template: M,
    bytes: Vec<u8>,
    device: &B::Device,
) -> Result<M, RecorderError> {
    let record = Recorder::<B>::load(&WeightRecorder::default(), bytes, device)?;
    Ok(template.load_record(record))
}

/// Latest-value container for serialized model snapshots.
pub struct ModelSlot {
    current: Mutex<Vec<u8>>,
    /// Optimizer step that produced the current snapshot.
    version: AtomicU64,
    published_count: AtomicUsize,
    pulled_count: AtomicUsize,
}

impl ModelSlot {
    /// Create a slot holding the initial weights at version 0.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            current: Mutex::new(bytes),
            version: AtomicU64::new(0),
            published_count: AtomicUsize::new(0),
            pulled_count: AtomicUsize::new(0),
        }
    }

    /// Version of the current snapshot.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Debug statistics: (published, pulled).
    pub fn stats(&self) -> (usize, usize) {
        (
            self.published_count.load(Ordering::Relaxed),
            self.pulled_count.load(Ordering::Relaxed),
        )
    }

    /// Replace the snapshot, tagging it with the step that produced it.
    pub fn publish(&self, bytes: Vec<u8>, version: u64) {
        let mut guard = self.current.lock();
        *guard = bytes;
        self.version.store(version, Ordering::Release);
        self.published_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Vec<u8> {
        self.snapshot_versioned().0
    }

    /// Copy of the current snapshot with its version.
    pub fn snapshot_versioned(&self) -> (Vec<u8>, u64) {
        let guard = self.current.lock();
        self.pulled_count.fetch_add(1, Ordering::Relaxed);
        (guard.clone(), self.version.load(Ordering::Acquire))
    }
}

/// Thread-safe shared model slot.
pub type SharedModelSlot = Arc<ModelSlot>;

/// Create a shared slot holding `bytes`.
pub fn model_slot(bytes: Vec<u8>) -> SharedModelSlot {
    Arc::new(ModelSlot::new(bytes))
}
