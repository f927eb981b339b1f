//! Directory-based model persistence.
//!
//! A store directory holds two files:
//!
//! - `descriptor.json`: format version, environment, network architecture and
//!   training counters
//! - `weights.bin`: the network parameters in burn's full-precision binary
//!   record format
//!
//! Loading reads the descriptor first, rebuilds the network from its
//! architecture and only then loads the weights into it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::nn::{ActorCriticConfig, ActorCriticNet};

/// Descriptor format written by this version.
pub const FORMAT_VERSION: u32 = 1;

const DESCRIPTOR_FILE: &str = "descriptor.json";
const WEIGHTS_FILE: &str = "weights.bin";

/// Error type for model persistence.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    Json(serde_json::Error),
    /// Descriptor written by an unknown format version.
    UnsupportedVersion { found: u32, expected: u32 },
    /// A required file does not exist.
    NotFound(PathBuf),
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::Json(e) => write!(f, "Descriptor error: {}", e),
            CheckpointError::UnsupportedVersion { found, expected } => write!(
                f,
                "Unsupported model format version {} (expected {})",
                found, expected
            ),
            CheckpointError::NotFound(path) => write!(f, "Not found: {}", path.display()),
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(e: serde_json::Error) -> Self {
        CheckpointError::Json(e)
    }
}

/// Metadata saved next to the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub format_version: u32,
    pub env_name: String,
    pub architecture: ActorCriticConfig,
    /// Optimizer steps applied to the saved parameters.
    pub optimizer_steps: u64,
    /// Episodes played during the run that produced them.
    pub episodes: usize,
}

impl ModelDescriptor {
    pub fn new(env_name: impl Into<String>, architecture: ActorCriticConfig) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            env_name: env_name.into(),
            architecture,
            optimizer_steps: 0,
            episodes: 0,
        }
    }

    pub fn with_progress(mut self, optimizer_steps: u64, episodes: usize) -> Self {
        self.optimizer_steps = optimizer_steps;
        self.episodes = episodes;
        self
    }
}

/// A directory holding one saved model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.dir.join(DESCRIPTOR_FILE)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_FILE)
    }

    /// Both files are present.
    pub fn exists(&self) -> bool {
        self.descriptor_path().is_file() && self.weights_path().is_file()
    }

    /// Write weights and descriptor, creating the directory if needed.
    ///
    /// The descriptor is written last, so a store whose descriptor exists has
    /// complete weights.
    pub fn save<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        descriptor: &ModelDescriptor,
    ) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir)?;

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(self.weights_path(), &recorder)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;

        let json = serde_json::to_string_pretty(descriptor)?;
        fs::write(self.descriptor_path(), json)?;

        log::info!(
            "Saved model to {} ({} optimizer steps, {} episodes)",
            self.dir.display(),
            descriptor.optimizer_steps,
            descriptor.episodes
        );
        Ok(())
    }

    /// Read and check the descriptor without touching the weights.
    pub fn load_descriptor(&self) -> Result<ModelDescriptor, CheckpointError> {
        let path = self.descriptor_path();
        if !path.is_file() {
            return Err(CheckpointError::NotFound(path));
        }
        let descriptor: ModelDescriptor = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if descriptor.format_version != FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: descriptor.format_version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(descriptor)
    }

    /// Rebuild the saved network on `device`.
    pub fn load<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(ActorCriticNet<B>, ModelDescriptor), CheckpointError> {
        let descriptor = self.load_descriptor()?;

        let weights = self.weights_path();
        if !weights.is_file() {
            return Err(CheckpointError::NotFound(weights));
        }

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let model = descriptor
            .architecture
            .init::<B>(device)
            .load_file(weights, &recorder, device)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;

        log::info!(
            "Loaded {} model from {}",
            descriptor.env_name,
            self.dir.display()
        );
        Ok((model, descriptor))
    }
}
