//! Run history files.
//!
//! Each run is written to `<dir>/<stem>.json`, where the stem encodes the run
//! parameters as `{env}_{episodes}_{workers}_{Simple|GAE}_{gamma}[_{lambda}]`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::AdvantageKind;

use super::aggregator::MetricsHistory;

/// History file error.
#[derive(Debug)]
pub enum HistoryError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The file stem does not follow the naming scheme.
    InvalidStem(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::Io(e) => write!(f, "history I/O error: {}", e),
            HistoryError::Json(e) => write!(f, "history JSON error: {}", e),
            HistoryError::InvalidStem(stem) => write!(f, "invalid history file stem '{}'", stem),
        }
    }
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HistoryError::Io(e) => Some(e),
            HistoryError::Json(e) => Some(e),
            HistoryError::InvalidStem(_) => None,
        }
    }
}

impl From<std::io::Error> for HistoryError {
    fn from(e: std::io::Error) -> Self {
        HistoryError::Io(e)
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        HistoryError::Json(e)
    }
}

/// Parameters identifying one run's history file.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryKey {
    pub env_name: String,
    pub episodes: usize,
    pub workers: usize,
    pub advantage: AdvantageKind,
    pub gamma: f32,
}

impl HistoryKey {
    pub fn file_stem(&self) -> String {
        let mut stem = format!(
            "{}_{}_{}_{}_{}",
            self.env_name.replace('_', "-"),
            self.episodes,
            self.workers,
            self.advantage.label(),
            self.gamma
        );
        if let Some(lambda) = self.advantage.lambda() {
            stem.push_str(&format!("_{}", lambda));
        }
        stem
    }

    /// Inverse of [`file_stem`](Self::file_stem).
    pub fn parse(stem: &str) -> Result<Self, HistoryError> {
        let invalid = || HistoryError::InvalidStem(stem.to_string());
        let parts: Vec<&str> = stem.split('_').collect();

        let (env_name, episodes, workers, kind, gamma, lambda) = match parts.as_slice() {
            [env, episodes, workers, kind, gamma] => (env, episodes, workers, kind, gamma, None),
            [env, episodes, workers, kind, gamma, lambda] => {
                (env, episodes, workers, kind, gamma, Some(lambda))
            }
            _ => return Err(invalid()),
        };

        let advantage = match (*kind, lambda) {
            ("Simple", None) => AdvantageKind::Simple,
            ("GAE", Some(lambda)) => AdvantageKind::Gae {
                lambda: lambda.parse().map_err(|_| invalid())?,
            },
            _ => return Err(invalid()),
        };
        if env_name.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            env_name: env_name.to_string(),
            episodes: episodes.parse().map_err(|_| invalid())?,
            workers: workers.parse().map_err(|_| invalid())?,
            advantage,
            gamma: gamma.parse().map_err(|_| invalid())?,
        })
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.file_stem()))
    }
}

/// On-disk form of a run's histories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    pub rewards: Vec<f32>,
    /// Episode durations in seconds.
    pub durations: Vec<f64>,
    pub actions: Vec<usize>,
}

impl From<&MetricsHistory> for RunHistory {
    fn from(history: &MetricsHistory) -> Self {
        Self {
            rewards: history.rewards.clone(),
            durations: history.durations.iter().map(|d| d.as_secs_f64()).collect(),
            actions: history.actions.clone(),
        }
    }
}

/// Write `history` to `dir`, creating the directory if needed.
pub fn save_history(
    dir: &Path,
    key: &HistoryKey,
    history: &MetricsHistory,
) -> Result<PathBuf, HistoryError> {
    fs::create_dir_all(dir)?;
    let path = key.path_in(dir);
    let json = serde_json::to_string_pretty(&RunHistory::from(history))?;
    fs::write(&path, json)?;
    log::info!("Saved history to {}", path.display());
    Ok(path)
}

pub fn load_history(path: &Path) -> Result<RunHistory, HistoryError> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
