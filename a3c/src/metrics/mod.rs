//! Training progress, metric draining, logging and history files.

pub mod aggregator;
pub mod history;
pub mod logger;
pub mod progress;

pub use aggregator::{
    drain_channel, ChannelDrain, ConfidenceInterval, MetricsAggregator, MetricsHistory,
};
pub use history::{load_history, save_history, HistoryError, HistoryKey, RunHistory};
pub use logger::{ConsoleLogger, CsvLogger, EpisodeSnapshot, MetricsLogger, MultiLogger};
pub use progress::{
    smoothed_update, training_progress, ProgressReader, ProgressUpdate, ProgressWriter,
};
