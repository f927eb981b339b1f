//! Episode loggers.
//!
//! The coordinator feeds one [`EpisodeSnapshot`] per drained reward into a
//! [`MetricsLogger`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// One finished episode as seen by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSnapshot {
    /// Global episode number (1-based).
    pub episode: usize,
    pub worker_id: usize,
    pub reward: f32,
    pub smoothed_reward: f64,
    /// Wall time since the run started.
    pub elapsed: Duration,
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    fn log(&mut self, snapshot: &EpisodeSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Progress lines through the `log` facade every `log_interval` episodes.
pub struct ConsoleLogger {
    log_interval: usize,
}

impl ConsoleLogger {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &EpisodeSnapshot) {
        if snapshot.episode % self.log_interval != 0 {
            return;
        }
        log::info!(
            "w{:02} | Ep: {:>5} | Ep_r: {:>8.1} | Smoothed: {:>8.2} | {:>6.1}s",
            snapshot.worker_id,
            snapshot.episode,
            snapshot.reward,
            snapshot.smoothed_reward,
            snapshot.elapsed.as_secs_f32()
        );
    }

    fn flush(&mut self) {}
}

/// CSV file logger, one row per episode.
pub struct CsvLogger {
    writer: BufWriter<File>,
}

impl CsvLogger {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "episode,worker_id,reward,smoothed_reward,elapsed_secs")?;
        Ok(Self { writer })
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &EpisodeSnapshot) {
        let _ = writeln!(
            self.writer,
            "{},{},{:.4},{:.4},{:.3}",
            snapshot.episode,
            snapshot.worker_id,
            snapshot.reward,
            snapshot.smoothed_reward,
            snapshot.elapsed.as_secs_f64()
        );
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Fan-out to several loggers. Empty means no logging.
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &EpisodeSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
