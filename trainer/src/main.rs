//! A3C training on cart-pole.
//!
//! ```text
//! a3c-trainer --workers 8 --max-episodes 3000 --model-dir models/cartpole
//! a3c-trainer --load-model models/cartpole --demo-mode
//! RUST_LOG=debug a3c-trainer --gae-lambda 0.95 --trials 1 --csv episodes.csv
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use a3c::metrics::save_history;
use a3c::{
    A3CConfig, ActorCriticConfig, ActorCriticNet, AdvantageKind, CartPoleEnv, ConsoleLogger,
    Coordinator, CsvLogger, HistoryKey, ModelDescriptor, ModelStore, MultiLogger, RunMode,
    StopPolicy,
};
use anyhow::{Context, Result};
use burn::backend::{Autodiff, NdArray};
use clap::Parser;
use tracing::info;

type Backend = Autodiff<NdArray<f32>>;

#[derive(Parser, Debug)]
#[command(name = "a3c-trainer", about = "Asynchronous advantage actor-critic on cart-pole")]
struct Args {
    /// Evaluate a saved model instead of training (one worker, no updates).
    #[arg(long, value_name = "DIR")]
    load_model: Option<PathBuf>,
    /// Render worker 0's environment every step.
    #[arg(long, default_value_t = false)]
    demo_mode: bool,
    /// Worker threads (default: available parallelism).
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long, default_value_t = 3000)]
    max_episodes: usize,
    #[arg(long, default_value_t = 0.9)]
    gamma: f32,
    /// Use generalized advantage estimation with this lambda.
    #[arg(long, value_name = "LAMBDA")]
    gae_lambda: Option<f32>,
    #[arg(long, default_value_t = 20)]
    sync_interval: usize,
    #[arg(long, default_value_t = 0.003)]
    learning_rate: f64,
    /// Independent runs, each timed.
    #[arg(long, default_value_t = 3)]
    trials: usize,
    /// Stop every worker as soon as one converges.
    #[arg(long, default_value_t = false)]
    global_stop: bool,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Where an accepted model is saved.
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,
    #[arg(long, default_value = "results", value_name = "DIR")]
    results_dir: PathBuf,
    /// Per-episode CSV log.
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,
    #[arg(long, default_value_t = 10)]
    log_interval: usize,
}

impl Args {
    fn to_config(&self, trial: usize) -> A3CConfig {
        let mut config = A3CConfig::new()
            .with_max_episodes(self.max_episodes)
            .with_gamma(self.gamma)
            .with_sync_interval(self.sync_interval)
            .with_learning_rate(self.learning_rate)
            .with_seed(self.seed.wrapping_add(1_000 * trial as u64))
            .with_log_interval(self.log_interval)
            .with_demo_worker(self.demo_mode.then_some(0));

        if let Some(workers) = self.workers {
            config = config.with_n_workers(workers);
        }
        if let Some(lambda) = self.gae_lambda {
            config = config.with_advantage(AdvantageKind::Gae { lambda });
        }
        if self.global_stop {
            config = config.with_stop_policy(StopPolicy::Global);
        }
        if self.load_model.is_some() {
            config = config.with_mode(RunMode::Evaluate);
        } else if let Some(dir) = &self.model_dir {
            config = config.with_model_dir(dir);
        }
        config
    }
}

/// `episodes.csv` becomes `episodes_trial2.csv` when there are several trials.
fn trial_path(path: &Path, trial: usize, trials: usize) -> PathBuf {
    if trials <= 1 {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_trial{}.{}", stem, trial, ext.to_string_lossy()),
        None => format!("{}_trial{}", stem, trial),
    };
    path.with_file_name(name)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let args = Args::parse();
    let device = Default::default();
    let architecture = ActorCriticConfig::new(cartpole::OBS_SIZE, cartpole::N_ACTIONS);

    // A bad checkpoint aborts before any thread is spawned.
    let loaded = match &args.load_model {
        Some(dir) => {
            let (model, descriptor) = ModelStore::new(dir)
                .load::<Backend>(&device)
                .with_context(|| format!("failed to load model from {}", dir.display()))?;
            info!(
                "Evaluating {} model ({} optimizer steps, {} episodes)",
                descriptor.env_name, descriptor.optimizer_steps, descriptor.episodes
            );
            Some(model)
        }
        None => None,
    };

    let mut trial_times: Vec<Duration> = Vec::with_capacity(args.trials);
    for trial in 0..args.trials {
        let config = args.to_config(trial);
        info!("=== Trial {}/{} ===", trial + 1, args.trials);

        let mut logger = MultiLogger::new().add(ConsoleLogger::new(config.log_interval));
        if let Some(path) = &args.csv {
            let path = trial_path(path, trial + 1, args.trials);
            let csv = CsvLogger::new(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            logger = logger.add(csv);
        }

        let initial_model: ActorCriticNet<Backend> = match &loaded {
            Some(model) => model.clone(),
            None => architecture.init(&device),
        };

        let key = HistoryKey {
            env_name: CartPoleEnv::NAME.to_string(),
            episodes: config.max_episodes,
            workers: config.effective_workers(),
            advantage: config.advantage,
            gamma: config.gamma,
        };
        let seed = config.seed;

        let outcome = Coordinator::<Backend, ActorCriticNet<Backend>>::new(config)
            .with_logger(Box::new(logger))
            .with_descriptor(ModelDescriptor::new(CartPoleEnv::NAME, architecture))
            .run(
                |device| architecture.init(device),
                initial_model,
                |worker_id| CartPoleEnv::new(seed.wrapping_add(worker_id as u64)),
            )
            .with_context(|| format!("trial {} failed", trial + 1))?;

        info!(
            "Trial {} finished in {:.1}s: {} episodes, {} optimizer steps, {} failed workers, saved: {}",
            trial + 1,
            outcome.elapsed.as_secs_f32(),
            outcome.episodes(),
            outcome.optimizer_steps,
            outcome.failures(),
            outcome.saved
        );
        if let Some(ci) = outcome.history.action_interval() {
            info!(
                "Trial {} last action: mean {:.3}, 95% CI [{:.3}, {:.3}] over {} episodes",
                trial + 1,
                ci.mean,
                ci.low(),
                ci.high(),
                ci.samples
            );
        }
        trial_times.push(outcome.elapsed);

        let results_dir = if args.trials > 1 {
            args.results_dir.join(format!("trial_{}", trial + 1))
        } else {
            args.results_dir.clone()
        };
        save_history(&results_dir, &key, &outcome.history)
            .with_context(|| format!("failed to save history to {}", results_dir.display()))?;
    }

    if !trial_times.is_empty() {
        let mean = trial_times.iter().sum::<Duration>() / trial_times.len() as u32;
        info!(
            "Mean trial duration over {} trials: {:.1}s",
            trial_times.len(),
            mean.as_secs_f32()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_library() {
        let args = Args::parse_from(["a3c-trainer"]);
        let config = args.to_config(0);
        assert_eq!(config.max_episodes, 3000);
        assert_eq!(config.sync_interval, 20);
        assert_eq!(config.gamma, 0.9);
        assert_eq!(config.optimizer.learning_rate, 0.003);
        assert_eq!(config.mode, RunMode::Train);
        assert_eq!(args.trials, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_model_switches_to_evaluation() {
        let args = Args::parse_from([
            "a3c-trainer",
            "--load-model",
            "models/cartpole",
            "--model-dir",
            "out",
            "--workers",
            "6",
        ]);
        let config = args.to_config(0);
        assert_eq!(config.mode, RunMode::Evaluate);
        assert_eq!(config.effective_workers(), 1);
        assert!(config.model_dir.is_none());
    }

    #[test]
    fn test_gae_and_global_stop_flags() {
        let args = Args::parse_from([
            "a3c-trainer",
            "--gae-lambda",
            "0.95",
            "--global-stop",
            "--demo-mode",
        ]);
        let config = args.to_config(1);
        assert_eq!(config.advantage, AdvantageKind::Gae { lambda: 0.95 });
        assert_eq!(config.stop_policy, StopPolicy::Global);
        assert_eq!(config.demo_worker, Some(0));
        assert_eq!(config.seed, 1000);
    }

    #[test]
    fn test_trial_path() {
        let path = Path::new("logs/episodes.csv");
        assert_eq!(trial_path(path, 1, 1), PathBuf::from("logs/episodes.csv"));
        assert_eq!(
            trial_path(path, 2, 3),
            PathBuf::from("logs/episodes_trial2.csv")
        );
    }
}
