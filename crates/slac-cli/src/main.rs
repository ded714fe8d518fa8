//! slac CLI
//!
//! Command-line interface for inspecting and smoke-training the latent model.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use slac::config::LatentConfig;
use slac::data::SequenceBatch;
use slac::log::ConsoleLogger;
use slac::network::LatentModel;
use slac::training::{LatentTrainer, TrainerConfig};
use slac::prelude::{SeedableRng, StdRng};
use slac::utils::abbreviate;

#[derive(Parser)]
#[command(name = "slac")]
#[command(version, about = "slac - Stochastic latent model for visuo-tactile RL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default model and trainer configuration as JSON
    Config,

    /// Build a model and print its parameter counts
    Summary {
        /// Model configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Train on synthetic sequences
    Train {
        /// Number of optimiser steps
        #[arg(long, default_value = "10")]
        steps: u64,

        /// Sequences per batch
        #[arg(long, default_value = "8")]
        batch_size: i64,

        /// Transitions per sequence
        #[arg(long, default_value = "8")]
        seq_len: i64,

        /// Learning rate
        #[arg(long, default_value = "0.0001")]
        lr: f64,

        /// Seed for data, initialisation and noise
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Model configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log metrics every N steps
        #[arg(long, default_value = "1")]
        log_interval: u64,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config => print_config()?,
        Commands::Summary { config } => summary(config.as_deref())?,
        Commands::Train {
            steps,
            batch_size,
            seq_len,
            lr,
            seed,
            config,
            log_interval,
            progress,
        } => {
            let trainer_config = TrainerConfig {
                learning_rate: lr,
                log_interval,
                noise_seed: seed,
                show_progress: progress,
                device: select_device(),
                ..Default::default()
            };
            train(
                config.as_deref(),
                trainer_config,
                steps,
                batch_size,
                seq_len,
                seed,
            )?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LatentConfig> {
    match path {
        Some(path) => LatentConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(LatentConfig::default()),
    }
}

fn select_device() -> tch::Device {
    if tch::Cuda::is_available() {
        tracing::info!("Using CUDA");
        tch::Device::Cuda(0)
    } else {
        tracing::info!("Using CPU");
        tch::Device::Cpu
    }
}

fn print_config() -> Result<()> {
    let mut root = serde_json::Map::new();
    root.insert(
        "model".to_string(),
        serde_json::to_value(LatentConfig::default())?,
    );
    root.insert(
        "trainer".to_string(),
        serde_json::to_value(TrainerConfig::default())?,
    );
    println!("{}", serde_json::to_string_pretty(&root)?);
    Ok(())
}

fn summary(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let model = LatentModel::new(config, tch::Device::Cpu)?;

    println!("Latent model parameters:");
    for (component, count) in model.parameter_breakdown() {
        println!("  {:<20} {:>10} ({})", component, count, abbreviate(count as u64));
    }
    let total = model.num_parameters();
    println!("  {:<20} {:>10} ({})", "total", total, abbreviate(total as u64));

    Ok(())
}

fn train(
    path: Option<&Path>,
    trainer_config: TrainerConfig,
    steps: u64,
    batch_size: i64,
    seq_len: i64,
    seed: u64,
) -> Result<()> {
    anyhow::ensure!(
        batch_size > 0 && seq_len > 0,
        "batch size and sequence length must be positive"
    );

    let config = load_config(path)?.with_init_seed(seed);
    let device = trainer_config.device;

    tracing::info!(
        steps,
        batch_size,
        seq_len,
        lr = trainer_config.learning_rate,
        seed,
        "Starting training"
    );

    let model = LatentModel::new(config.clone(), device)?;
    tracing::info!(params = model.num_parameters(), "Created latent model");

    let mut trainer = LatentTrainer::new(model, trainer_config)?
        .with_logger(Box::new(ConsoleLogger::with_prefix("latent")));

    let mut rng = StdRng::seed_from_u64(seed);
    let stats = trainer.train(steps, |_| {
        SequenceBatch::synthetic(&config, batch_size, seq_len, &mut rng, device)
    })?;

    println!(
        "Final losses after {} steps: kld={:.4} image={:.4} reward={:.4} total={:.4}",
        trainer.global_step(),
        stats.kld,
        stats.image,
        stats.reward,
        stats.total
    );

    Ok(())
}
