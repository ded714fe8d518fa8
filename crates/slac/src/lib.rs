//! # slac
//!
//! Stochastic latent variable model for visuo-tactile reinforcement learning.
//!
//! ## Overview
//!
//! slac provides:
//! - `LatentModel` - two coupled latent variables (z1, z2) with learned prior
//!   and posterior transitions, an image decoder and a reward head
//! - `Encoder` / `Decoder` - convolutional image + tactile feature extraction
//!   and image reconstruction
//! - `Gaussian` / `FixedGaussian` - diagonal Gaussian building blocks
//! - `LatentTrainer` - Adam updates over the variational loss
//!
//! All networks are built on `tch` (libtorch). Reparameterisation noise comes
//! from an explicit [`noise::NoiseSource`], so a run is reproducible from its
//! seeds alone.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use slac::prelude::*;
//!
//! let config = LatentConfig::default();
//! let model = LatentModel::new(config.clone(), Device::Cpu)?;
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let batch = SequenceBatch::synthetic(&config, 2, 3, &mut rng, Device::Cpu)?;
//! let mut noise = SeededNoise::new(7);
//! let loss = model.calculate_loss(&batch, &mut noise)?;
//! ```

pub mod config;
pub mod data;
pub mod distribution;
pub mod log;
pub mod network;
pub mod noise;
pub mod training;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::LatentConfig;
    pub use crate::data::SequenceBatch;
    pub use crate::distribution::{calculate_kl_divergence, gaussian_log_likelihood, DiagGaussian};
    pub use crate::log::{CompositeLogger, ConsoleLogger, MetricLogger, NoOpLogger};
    pub use crate::network::{
        ConditionalGaussian, Decoder, Encoder, FixedGaussian, Gaussian, LatentLoss, LatentModel,
        PosteriorSample, PriorSample,
    };
    pub use crate::noise::{NoiseSource, SeededNoise, TorchNoise, ZeroNoise};
    pub use crate::training::{LatentTrainer, LossStats, TrainerConfig};

    pub use rand::rngs::StdRng;
    pub use rand::SeedableRng;
    pub use tch::Device;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum SlacError {
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Tensor error: {0}")]
    TensorError(#[from] tch::TchError),
}

impl SlacError {
    pub(crate) fn shape(context: impl Into<String>, expected: Vec<i64>, actual: Vec<i64>) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

pub type Result<T> = core::result::Result<T, SlacError>;
