//! Training of the latent model.
//!
//! - `TrainerConfig` - optimiser and loss-weighting settings
//! - `LatentTrainer` - Adam updates, gradient clipping and metric logging

mod config;
mod trainer;

pub use config::TrainerConfig;
pub use trainer::{LatentTrainer, LossStats};
