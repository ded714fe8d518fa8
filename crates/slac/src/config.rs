//! Latent model configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SlacError};

/// Spatial size the fixed encoder/decoder stacks are built for.
pub const IMAGE_SIZE: i64 = 84;

/// Configuration for [`crate::network::LatentModel`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatentConfig {
    /// Image observation shape as `[channels, height, width]`.
    pub image_shape: [i64; 3],
    /// Dimension of the continuous action vector.
    pub action_dim: i64,
    /// Number of tactile sensor readings per timestep.
    pub tactile_dim: i64,
    /// Width of the convolutional image embedding.
    pub img_feature_dim: i64,
    /// Width of the tactile embedding.
    pub tactile_latent_dim: i64,
    /// Dimension of the fast latent variable.
    pub z1_dim: i64,
    /// Dimension of the slow latent variable.
    pub z2_dim: i64,
    /// Hidden layer sizes of every Gaussian head.
    pub hidden_units: Vec<i64>,
    /// Fixed standard deviation of the image likelihood.
    pub decoder_std: f64,
    /// Seed for parameter initialisation.
    pub init_seed: u64,
}

impl Default for LatentConfig {
    fn default() -> Self {
        Self {
            image_shape: [3, IMAGE_SIZE, IMAGE_SIZE],
            action_dim: 4,
            tactile_dim: 6,
            img_feature_dim: 256,
            tactile_latent_dim: 96,
            z1_dim: 32,
            z2_dim: 256,
            hidden_units: vec![256, 256],
            decoder_std: 0.1f64.sqrt(),
            init_seed: 0,
        }
    }
}

impl LatentConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Set action dimension
    pub fn with_action_dim(mut self, action_dim: i64) -> Self {
        self.action_dim = action_dim;
        self
    }

    /// Set tactile dimension
    pub fn with_tactile_dim(mut self, tactile_dim: i64) -> Self {
        self.tactile_dim = tactile_dim;
        self
    }

    /// Set latent sizes
    pub fn with_latent_dims(mut self, z1_dim: i64, z2_dim: i64) -> Self {
        self.z1_dim = z1_dim;
        self.z2_dim = z2_dim;
        self
    }

    /// Set hidden layer sizes of the Gaussian heads
    pub fn with_hidden_units(mut self, hidden_units: Vec<i64>) -> Self {
        self.hidden_units = hidden_units;
        self
    }

    /// Set initialisation seed
    pub fn with_init_seed(mut self, seed: u64) -> Self {
        self.init_seed = seed;
        self
    }

    /// Width of the encoder output (image + tactile embedding).
    pub fn feature_dim(&self) -> i64 {
        self.img_feature_dim + self.tactile_latent_dim
    }

    /// Width of a combined (z1, z2) latent.
    pub fn latent_dim(&self) -> i64 {
        self.z1_dim + self.z2_dim
    }

    pub fn image_channels(&self) -> i64 {
        self.image_shape[0]
    }

    /// Check that the configuration describes a buildable model.
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("action_dim", self.action_dim),
            ("tactile_dim", self.tactile_dim),
            ("img_feature_dim", self.img_feature_dim),
            ("tactile_latent_dim", self.tactile_latent_dim),
            ("z1_dim", self.z1_dim),
            ("z2_dim", self.z2_dim),
            ("image channels", self.image_shape[0]),
        ];
        for (name, value) in dims {
            if value <= 0 {
                return Err(SlacError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if self.image_shape[1] != IMAGE_SIZE || self.image_shape[2] != IMAGE_SIZE {
            return Err(SlacError::InvalidConfig(format!(
                "image must be {}x{}, got {}x{}",
                IMAGE_SIZE, IMAGE_SIZE, self.image_shape[1], self.image_shape[2]
            )));
        }

        if let Some(&bad) = self.hidden_units.iter().find(|&&h| h <= 0) {
            return Err(SlacError::InvalidConfig(format!(
                "hidden units must be positive, got {}",
                bad
            )));
        }

        if !(self.decoder_std.is_finite() && self.decoder_std > 0.0) {
            return Err(SlacError::InvalidConfig(format!(
                "decoder_std must be positive, got {}",
                self.decoder_std
            )));
        }

        Ok(())
    }
}
