//! Trainer configuration.

use serde::{Deserialize, Serialize};
use tch::Device;

/// Configuration for the latent model trainer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Adam learning rate
    pub learning_rate: f64,
    /// Weight of the KL divergence term
    pub kl_coef: f64,
    /// Weight of the image reconstruction term
    pub image_coef: f64,
    /// Weight of the reward prediction term
    pub reward_coef: f64,
    /// Maximum global gradient norm (0.0 to disable)
    pub max_grad_norm: f64,
    /// Log metrics every N updates
    pub log_interval: u64,
    /// Seed for reparameterisation noise
    pub noise_seed: u64,
    /// Show a progress bar while training
    pub show_progress: bool,

    /// Device to train on
    #[serde(skip, default = "default_device")]
    pub device: Device,
}

fn default_device() -> Device {
    Device::Cpu
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: std::env::var("SLAC_LATENT_LR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1e-4),
            kl_coef: 1.0,
            image_coef: 1.0,
            reward_coef: 1.0,
            max_grad_norm: 0.0,
            log_interval: 10,
            noise_seed: 0,
            show_progress: false,
            device: Device::Cpu,
        }
    }
}

impl TrainerConfig {
    /// Create config for CUDA device
    pub fn cuda(mut self) -> Self {
        self.device = Device::Cuda(0);
        self
    }

    /// Set learning rate
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set loss weights
    pub fn with_loss_coefs(mut self, kl: f64, image: f64, reward: f64) -> Self {
        self.kl_coef = kl;
        self.image_coef = image;
        self.reward_coef = reward;
        self
    }

    /// Set gradient clipping threshold
    pub fn with_max_grad_norm(mut self, max_grad_norm: f64) -> Self {
        self.max_grad_norm = max_grad_norm;
        self
    }

    /// Set noise seed
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = TrainerConfig::default()
            .with_lr(3e-4)
            .with_loss_coefs(0.5, 1.0, 2.0)
            .with_max_grad_norm(10.0);
        assert_eq!(config.learning_rate, 3e-4);
        assert_eq!(config.kl_coef, 0.5);
        assert_eq!(config.reward_coef, 2.0);
        assert_eq!(config.max_grad_norm, 10.0);
    }

    #[test]
    fn test_json_roundtrip_keeps_device_default() {
        let config = TrainerConfig::default().with_noise_seed(5);
        let json = serde_json::to_string(&config).unwrap();
        let restored: TrainerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.noise_seed, 5);
        assert_eq!(restored.device, Device::Cpu);
    }
}
