//! Gradient updates for the latent model.

use std::collections::HashMap;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tch::nn::OptimizerConfig;
use tch::{nn, Kind};

use super::config::TrainerConfig;
use crate::data::SequenceBatch;
use crate::log::{MetricLogger, NoOpLogger};
use crate::network::LatentModel;
use crate::noise::SeededNoise;
use crate::{Result, SlacError};

/// Scalar summary of one update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LossStats {
    pub kld: f64,
    pub image: f64,
    pub reward: f64,
    /// Weighted sum that was backpropagated
    pub total: f64,
    /// Global gradient norm before clipping
    pub grad_norm: f64,
}

impl LossStats {
    pub fn to_metrics(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("loss_kld".to_string(), self.kld),
            ("loss_image".to_string(), self.image),
            ("loss_reward".to_string(), self.reward),
            ("loss_total".to_string(), self.total),
            ("grad_norm".to_string(), self.grad_norm),
        ])
    }
}

/// Adam trainer over the full variational objective.
pub struct LatentTrainer {
    config: TrainerConfig,
    model: LatentModel,
    optimizer: nn::Optimizer,
    noise: SeededNoise,
    logger: Box<dyn MetricLogger>,
    global_step: u64,
    start_time: Instant,
}

impl LatentTrainer {
    pub fn new(model: LatentModel, config: TrainerConfig) -> Result<Self> {
        let optimizer = nn::Adam::default().build(model.var_store(), config.learning_rate)?;
        let noise = SeededNoise::new(config.noise_seed);

        Ok(Self {
            config,
            model,
            optimizer,
            noise,
            logger: Box::new(NoOpLogger),
            global_step: 0,
            start_time: Instant::now(),
        })
    }

    /// Route per-update metrics to `logger`.
    pub fn with_logger(mut self, logger: Box<dyn MetricLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn model(&self) -> &LatentModel {
        &self.model
    }

    /// Give the trained model back.
    pub fn into_model(self) -> LatentModel {
        self.logger.close();
        self.model
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Updates per second since construction
    pub fn ups(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.global_step as f64 / elapsed
        } else {
            0.0
        }
    }

    /// One Adam step on `batch`.
    pub fn update(&mut self, batch: &SequenceBatch) -> Result<LossStats> {
        let device = self.model.device();
        let batch = batch.to_device(device);

        let losses = self.model.calculate_loss(&batch, &mut self.noise)?;
        let loss = losses.weighted_sum(
            self.config.kl_coef,
            self.config.image_coef,
            self.config.reward_coef,
        );

        let mut stats = LossStats {
            kld: losses.kld.double_value(&[]),
            image: losses.image.double_value(&[]),
            reward: losses.reward.double_value(&[]),
            total: loss.double_value(&[]),
            grad_norm: 0.0,
        };

        if !stats.total.is_finite() {
            tracing::warn!(
                step = self.global_step,
                kld = stats.kld,
                image = stats.image,
                reward = stats.reward,
                "Non-finite latent loss, skipping update"
            );
            return Err(SlacError::TrainingError(format!(
                "non-finite loss at step {}",
                self.global_step
            )));
        }

        self.optimizer.zero_grad();
        loss.backward();
        stats.grad_norm = self.clip_gradients();
        self.optimizer.step();

        self.global_step += 1;
        if self.config.log_interval > 0 && self.global_step % self.config.log_interval == 0 {
            self.logger.log_metrics(&stats.to_metrics(), self.global_step);
        }

        Ok(stats)
    }

    /// Run `num_updates` updates, pulling a batch for each from `next_batch`.
    /// Returns the stats of the last update.
    pub fn train<F>(&mut self, num_updates: u64, mut next_batch: F) -> Result<LossStats>
    where
        F: FnMut(u64) -> Result<SequenceBatch>,
    {
        let progress = if self.config.show_progress && num_updates > 0 {
            let pb = ProgressBar::new(num_updates);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .map_err(|e| SlacError::TrainingError(e.to_string()))?
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut last = LossStats::default();
        for i in 0..num_updates {
            let batch = next_batch(i)?;
            last = self.update(&batch)?;

            if let Some(pb) = &progress {
                pb.inc(1);
                pb.set_message(format!(
                    "KL: {:.3} Image: {:.1} Reward: {:.3}",
                    last.kld, last.image, last.reward
                ));
            } else if self.config.log_interval > 0 && self.global_step % self.config.log_interval == 0 {
                tracing::info!(
                    step = self.global_step,
                    ups = self.ups(),
                    loss = last.total,
                    "Training progress"
                );
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("done");
        }

        Ok(last)
    }

    /// Scale gradients so their global norm is at most `max_grad_norm`.
    /// Returns the norm before clipping.
    fn clip_gradients(&self) -> f64 {
        let variables = self.model.var_store().trainable_variables();

        let mut global_norm = 0.0f64;
        for var in &variables {
            let grad = var.grad();
            if grad.defined() {
                global_norm += grad
                    .pow_tensor_scalar(2.0)
                    .sum(Kind::Float)
                    .double_value(&[]);
            }
        }
        global_norm = global_norm.sqrt();

        let max_norm = self.config.max_grad_norm;
        if max_norm > 0.0 && global_norm > max_norm {
            let clip_coef = max_norm / (global_norm + 1e-6);
            for var in &variables {
                let mut grad = var.grad();
                if grad.defined() {
                    let _ = grad.f_mul_scalar_(clip_coef);
                }
            }
        }

        global_norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LatentConfig;
    use crate::log::RecordingLogger;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use tch::Device;

    fn small_config() -> LatentConfig {
        LatentConfig {
            action_dim: 2,
            img_feature_dim: 16,
            tactile_latent_dim: 8,
            z1_dim: 4,
            z2_dim: 8,
            hidden_units: vec![16],
            ..Default::default()
        }
    }

    fn batch(config: &LatentConfig, seed: u64) -> SequenceBatch {
        let mut rng = StdRng::seed_from_u64(seed);
        SequenceBatch::synthetic(config, 2, 2, &mut rng, Device::Cpu).unwrap()
    }

    #[test]
    fn test_update_changes_parameters() {
        let config = small_config();
        let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
        let before = model.var_store().variables()["reward.out.weight"].copy();

        let mut trainer = LatentTrainer::new(model, TrainerConfig::default().with_lr(1e-3)).unwrap();
        let stats = trainer.update(&batch(&config, 0)).unwrap();

        assert!(stats.total.is_finite());
        assert!(stats.grad_norm > 0.0);
        assert_eq!(trainer.global_step(), 1);

        let after = &trainer.model().var_store().variables()["reward.out.weight"];
        assert!(!before.equal(after));
    }

    #[test]
    fn test_gradient_clipping_bounds_norm() {
        let config = small_config();
        let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
        let mut trainer =
            LatentTrainer::new(model, TrainerConfig::default().with_max_grad_norm(1e-3)).unwrap();

        let batch = batch(&config, 1);
        let losses = trainer
            .model
            .calculate_loss(&batch, &mut trainer.noise)
            .unwrap();
        trainer.optimizer.zero_grad();
        losses.total().backward();
        let before = trainer.clip_gradients();

        let mut after = 0.0f64;
        for var in trainer.model.var_store().trainable_variables() {
            let grad = var.grad();
            if grad.defined() {
                after += grad.pow_tensor_scalar(2.0).sum(Kind::Float).double_value(&[]);
            }
        }
        assert!(before > 1e-3);
        assert!(after.sqrt() <= 1e-3 * 1.01);
    }

    #[test]
    fn test_train_logs_at_interval() {
        let config = small_config();
        let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
        let recorder = Arc::new(RecordingLogger::new());
        let trainer_config = TrainerConfig {
            log_interval: 2,
            ..TrainerConfig::default()
        };
        let mut trainer = LatentTrainer::new(model, trainer_config)
            .unwrap()
            .with_logger(Box::new(Arc::clone(&recorder)));

        let last = trainer.train(4, |i| Ok(batch(&config, i))).unwrap();

        assert_eq!(trainer.global_step(), 4);
        let steps: Vec<u64> = recorder.series("loss_total").iter().map(|p| p.0).collect();
        assert_eq!(steps, vec![2, 4]);
        assert_eq!(recorder.last("loss_total"), Some(last.total));
    }

    #[test]
    fn test_image_loss_decreases_on_fixed_batch() {
        let config = small_config();
        let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
        let trainer_config = TrainerConfig::default()
            .with_lr(1e-3)
            .with_loss_coefs(0.0, 1.0, 0.0);
        let mut trainer = LatentTrainer::new(model, trainer_config).unwrap();

        let fixed = batch(&config, 3);
        let first = trainer.update(&fixed).unwrap().image;
        let mut last = first;
        for _ in 0..20 {
            last = trainer.update(&fixed).unwrap().image;
        }
        assert!(last < first, "image loss {} -> {}", first, last);
    }

    #[test]
    fn test_train_propagates_batch_errors() {
        let config = small_config();
        let model = LatentModel::new(config, Device::Cpu).unwrap();
        let mut trainer = LatentTrainer::new(model, TrainerConfig::default()).unwrap();

        let result = trainer.train(3, |_| Err(SlacError::TrainingError("no data".into())));
        assert!(result.is_err());
        assert_eq!(trainer.global_step(), 0);
    }
}
