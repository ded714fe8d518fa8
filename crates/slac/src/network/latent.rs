//! Stochastic latent variable model.
//!
//! Two latent variables evolve over time: a small fast-changing `z1` and a
//! larger persistent `z2` conditioned on it. The prior path only sees actions,
//! the posterior path additionally sees encoded observations.
//!
//! ```text
//! prior      t = 0   z1 ~ N(0, I)                    z2 ~ p(z2 | z1)
//!            t > 0   z1 ~ p(z1 | z2', a')            z2 ~ p(z2 | z1, z2', a')
//! posterior  t = 0   z1 ~ q(z1 | feat)               z2 ~ p(z2 | z1)
//!            t > 0   z1 ~ q(z1 | feat, z2', a')      z2 ~ p(z2 | z1, z2', a')
//! ```
//!
//! where `'` denotes the previous step. The z2 transitions are the same
//! network instances under prior and posterior.

use std::collections::BTreeMap;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::{nn, Device, Kind, Tensor};

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::gaussian::{ConditionalGaussian, FixedGaussian, Gaussian};
use super::init::initialize_weights;
use crate::config::LatentConfig;
use crate::data::SequenceBatch;
use crate::distribution::{calculate_kl_divergence, gaussian_log_likelihood, DiagGaussian};
use crate::noise::NoiseSource;
use crate::{Result, SlacError};

/// Prior z1 distribution over `T + 1` steps.
#[derive(Debug)]
pub struct PriorSample {
    /// `[B, T + 1, z1_dim]`
    pub z1_mean: Tensor,
    /// `[B, T + 1, z1_dim]`
    pub z1_std: Tensor,
}

/// Posterior z1 distribution and the sampled latent trajectory over `T + 1` steps.
#[derive(Debug)]
pub struct PosteriorSample {
    /// `[B, T + 1, z1_dim]`
    pub z1_mean: Tensor,
    /// `[B, T + 1, z1_dim]`
    pub z1_std: Tensor,
    /// `[B, T + 1, z1_dim]`
    pub z1: Tensor,
    /// `[B, T + 1, z2_dim]`
    pub z2: Tensor,
}

impl PosteriorSample {
    /// `[B, T + 1, z1_dim + z2_dim]`
    pub fn latents(&self) -> Tensor {
        Tensor::cat(&[&self.z1, &self.z2], -1)
    }
}

/// The three terms of the variational objective. Each is a scalar tensor
/// attached to the autograd graph.
#[derive(Debug)]
pub struct LatentLoss {
    pub kld: Tensor,
    pub image: Tensor,
    pub reward: Tensor,
}

impl LatentLoss {
    pub fn weighted_sum(&self, kl_coef: f64, image_coef: f64, reward_coef: f64) -> Tensor {
        &self.kld * kl_coef + &self.image * image_coef + &self.reward * reward_coef
    }

    pub fn total(&self) -> Tensor {
        self.weighted_sum(1.0, 1.0, 1.0)
    }
}

/// One transition: the z1 distribution it was drawn from plus both samples.
struct Step {
    z1_dist: DiagGaussian,
    z1: Tensor,
    z2: Tensor,
}

/// Latent dynamics, observation and reward model.
pub struct LatentModel {
    vs: nn::VarStore,
    config: LatentConfig,

    // p(z1(0)) = N(0, I)
    z1_prior_init: FixedGaussian,
    // p(z2(0) | z1(0))
    z2_prior_init: Rc<Gaussian>,
    // p(z1(t+1) | z2(t), a(t))
    z1_prior: Gaussian,
    // p(z2(t+1) | z1(t+1), z2(t), a(t))
    z2_prior: Rc<Gaussian>,

    // q(z1(0) | feat(0))
    z1_posterior_init: Gaussian,
    // q(z2(0) | z1(0)) = p(z2(0) | z1(0))
    z2_posterior_init: Rc<Gaussian>,
    // q(z1(t+1) | feat(t+1), z2(t), a(t))
    z1_posterior: Gaussian,
    // q(z2(t+1) | z1(t+1), z2(t), a(t)) = p(z2(t+1) | z1(t+1), z2(t), a(t))
    z2_posterior: Rc<Gaussian>,

    // p(r(t) | z1(t), z2(t), a(t), z1(t+1), z2(t+1))
    reward: Gaussian,

    encoder: Encoder,
    decoder: Decoder,
}

impl LatentModel {
    /// Build every network on a fresh `VarStore` and initialise the parameters
    /// from `config.init_seed`.
    pub fn new(config: LatentConfig, device: Device) -> Result<Self> {
        config.validate()?;

        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let hidden = config.hidden_units.as_slice();
        let (z1, z2, a, f) = (
            config.z1_dim,
            config.z2_dim,
            config.action_dim,
            config.feature_dim(),
        );

        let z1_prior_init = FixedGaussian::new(z1, 1.0);
        let z2_prior_init = Rc::new(Gaussian::new(&(&root / "z2_prior_init"), z1, z2, hidden));
        let z1_prior = Gaussian::new(&(&root / "z1_prior"), z2 + a, z1, hidden);
        let z2_prior = Rc::new(Gaussian::new(&(&root / "z2_prior"), z1 + z2 + a, z2, hidden));

        let z1_posterior_init = Gaussian::new(&(&root / "z1_posterior_init"), f, z1, hidden);
        let z1_posterior = Gaussian::new(&(&root / "z1_posterior"), f + z2 + a, z1, hidden);

        let reward = Gaussian::new(&(&root / "reward"), 2 * z1 + 2 * z2 + a, 1, hidden);

        let encoder = Encoder::new(&(&root / "encoder"), &config);
        let decoder = Decoder::new(&(&root / "decoder"), &config);

        initialize_weights(&vs, &mut StdRng::seed_from_u64(config.init_seed));

        let model = Self {
            z2_posterior_init: Rc::clone(&z2_prior_init),
            z2_posterior: Rc::clone(&z2_prior),
            vs,
            config,
            z1_prior_init,
            z2_prior_init,
            z1_prior,
            z2_prior,
            z1_posterior_init,
            z1_posterior,
            reward,
            encoder,
            decoder,
        };

        tracing::debug!(
            parameters = model.num_parameters(),
            z1_dim = z1,
            z2_dim = z2,
            feature_dim = f,
            "Built latent model"
        );

        Ok(model)
    }

    pub fn config(&self) -> &LatentConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    /// Get the variable store for optimization
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Get mutable variable store
    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    /// Get the number of parameters
    pub fn num_parameters(&self) -> i64 {
        self.vs.variables().values().map(|v| v.numel() as i64).sum()
    }

    /// Parameter count per top-level network.
    pub fn parameter_breakdown(&self) -> BTreeMap<String, i64> {
        let mut counts = BTreeMap::new();
        for (name, var) in self.vs.variables() {
            let component = name.split('.').next().unwrap_or(&name).to_string();
            *counts.entry(component).or_insert(0) += var.numel() as i64;
        }
        counts
    }

    /// Encode `[B, S, C, H, W]` images and `[B, S, tactile_dim]` readings into
    /// `[B, S, feature_dim]` features.
    pub fn encode(&self, images: &Tensor, tactile: &Tensor) -> Result<Tensor> {
        self.encoder.forward(images, tactile)
    }

    /// Decode `[B, S, z1_dim + z2_dim]` latents into an image distribution.
    pub fn decode(&self, latents: &Tensor) -> Result<DiagGaussian> {
        self.decoder.forward(latents)
    }

    /// Roll the prior forward under `actions` (`[B, T, action_dim]`).
    pub fn sample_prior(
        &self,
        actions: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Result<PriorSample> {
        let (_, steps) = self.check_actions(actions)?;

        let mut z1_means = Vec::with_capacity(steps as usize + 1);
        let mut z1_stds = Vec::with_capacity(steps as usize + 1);

        let mut step = self.prior_init_step(actions, noise);
        z1_means.push(step.z1_dist.mean.shallow_clone());
        z1_stds.push(step.z1_dist.std.shallow_clone());

        for t in 1..=steps {
            let action = actions.select(1, t - 1);
            step = self.prior_step(&step.z2, &action, noise);
            z1_means.push(step.z1_dist.mean.shallow_clone());
            z1_stds.push(step.z1_dist.std.shallow_clone());
        }

        Ok(PriorSample {
            z1_mean: Tensor::stack(&z1_means, 1),
            z1_std: Tensor::stack(&z1_stds, 1),
        })
    }

    /// Infer latents from `features` (`[B, T + 1, feature_dim]`) and `actions`
    /// (`[B, T, action_dim]`).
    pub fn sample_posterior(
        &self,
        features: &Tensor,
        actions: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Result<PosteriorSample> {
        let (batch, steps) = self.check_actions(actions)?;
        let expected = vec![batch, steps + 1, self.config.feature_dim()];
        if features.size() != expected {
            return Err(SlacError::shape(
                "posterior features",
                expected,
                features.size(),
            ));
        }

        let capacity = steps as usize + 1;
        let mut z1_means = Vec::with_capacity(capacity);
        let mut z1_stds = Vec::with_capacity(capacity);
        let mut z1s = Vec::with_capacity(capacity);
        let mut z2s = Vec::with_capacity(capacity);

        let mut step = self.posterior_init_step(&features.select(1, 0), noise);
        for t in 0..=steps {
            if t > 0 {
                let action = actions.select(1, t - 1);
                step = self.posterior_step(&features.select(1, t), &step.z2, &action, noise);
            }
            z1_means.push(step.z1_dist.mean.shallow_clone());
            z1_stds.push(step.z1_dist.std.shallow_clone());
            z1s.push(step.z1.shallow_clone());
            z2s.push(step.z2.shallow_clone());
        }

        Ok(PosteriorSample {
            z1_mean: Tensor::stack(&z1_means, 1),
            z1_std: Tensor::stack(&z1_stds, 1),
            z1: Tensor::stack(&z1s, 1),
            z2: Tensor::stack(&z2s, 1),
        })
    }

    /// KL, image reconstruction and reward prediction losses for a batch of
    /// sequences.
    pub fn calculate_loss(
        &self,
        batch: &SequenceBatch,
        noise: &mut dyn NoiseSource,
    ) -> Result<LatentLoss> {
        let actions = batch.actions();
        let (b, steps) = self.check_actions(actions)?;
        let batch_size = b as f64;

        // Calculate the sequence of features.
        let features = self.encode(batch.observations(), batch.tactile())?;

        // Sample from latent variable model.
        let post = self.sample_posterior(&features, actions, noise)?;
        let prior = self.sample_prior(actions, noise)?;

        // KL divergence, summed over time and latent dims, mean over batch.
        let kld = calculate_kl_divergence(&post.z1_mean, &post.z1_std, &prior.z1_mean, &prior.z1_std)
            .sum(Kind::Float)
            / batch_size;

        // Prediction loss of images.
        let z = post.latents();
        let image_dist = self.decode(&z)?;
        let image = -(image_dist.log_likelihood(batch.observations()).sum(Kind::Float) / batch_size);

        // Prediction loss of rewards.
        let x = Tensor::cat(&[&z.narrow(1, 0, steps), actions, &z.narrow(1, 1, steps)], -1);
        let width = x.size()[2];
        let reward_dist = self.reward.forward(&x.reshape([b * steps, width]));
        let reward_mean = reward_dist.mean.reshape([b, steps, 1]);
        let reward_std = reward_dist.std.reshape([b, steps, 1]);
        let dones = batch.dones();
        let alive = dones.ones_like() - dones;
        let reward_ll = gaussian_log_likelihood(batch.rewards(), &reward_mean, &reward_std) * alive;
        let reward = -(reward_ll.sum(Kind::Float) / batch_size);

        Ok(LatentLoss { kld, image, reward })
    }

    fn check_actions(&self, actions: &Tensor) -> Result<(i64, i64)> {
        match actions.size().as_slice() {
            [b, t, a] if *a == self.config.action_dim => Ok((*b, *t)),
            _ => Err(SlacError::shape(
                "actions",
                vec![-1, -1, self.config.action_dim],
                actions.size(),
            )),
        }
    }

    fn prior_init_step(&self, reference: &Tensor, noise: &mut dyn NoiseSource) -> Step {
        let z1_dist = self.z1_prior_init.forward(reference);
        let z1 = z1_dist.rsample(noise);
        let z2 = self.z2_prior_init.forward(&z1).rsample(noise);
        Step { z1_dist, z1, z2 }
    }

    fn prior_step(&self, z2: &Tensor, action: &Tensor, noise: &mut dyn NoiseSource) -> Step {
        let z1_dist = self.z1_prior.forward(&Tensor::cat(&[z2, action], 1));
        let z1 = z1_dist.rsample(noise);
        let z2 = self
            .z2_prior
            .forward(&Tensor::cat(&[&z1, z2, action], 1))
            .rsample(noise);
        Step { z1_dist, z1, z2 }
    }

    fn posterior_init_step(&self, feature: &Tensor, noise: &mut dyn NoiseSource) -> Step {
        let z1_dist = self.z1_posterior_init.forward(feature);
        let z1 = z1_dist.rsample(noise);
        let z2 = self.z2_posterior_init.forward(&z1).rsample(noise);
        Step { z1_dist, z1, z2 }
    }

    fn posterior_step(
        &self,
        feature: &Tensor,
        z2: &Tensor,
        action: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Step {
        let z1_dist = self
            .z1_posterior
            .forward(&Tensor::cat(&[feature, z2, action], 1));
        let z1 = z1_dist.rsample(noise);
        let z2 = self
            .z2_posterior
            .forward(&Tensor::cat(&[&z1, z2, action], 1))
            .rsample(noise);
        Step { z1_dist, z1, z2 }
    }
}

impl std::fmt::Debug for LatentModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatentModel")
            .field("config", &self.config)
            .field("device", &self.device())
            .field("parameters", &self.num_parameters())
            .finish()
    }
}
