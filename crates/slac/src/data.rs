//! Sequence batches consumed by the latent model.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal, Uniform};
use tch::{Device, Kind, Tensor};

use crate::config::LatentConfig;
use crate::{Result, SlacError};

/// A batch of `B` sequences with `T` transitions each.
///
/// | field          | shape                    |
/// |----------------|--------------------------|
/// | `observations` | `[B, T + 1, C, H, W]`    |
/// | `tactile`      | `[B, T + 1, tactile_dim]`|
/// | `actions`      | `[B, T, action_dim]`     |
/// | `rewards`      | `[B, T, 1]`              |
/// | `dones`        | `[B, T, 1]`              |
#[derive(Debug)]
pub struct SequenceBatch {
    observations: Tensor,
    tactile: Tensor,
    actions: Tensor,
    rewards: Tensor,
    dones: Tensor,
}

impl SequenceBatch {
    /// Validate shapes against each other and build the batch.
    pub fn new(
        observations: Tensor,
        tactile: Tensor,
        actions: Tensor,
        rewards: Tensor,
        dones: Tensor,
    ) -> Result<Self> {
        let (b, t) = match actions.size().as_slice() {
            [b, t, _] if *t >= 1 => (*b, *t),
            _ => {
                return Err(SlacError::shape(
                    "batch actions",
                    vec![-1, -1, -1],
                    actions.size(),
                ))
            }
        };

        let obs_size = observations.size();
        if obs_size.len() != 5 || obs_size[0] != b || obs_size[1] != t + 1 {
            return Err(SlacError::shape(
                "batch observations",
                vec![b, t + 1, -1, -1, -1],
                obs_size,
            ));
        }

        let tactile_size = tactile.size();
        if tactile_size.len() != 3 || tactile_size[0] != b || tactile_size[1] != t + 1 {
            return Err(SlacError::shape(
                "batch tactile",
                vec![b, t + 1, -1],
                tactile_size,
            ));
        }

        for (context, tensor) in [("batch rewards", &rewards), ("batch dones", &dones)] {
            if tensor.size() != [b, t, 1] {
                return Err(SlacError::shape(context, vec![b, t, 1], tensor.size()));
            }
        }

        Ok(Self {
            observations,
            tactile,
            actions,
            rewards,
            dones,
        })
    }

    /// Random batch shaped for `config`: uniform pixels in `[0, 1)`, Gaussian
    /// tactile readings, actions in `[-1, 1)`, Gaussian rewards and no
    /// terminations.
    pub fn synthetic<R: Rng + ?Sized>(
        config: &LatentConfig,
        batch_size: i64,
        seq_len: i64,
        rng: &mut R,
        device: Device,
    ) -> Result<Self> {
        let [c, h, w] = config.image_shape;
        let unit = Uniform::new(0.0f32, 1.0);
        let symmetric = Uniform::new(-1.0f32, 1.0);

        let observations =
            random_tensor(rng, unit, &[batch_size, seq_len + 1, c, h, w], device);
        let tactile = random_tensor(
            rng,
            StandardNormal,
            &[batch_size, seq_len + 1, config.tactile_dim],
            device,
        );
        let actions = random_tensor(
            rng,
            symmetric,
            &[batch_size, seq_len, config.action_dim],
            device,
        );
        let rewards = random_tensor(rng, StandardNormal, &[batch_size, seq_len, 1], device);
        let dones = Tensor::zeros([batch_size, seq_len, 1], (Kind::Float, device));

        Self::new(observations, tactile, actions, rewards, dones)
    }

    pub fn observations(&self) -> &Tensor {
        &self.observations
    }

    pub fn tactile(&self) -> &Tensor {
        &self.tactile
    }

    pub fn actions(&self) -> &Tensor {
        &self.actions
    }

    pub fn rewards(&self) -> &Tensor {
        &self.rewards
    }

    pub fn dones(&self) -> &Tensor {
        &self.dones
    }

    pub fn batch_size(&self) -> i64 {
        self.actions.size()[0]
    }

    /// Number of transitions `T`.
    pub fn seq_len(&self) -> i64 {
        self.actions.size()[1]
    }

    /// Replace the termination flags.
    pub fn with_dones(self, dones: Tensor) -> Result<Self> {
        Self::new(
            self.observations,
            self.tactile,
            self.actions,
            self.rewards,
            dones,
        )
    }

    /// Replace the reward targets.
    pub fn with_rewards(self, rewards: Tensor) -> Result<Self> {
        Self::new(
            self.observations,
            self.tactile,
            self.actions,
            rewards,
            self.dones,
        )
    }

    /// Move every tensor to `device`.
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            observations: self.observations.to_device(device),
            tactile: self.tactile.to_device(device),
            actions: self.actions.to_device(device),
            rewards: self.rewards.to_device(device),
            dones: self.dones.to_device(device),
        }
    }
}

fn random_tensor<R, D>(rng: &mut R, dist: D, size: &[i64], device: Device) -> Tensor
where
    R: Rng + ?Sized,
    D: Distribution<f32>,
{
    let numel: i64 = size.iter().product();
    let values: Vec<f32> = (0..numel).map(|_| dist.sample(rng)).collect();
    Tensor::from_slice(&values).reshape(size).to_device(device)
}

impl Clone for SequenceBatch {
    fn clone(&self) -> Self {
        Self {
            observations: self.observations.shallow_clone(),
            tactile: self.tactile.shallow_clone(),
            actions: self.actions.shallow_clone(),
            rewards: self.rewards.shallow_clone(),
            dones: self.dones.shallow_clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn zeros(size: &[i64]) -> Tensor {
        Tensor::zeros(size, (Kind::Float, Device::Cpu))
    }

    #[test]
    fn test_synthetic_shapes() {
        let config = LatentConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let batch = SequenceBatch::synthetic(&config, 2, 3, &mut rng, Device::Cpu).unwrap();

        assert_eq!(batch.observations().size(), vec![2, 4, 3, 84, 84]);
        assert_eq!(batch.tactile().size(), vec![2, 4, 6]);
        assert_eq!(batch.actions().size(), vec![2, 3, 4]);
        assert_eq!(batch.rewards().size(), vec![2, 3, 1]);
        assert_eq!(batch.dones().size(), vec![2, 3, 1]);
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.seq_len(), 3);

        let max = batch.observations().max().double_value(&[]);
        let min = batch.observations().min().double_value(&[]);
        assert!((0.0..1.0).contains(&min) && (0.0..1.0).contains(&max));
    }

    #[test]
    fn test_synthetic_is_seeded() {
        let config = LatentConfig::default();
        let a = SequenceBatch::synthetic(&config, 1, 2, &mut StdRng::seed_from_u64(4), Device::Cpu)
            .unwrap();
        let b = SequenceBatch::synthetic(&config, 1, 2, &mut StdRng::seed_from_u64(4), Device::Cpu)
            .unwrap();
        assert!(a.observations().equal(b.observations()));
        assert!(a.actions().equal(b.actions()));
    }

    #[test]
    fn test_rejects_observation_length() {
        let result = SequenceBatch::new(
            zeros(&[2, 3, 3, 84, 84]),
            zeros(&[2, 4, 6]),
            zeros(&[2, 3, 4]),
            zeros(&[2, 3, 1]),
            zeros(&[2, 3, 1]),
        );
        assert!(matches!(result, Err(SlacError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_rejects_reward_shape() {
        let result = SequenceBatch::new(
            zeros(&[2, 4, 3, 84, 84]),
            zeros(&[2, 4, 6]),
            zeros(&[2, 3, 4]),
            zeros(&[2, 3]),
            zeros(&[2, 3, 1]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty_sequences() {
        let result = SequenceBatch::new(
            zeros(&[2, 1, 3, 84, 84]),
            zeros(&[2, 1, 6]),
            zeros(&[2, 0, 4]),
            zeros(&[2, 0, 1]),
            zeros(&[2, 0, 1]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_with_dones_revalidates() {
        let config = LatentConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let batch = SequenceBatch::synthetic(&config, 2, 3, &mut rng, Device::Cpu).unwrap();
        assert!(batch.clone().with_dones(zeros(&[2, 3, 1]).ones_like()).is_ok());
        assert!(batch.with_dones(zeros(&[2, 2, 1])).is_err());
    }
}
