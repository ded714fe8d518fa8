//! End-to-end tests of the latent model on full-size observations.

use slac::prelude::*;
use slac::network::MIN_STD;
use slac::SlacError;
use tch::{Kind, Tensor};

const BATCH: i64 = 2;
const STEPS: i64 = 3;

fn batch(config: &LatentConfig, seed: u64) -> SequenceBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    SequenceBatch::synthetic(config, BATCH, STEPS, &mut rng, Device::Cpu).unwrap()
}

fn scalars(loss: &LatentLoss) -> [f64; 3] {
    [
        loss.kld.double_value(&[]),
        loss.image.double_value(&[]),
        loss.reward.double_value(&[]),
    ]
}

#[test]
fn test_loss_is_three_finite_scalars() {
    let config = LatentConfig::default();
    let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
    let loss = model
        .calculate_loss(&batch(&config, 0), &mut SeededNoise::new(1))
        .unwrap();

    for term in [&loss.kld, &loss.image, &loss.reward] {
        assert_eq!(term.dim(), 0);
    }
    let [kld, image, reward] = scalars(&loss);
    assert!(kld.is_finite() && kld >= 0.0);
    assert!(image.is_finite());
    assert!(reward.is_finite());
}

#[test]
fn test_identical_seeds_give_identical_losses() {
    let config = LatentConfig::default().with_init_seed(11);
    let data = batch(&config, 5);

    let first = LatentModel::new(config.clone(), Device::Cpu)
        .unwrap()
        .calculate_loss(&data, &mut SeededNoise::new(3))
        .unwrap();
    let second = LatentModel::new(config, Device::Cpu)
        .unwrap()
        .calculate_loss(&data, &mut SeededNoise::new(3))
        .unwrap();

    assert_eq!(scalars(&first), scalars(&second));
}

#[test]
fn test_different_noise_changes_losses() {
    let config = LatentConfig::default();
    let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
    let data = batch(&config, 5);

    let a = model.calculate_loss(&data, &mut SeededNoise::new(1)).unwrap();
    let b = model.calculate_loss(&data, &mut SeededNoise::new(2)).unwrap();
    assert_ne!(scalars(&a)[0], scalars(&b)[0]);
}

#[test]
fn test_all_done_sequences_have_zero_reward_loss() {
    let config = LatentConfig::default();
    let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
    let data = batch(&config, 0);
    let dones = data.dones().ones_like();
    let data = data.with_dones(dones).unwrap();

    let loss = model.calculate_loss(&data, &mut SeededNoise::new(0)).unwrap();
    assert_eq!(loss.reward.double_value(&[]), 0.0);
}

#[test]
fn test_rewards_at_done_steps_are_ignored() {
    let config = LatentConfig::default();
    let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();

    // Last transition of every sequence terminates.
    let dones = Tensor::zeros([BATCH, STEPS, 1], (Kind::Float, Device::Cpu));
    let _ = dones.narrow(1, STEPS - 1, 1).fill_(1.0);
    let data = batch(&config, 0).with_dones(dones).unwrap();

    let rewards = data.rewards().copy();
    let _ = rewards.narrow(1, STEPS - 1, 1).fill_(1000.0);
    let altered = data.clone().with_rewards(rewards).unwrap();

    let a = model.calculate_loss(&data, &mut SeededNoise::new(9)).unwrap();
    let b = model.calculate_loss(&altered, &mut SeededNoise::new(9)).unwrap();
    assert_eq!(a.reward.double_value(&[]), b.reward.double_value(&[]));
}

#[test]
fn test_posterior_rejects_features_without_final_step() {
    let config = LatentConfig::default();
    let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();

    let actions = Tensor::zeros([BATCH, STEPS, config.action_dim], (Kind::Float, Device::Cpu));
    let features = Tensor::zeros(
        [BATCH, STEPS, config.feature_dim()],
        (Kind::Float, Device::Cpu),
    );

    let result = model.sample_posterior(&features, &actions, &mut ZeroNoise);
    assert!(matches!(result, Err(SlacError::ShapeMismatch { .. })));
}

#[test]
fn test_stds_stay_above_floor() {
    let floor = MIN_STD as f32 as f64;
    let config = LatentConfig::default();
    let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
    let data = batch(&config, 2);
    let mut noise = SeededNoise::new(4);

    let features = model.encode(data.observations(), data.tactile()).unwrap();
    let post = model
        .sample_posterior(&features, data.actions(), &mut noise)
        .unwrap();
    let prior = model.sample_prior(data.actions(), &mut noise).unwrap();

    assert_eq!(post.z1.size(), vec![BATCH, STEPS + 1, config.z1_dim]);
    assert_eq!(post.z2.size(), vec![BATCH, STEPS + 1, config.z2_dim]);
    assert_eq!(prior.z1_mean.size(), vec![BATCH, STEPS + 1, config.z1_dim]);

    assert!(post.z1_std.min().double_value(&[]) >= floor);
    // The first prior step is the fixed unit Gaussian.
    let rest = prior.z1_std.narrow(1, 1, STEPS);
    assert!(rest.min().double_value(&[]) >= floor);
    assert!(prior
        .z1_std
        .select(1, 0)
        .allclose(&Tensor::ones([BATCH, config.z1_dim], (Kind::Float, Device::Cpu)), 0.0, 0.0, false));
}

#[test]
fn test_reconstruction_matches_observation_shape() {
    let config = LatentConfig::default();
    let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
    let data = batch(&config, 0);

    let features = model.encode(data.observations(), data.tactile()).unwrap();
    let post = model
        .sample_posterior(&features, data.actions(), &mut ZeroNoise)
        .unwrap();
    let image = model.decode(&post.latents()).unwrap();

    assert_eq!(image.mean.size(), data.observations().size());
    let expected_std = config.decoder_std;
    let std = image.std.mean(Kind::Float).double_value(&[]);
    assert!((std - expected_std).abs() < 1e-6);
}

#[test]
fn test_trainer_runs_on_full_size_batches() {
    let config = LatentConfig::default();
    let model = LatentModel::new(config.clone(), Device::Cpu).unwrap();
    let mut trainer = LatentTrainer::new(model, TrainerConfig::default().with_max_grad_norm(100.0))
        .unwrap();

    let stats = trainer.train(2, |i| Ok(batch(&config, i))).unwrap();
    assert_eq!(trainer.global_step(), 2);
    assert!(stats.total.is_finite());
}
