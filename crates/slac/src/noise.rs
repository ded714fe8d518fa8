//! Sources of standard-normal noise for reparameterised sampling.
//!
//! Every sampling routine of the latent model takes a `&mut dyn NoiseSource`
//! instead of reaching for libtorch's global generator, so a trajectory is a
//! deterministic function of the parameters, the inputs and the noise seed.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tch::{Device, Kind, Tensor};

/// Produces `N(0, I)` tensors of a requested shape.
pub trait NoiseSource {
    fn standard_normal(&mut self, size: &[i64], kind: Kind, device: Device) -> Tensor;

    /// Noise shaped like `reference`.
    fn standard_normal_like(&mut self, reference: &Tensor) -> Tensor {
        self.standard_normal(&reference.size(), reference.kind(), reference.device())
    }
}

/// Noise drawn on the host from a seeded `StdRng`.
pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_rng(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl NoiseSource for SeededNoise {
    fn standard_normal(&mut self, size: &[i64], kind: Kind, device: Device) -> Tensor {
        let numel: i64 = size.iter().product();
        let values: Vec<f32> = (0..numel)
            .map(|_| StandardNormal.sample(&mut self.rng))
            .collect();
        Tensor::from_slice(&values)
            .reshape(size)
            .to_kind(kind)
            .to_device(device)
    }
}

/// Noise from libtorch's generator on the target device.
///
/// Faster on accelerators; reproducible only through `tch::manual_seed`.
#[derive(Default)]
pub struct TorchNoise;

impl NoiseSource for TorchNoise {
    fn standard_normal(&mut self, size: &[i64], kind: Kind, device: Device) -> Tensor {
        Tensor::randn(size, (kind, device))
    }
}

/// All-zero noise. Samples collapse onto the distribution mean.
#[derive(Default)]
pub struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn standard_normal(&mut self, size: &[i64], kind: Kind, device: Device) -> Tensor {
        Tensor::zeros(size, (kind, device))
    }
}
