//! Diagonal Gaussian distributions.

use tch::Tensor;

use crate::noise::NoiseSource;

/// Offset added to the standard deviation before dividing by it.
pub const LIKELIHOOD_EPS: f64 = 1e-8;

/// Mean and standard deviation of a diagonal Gaussian. Both tensors share a shape.
#[derive(Debug)]
pub struct DiagGaussian {
    pub mean: Tensor,
    pub std: Tensor,
}

impl Clone for DiagGaussian {
    fn clone(&self) -> Self {
        Self {
            mean: self.mean.shallow_clone(),
            std: self.std.shallow_clone(),
        }
    }
}

impl DiagGaussian {
    pub fn new(mean: Tensor, std: Tensor) -> Self {
        Self { mean, std }
    }

    /// Reparameterised sample `mean + eps * std`, differentiable w.r.t. both parameters.
    pub fn rsample(&self, noise: &mut dyn NoiseSource) -> Tensor {
        let eps = noise.standard_normal_like(&self.std);
        &self.mean + eps * &self.std
    }

    /// Elementwise `KL(self || other)`.
    pub fn kl_divergence(&self, other: &DiagGaussian) -> Tensor {
        calculate_kl_divergence(&self.mean, &self.std, &other.mean, &other.std)
    }

    /// Elementwise log density of `x`.
    pub fn log_likelihood(&self, x: &Tensor) -> Tensor {
        gaussian_log_likelihood(x, &self.mean, &self.std)
    }
}

/// Closed-form elementwise `KL(p || q)` between diagonal Gaussians.
pub fn calculate_kl_divergence(
    p_mean: &Tensor,
    p_std: &Tensor,
    q_mean: &Tensor,
    q_std: &Tensor,
) -> Tensor {
    let var_ratio = (p_std / q_std).pow_tensor_scalar(2.0);
    let t1 = ((p_mean - q_mean) / q_std).pow_tensor_scalar(2.0);
    (&var_ratio + t1 - 1.0 - var_ratio.log()) * 0.5
}

/// Elementwise Gaussian log density of `x` under `N(mean, std^2)`.
pub fn gaussian_log_likelihood(x: &Tensor, mean: &Tensor, std: &Tensor) -> Tensor {
    let log_2pi = (2.0 * std::f64::consts::PI).ln();
    let noise = (x - mean) / (std + LIKELIHOOD_EPS);
    noise.pow_tensor_scalar(2.0) * -0.5 - std.log() - 0.5 * log_2pi
}
