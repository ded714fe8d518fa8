//! Diagonal Gaussian building blocks.

use tch::{nn, nn::Module, Kind, Tensor};

use super::mlp::{build_mlp, softplus, Activation};
use crate::distribution::DiagGaussian;

/// Floor added to every learned standard deviation.
pub const MIN_STD: f64 = 1e-5;

/// Hidden activation of every Gaussian head.
pub const HIDDEN_ACTIVATION: Activation = Activation::LeakyReLU(0.2);

/// A distribution over an output vector, conditioned on an input tensor.
pub trait ConditionalGaussian {
    fn forward(&self, xs: &Tensor) -> DiagGaussian;

    fn output_dim(&self) -> i64;
}

/// `N(0, std^2 I)` regardless of the input. The input only supplies batch size,
/// dtype and device.
#[derive(Debug, Clone, Copy)]
pub struct FixedGaussian {
    output_dim: i64,
    std: f64,
}

impl FixedGaussian {
    pub fn new(output_dim: i64, std: f64) -> Self {
        Self { output_dim, std }
    }

    pub fn std(&self) -> f64 {
        self.std
    }
}

impl ConditionalGaussian for FixedGaussian {
    fn forward(&self, xs: &Tensor) -> DiagGaussian {
        let batch = xs.size()[0];
        let options = (Kind::Float, xs.device());
        DiagGaussian {
            mean: Tensor::zeros([batch, self.output_dim], options),
            std: Tensor::ones([batch, self.output_dim], options) * self.std,
        }
    }

    fn output_dim(&self) -> i64 {
        self.output_dim
    }
}

/// Diagonal Gaussian with input-dependent mean and standard deviation.
#[derive(Debug)]
pub struct Gaussian {
    net: nn::Sequential,
    input_dim: i64,
    output_dim: i64,
}

impl Gaussian {
    pub fn new(p: &nn::Path, input_dim: i64, output_dim: i64, hidden_units: &[i64]) -> Self {
        let net = build_mlp(p, input_dim, 2 * output_dim, hidden_units, HIDDEN_ACTIVATION);
        Self {
            net,
            input_dim,
            output_dim,
        }
    }

    pub fn input_dim(&self) -> i64 {
        self.input_dim
    }
}

impl ConditionalGaussian for Gaussian {
    fn forward(&self, xs: &Tensor) -> DiagGaussian {
        let out = self.net.forward(xs);
        let chunks = out.chunk(2, -1);
        let mean = chunks[0].shallow_clone();
        let std = softplus(&chunks[1]) + MIN_STD;
        DiagGaussian { mean, std }
    }

    fn output_dim(&self) -> i64 {
        self.output_dim
    }
}
