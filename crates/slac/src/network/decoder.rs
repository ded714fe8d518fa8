use tch::{nn, Tensor};

use super::layers::{conv_transpose_stack, ConvTransposeSpec};
use super::mlp::Activation;
use crate::config::LatentConfig;
use crate::distribution::DiagGaussian;
use crate::{Result, SlacError};

/// Transposed-convolution stack from a 1x1 latent map up to 84x84. The last
/// layer's channel count is replaced by the configured image channels.
pub const DECODER_LAYERS: [ConvTransposeSpec; 5] = [
    // (z1 + z2, 1, 1) -> (256, 5, 5)
    ConvTransposeSpec::new(256, 5, 1, 0, 0),
    // -> (128, 10, 10)
    ConvTransposeSpec::new(128, 3, 2, 1, 1),
    // -> (64, 21, 21)
    ConvTransposeSpec::new(64, 4, 2, 1, 1),
    // -> (32, 42, 42)
    ConvTransposeSpec::new(32, 3, 2, 1, 1),
    // -> (C, 84, 84)
    ConvTransposeSpec::new(3, 3, 2, 1, 1),
];

/// Image decoder: `[B, S, latent]` -> Gaussian over `[B, S, C, 84, 84]` with a
/// fixed standard deviation.
#[derive(Debug)]
pub struct Decoder {
    net: nn::Sequential,
    input_dim: i64,
    std: f64,
}

impl Decoder {
    pub fn new(p: &nn::Path, config: &LatentConfig) -> Self {
        let mut specs = DECODER_LAYERS;
        specs[specs.len() - 1].out_channels = config.image_channels();
        let net = conv_transpose_stack(
            &(p / "net"),
            config.latent_dim(),
            &specs,
            Activation::LeakyReLU(0.2),
        );

        Self {
            net,
            input_dim: config.latent_dim(),
            std: config.decoder_std,
        }
    }

    pub fn std(&self) -> f64 {
        self.std
    }

    pub fn forward(&self, latents: &Tensor) -> Result<DiagGaussian> {
        let size = latents.size();
        let (b, s) = match size.as_slice() {
            [b, s, d] if *d == self.input_dim => (*b, *s),
            _ => {
                return Err(SlacError::shape(
                    "decoder input",
                    vec![-1, -1, self.input_dim],
                    size,
                ))
            }
        };

        let x = latents
            .reshape([b * s, self.input_dim, 1, 1])
            .apply(&self.net);
        let out = x.size();
        let mean = x.reshape([b, s, out[1], out[2], out[3]]);
        let std = mean.ones_like() * self.std;
        Ok(DiagGaussian { mean, std })
    }
}
