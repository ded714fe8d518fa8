use tch::{nn, Tensor};

use super::layers::{conv_stack, ConvSpec};
use super::mlp::Activation;
use crate::config::LatentConfig;
use crate::{Result, SlacError};

/// Convolutional stack taking an 84x84 image down to 1x1. The last layer's
/// channel count is replaced by the configured image feature width.
pub const ENCODER_LAYERS: [ConvSpec; 6] = [
    // (C, 84, 84) -> (32, 42, 42)
    ConvSpec::new(32, 5, 2, 2),
    // -> (64, 21, 21)
    ConvSpec::new(64, 3, 2, 1),
    // -> (128, 11, 11)
    ConvSpec::new(128, 3, 2, 1),
    // -> (256, 6, 6)
    ConvSpec::new(256, 3, 2, 1),
    // -> (256, 3, 3)
    ConvSpec::new(256, 3, 2, 1),
    // -> (img_dim, 1, 1)
    ConvSpec::new(256, 3, 1, 0),
];

/// Image + tactile encoder: `[B, S, C, H, W]`, `[B, S, D]` -> `[B, S, F]`.
///
/// Every timestep is encoded independently; batch and time are merged for
/// the convolutional pass and split again afterwards.
#[derive(Debug)]
pub struct Encoder {
    net: nn::Sequential,
    tactile_net: nn::Linear,
    image_shape: [i64; 3],
    tactile_dim: i64,
    feature_dim: i64,
}

impl Encoder {
    pub fn new(p: &nn::Path, config: &LatentConfig) -> Self {
        let mut specs = ENCODER_LAYERS;
        specs[specs.len() - 1].out_channels = config.img_feature_dim;
        let net = conv_stack(
            &(p / "net"),
            config.image_channels(),
            &specs,
            Activation::Gelu,
        );
        let tactile_net = nn::linear(
            p / "tactile_net",
            config.tactile_dim,
            config.tactile_latent_dim,
            Default::default(),
        );

        Self {
            net,
            tactile_net,
            image_shape: config.image_shape,
            tactile_dim: config.tactile_dim,
            feature_dim: config.feature_dim(),
        }
    }

    pub fn feature_dim(&self) -> i64 {
        self.feature_dim
    }

    pub fn forward(&self, images: &Tensor, tactile: &Tensor) -> Result<Tensor> {
        let size = images.size();
        let (b, s) = match size.as_slice() {
            [b, s, c, h, w] if [*c, *h, *w] == self.image_shape => (*b, *s),
            _ => {
                let [c, h, w] = self.image_shape;
                return Err(SlacError::shape("encoder images", vec![-1, -1, c, h, w], size));
            }
        };
        let expected_tactile = vec![b, s, self.tactile_dim];
        if tactile.size() != expected_tactile {
            return Err(SlacError::shape(
                "encoder tactile",
                expected_tactile,
                tactile.size(),
            ));
        }

        let [c, h, w] = self.image_shape;
        let x = images.reshape([b * s, c, h, w]).apply(&self.net);
        let x = x.reshape([b * s, -1]);
        let tactile_x = tactile.reshape([b * s, -1]).apply(&self.tactile_net);
        Ok(Tensor::cat(&[x, tactile_x], 1).reshape([b, s, -1]))
    }
}
