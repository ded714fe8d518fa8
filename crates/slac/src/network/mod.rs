//! Neural networks of the latent model.
//!
//! - `Encoder` / `Decoder` - image + tactile features and image reconstruction
//! - `Gaussian` / `FixedGaussian` - diagonal Gaussian heads
//! - `LatentModel` - prior/posterior dynamics and the variational loss

mod decoder;
mod encoder;
mod gaussian;
pub mod init;
mod latent;
pub mod layers;
pub mod mlp;

pub use decoder::{Decoder, DECODER_LAYERS};
pub use encoder::{Encoder, ENCODER_LAYERS};
pub use gaussian::{ConditionalGaussian, FixedGaussian, Gaussian, MIN_STD};
pub use latent::{LatentLoss, LatentModel, PosteriorSample, PriorSample};
pub use mlp::Activation;
