//! Feedforward network builder and activations.

use serde::{Deserialize, Serialize};
use tch::{nn, Tensor};

/// Hidden-layer nonlinearities used across the model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    ReLU,
    Tanh,
    Gelu,
    Elu,
    /// Leaky ReLU with the given negative slope (`0 <= slope < 1`).
    LeakyReLU(f64),
}

impl Activation {
    pub fn apply(self, xs: &Tensor) -> Tensor {
        match self {
            Activation::ReLU => xs.relu(),
            Activation::Tanh => xs.tanh(),
            Activation::Gelu => xs.gelu("none"),
            Activation::Elu => xs.elu(),
            Activation::LeakyReLU(slope) => xs.maximum(&(xs * slope)),
        }
    }
}

/// Linear layers of sizes `input_dim -> hidden_units... -> output_dim`, with
/// `activation` after every hidden layer and no output activation.
///
/// Layers are registered under `p` as `l0`, `l1`, ... and `out`.
pub fn build_mlp(
    p: &nn::Path,
    input_dim: i64,
    output_dim: i64,
    hidden_units: &[i64],
    activation: Activation,
) -> nn::Sequential {
    let mut seq = nn::seq();
    let mut in_size = input_dim;

    for (i, &units) in hidden_units.iter().enumerate() {
        seq = seq.add(nn::linear(
            p / format!("l{}", i),
            in_size,
            units,
            Default::default(),
        ));
        seq = seq.add_fn(move |xs| activation.apply(xs));
        in_size = units;
    }

    seq.add(nn::linear(p / "out", in_size, output_dim, Default::default()))
}

/// Numerically stable `ln(1 + e^x)`.
pub fn softplus(xs: &Tensor) -> Tensor {
    xs.relu() + (-xs.abs()).exp().log1p()
}
