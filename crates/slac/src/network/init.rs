//! Parameter initialisation shared by every layer of the model.

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use tch::{nn, Tensor};

/// Fan-in and fan-out of a weight tensor, following libtorch's convention
/// (`[out, in, k...]`, receptive field multiplied into both).
fn fans(size: &[i64]) -> (i64, i64) {
    match size {
        [] => (1, 1),
        [n] => (*n, *n),
        [out, inp, rest @ ..] => {
            let receptive: i64 = rest.iter().product();
            (inp * receptive, out * receptive)
        }
    }
}

/// Xavier-uniform (gain 1) for weights and zeros for biases.
///
/// Variables are visited in name order so the same `rng` state always yields
/// the same parameters regardless of `HashMap` iteration order.
pub fn initialize_weights<R: Rng + ?Sized>(vs: &nn::VarStore, rng: &mut R) {
    let mut variables: Vec<(String, Tensor)> = vs.variables().into_iter().collect();
    variables.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, mut var) in variables {
        if name.ends_with("weight") {
            let size = var.size();
            let (fan_in, fan_out) = fans(&size);
            let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let dist = Uniform::new_inclusive(-bound, bound);
            let values: Vec<f32> = (0..var.numel())
                .map(|_| dist.sample(rng) as f32)
                .collect();
            let init = Tensor::from_slice(&values)
                .reshape(size.as_slice())
                .to_kind(var.kind())
                .to_device(var.device());
            tch::no_grad(|| {
                var.copy_(&init);
            });
        } else if name.ends_with("bias") {
            tch::no_grad(|| {
                let _ = var.zero_();
            });
        }
    }
}
