//! Declarative convolution stacks.

use tch::nn;

use super::mlp::Activation;

/// One strided `Conv2d` layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvSpec {
    pub out_channels: i64,
    pub kernel: i64,
    pub stride: i64,
    pub padding: i64,
}

impl ConvSpec {
    pub const fn new(out_channels: i64, kernel: i64, stride: i64, padding: i64) -> Self {
        Self {
            out_channels,
            kernel,
            stride,
            padding,
        }
    }

    /// Spatial output size for an input of `size`.
    pub fn output_size(&self, size: i64) -> i64 {
        (size + 2 * self.padding - self.kernel) / self.stride + 1
    }
}

/// One `ConvTranspose2d` layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvTransposeSpec {
    pub out_channels: i64,
    pub kernel: i64,
    pub stride: i64,
    pub padding: i64,
    pub output_padding: i64,
}

impl ConvTransposeSpec {
    pub const fn new(
        out_channels: i64,
        kernel: i64,
        stride: i64,
        padding: i64,
        output_padding: i64,
    ) -> Self {
        Self {
            out_channels,
            kernel,
            stride,
            padding,
            output_padding,
        }
    }

    pub fn output_size(&self, size: i64) -> i64 {
        (size - 1) * self.stride - 2 * self.padding + (self.kernel - 1) + self.output_padding + 1
    }
}

/// Build `Conv2d -> activation` for every spec, layers named `c0`, `c1`, ...
pub fn conv_stack(
    p: &nn::Path,
    in_channels: i64,
    specs: &[ConvSpec],
    activation: Activation,
) -> nn::Sequential {
    let mut seq = nn::seq();
    let mut c_in = in_channels;
    for (i, spec) in specs.iter().enumerate() {
        seq = seq
            .add(nn::conv2d(
                p / format!("c{}", i),
                c_in,
                spec.out_channels,
                spec.kernel,
                nn::ConvConfig {
                    stride: spec.stride,
                    padding: spec.padding,
                    ..Default::default()
                },
            ))
            .add_fn(move |xs| activation.apply(xs));
        c_in = spec.out_channels;
    }
    seq
}

/// Build `ConvTranspose2d -> activation` for every spec, layers named `d0`, `d1`, ...
pub fn conv_transpose_stack(
    p: &nn::Path,
    in_channels: i64,
    specs: &[ConvTransposeSpec],
    activation: Activation,
) -> nn::Sequential {
    let mut seq = nn::seq();
    let mut c_in = in_channels;
    for (i, spec) in specs.iter().enumerate() {
        seq = seq
            .add(nn::conv_transpose2d(
                p / format!("d{}", i),
                c_in,
                spec.out_channels,
                spec.kernel,
                nn::ConvTransposeConfig {
                    stride: spec.stride,
                    padding: spec.padding,
                    output_padding: spec.output_padding,
                    ..Default::default()
                },
            ))
            .add_fn(move |xs| activation.apply(xs));
        c_in = spec.out_channels;
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::Module, Device, Kind, Tensor};

    #[test]
    fn test_output_size_formulas() {
        assert_eq!(ConvSpec::new(32, 5, 2, 2).output_size(84), 42);
        assert_eq!(ConvSpec::new(64, 3, 2, 1).output_size(21), 11);
        assert_eq!(ConvTransposeSpec::new(64, 4, 2, 1, 1).output_size(10), 21);
        assert_eq!(ConvTransposeSpec::new(256, 5, 1, 0, 0).output_size(1), 5);
    }

    #[test]
    fn test_stacks_match_predicted_sizes() {
        let vs = nn::VarStore::new(Device::Cpu);
        let specs = [ConvSpec::new(4, 3, 2, 1), ConvSpec::new(8, 3, 2, 1)];
        let net = conv_stack(&(vs.root() / "enc"), 2, &specs, Activation::Gelu);
        let y = net.forward(&Tensor::randn([1, 2, 16, 16], (Kind::Float, Device::Cpu)));
        let expected = specs.iter().fold(16, |s, spec| spec.output_size(s));
        assert_eq!(y.size(), vec![1, 8, expected, expected]);

        let tspecs = [ConvTransposeSpec::new(4, 3, 2, 1, 1)];
        let dec = conv_transpose_stack(&(vs.root() / "dec"), 8, &tspecs, Activation::ReLU);
        let z = dec.forward(&y);
        assert_eq!(z.size(), vec![1, 4, 2 * expected, 2 * expected]);
    }
}
