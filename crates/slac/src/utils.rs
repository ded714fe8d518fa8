//! Utility functions.

/// Seed libtorch's global generator (used by `TorchNoise` and tensor
/// constructors such as `Tensor::randn`).
pub fn set_seed(seed: u64) {
    tch::manual_seed(seed as i64);
}

/// Abbreviate large numbers for display
pub fn abbreviate(num: u64) -> String {
    if num < 1_000 {
        format!("{}", num)
    } else if num < 1_000_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else if num < 1_000_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else {
        format!("{:.1}B", num as f64 / 1_000_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate(500), "500");
        assert_eq!(abbreviate(1500), "1.5K");
        assert_eq!(abbreviate(1_500_000), "1.5M");
        assert_eq!(abbreviate(1_500_000_000), "1.5B");
    }

    #[test]
    fn test_set_seed_then_torch_noise() {
        use crate::noise::{NoiseSource, TorchNoise};
        use tch::{Device, Kind};

        set_seed(123);
        let xs = TorchNoise.standard_normal(&[8, 2], Kind::Float, Device::Cpu);
        assert_eq!(xs.size(), vec![8, 2]);
        assert!(xs.isfinite().all().int64_value(&[]) == 1);
    }
}
