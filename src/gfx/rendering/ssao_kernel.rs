//! SSAO sample kernel and rotation noise
//!
//! The kernel holds view-space offsets in the tangent-space hemisphere around
//! the surface normal (z >= 0). The noise tile rotates the kernel per pixel
//! and is tiled over the screen, trading banding for noise the blur removes.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::SsaoConfig;

pub const MAX_KERNEL_SIZE: usize = 64;

/// Side of the square noise tile
pub const NOISE_DIM: u32 = 4;

const KERNEL_STD_DEV: f32 = 0.2;
const NOISE_STD_DEV: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct SsaoKernel {
    pub samples: Vec<[f32; 3]>,
    /// `NOISE_DIM * NOISE_DIM` rotation vectors with z = 0
    pub noise: Vec<[f32; 3]>,
}

impl SsaoKernel {
    /// Generates kernel and noise, seeded from the config or from OS entropy.
    pub fn generate(config: &SsaoConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let size = config.kernel_size.clamp(1, MAX_KERNEL_SIZE);
        Self {
            samples: generate_kernel(&mut rng, size),
            noise: generate_noise(&mut rng),
        }
    }

    /// Samples padded to `vec4` and to the fixed uniform array length.
    pub fn padded_samples(&self) -> [[f32; 4]; MAX_KERNEL_SIZE] {
        let mut padded = [[0.0; 4]; MAX_KERNEL_SIZE];
        for (slot, sample) in padded.iter_mut().zip(&self.samples) {
            *slot = [sample[0], sample[1], sample[2], 0.0];
        }
        padded
    }

    /// Noise as `Rgba32Float` texel data.
    pub fn noise_texels(&self) -> Vec<f32> {
        self.noise
            .iter()
            .flat_map(|n| [n[0], n[1], n[2], 0.0])
            .collect()
    }
}

/// Kernel samples: x, y ~ N(0, 0.2) clamped to [-1, 1]; z ~ N(0, 0.2) clamped to [0, 1].
pub fn generate_kernel(rng: &mut impl Rng, size: usize) -> Vec<[f32; 3]> {
    (0..size)
        .map(|_| {
            [
                normal(rng, KERNEL_STD_DEV).clamp(-1.0, 1.0),
                normal(rng, KERNEL_STD_DEV).clamp(-1.0, 1.0),
                normal(rng, KERNEL_STD_DEV).clamp(0.0, 1.0),
            ]
        })
        .collect()
}

/// Rotation noise: x, y ~ N(0, 0.5) clamped to [-1, 1]; z = 0.
pub fn generate_noise(rng: &mut impl Rng) -> Vec<[f32; 3]> {
    (0..NOISE_DIM * NOISE_DIM)
        .map(|_| {
            [
                normal(rng, NOISE_STD_DEV).clamp(-1.0, 1.0),
                normal(rng, NOISE_STD_DEV).clamp(-1.0, 1.0),
                0.0,
            ]
        })
        .collect()
}

/// Zero-mean normal sample (Box-Muller).
fn normal(rng: &mut impl Rng, std_dev: f32) -> f32 {
    // 1 - u keeps the logarithm's argument in (0, 1].
    let u1 = 1.0 - rng.random::<f32>();
    let u2 = rng.random::<f32>();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos() * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> SsaoConfig {
        SsaoConfig {
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_kernel_bounds() {
        let kernel = SsaoKernel::generate(&seeded(7));
        assert_eq!(kernel.samples.len(), MAX_KERNEL_SIZE);
        for [x, y, z] in &kernel.samples {
            assert!((-1.0..=1.0).contains(x));
            assert!((-1.0..=1.0).contains(y));
            assert!((0.0..=1.0).contains(z));
        }
    }

    #[test]
    fn test_kernel_statistics() {
        let mut rng = StdRng::seed_from_u64(1234);
        let samples = generate_kernel(&mut rng, 20_000);
        let n = samples.len() as f32;
        let mean_x = samples.iter().map(|s| s[0]).sum::<f32>() / n;
        let mean_y = samples.iter().map(|s| s[1]).sum::<f32>() / n;
        let var_x = samples.iter().map(|s| (s[0] - mean_x).powi(2)).sum::<f32>() / n;

        assert!(mean_x.abs() < 0.01, "mean x {mean_x}");
        assert!(mean_y.abs() < 0.01, "mean y {mean_y}");
        assert!((var_x.sqrt() - KERNEL_STD_DEV).abs() < 0.01, "std x {}", var_x.sqrt());

        // Half of z is clamped to zero.
        let zeros = samples.iter().filter(|s| s[2] == 0.0).count() as f32 / n;
        assert!((zeros - 0.5).abs() < 0.02, "zero fraction {zeros}");
    }

    #[test]
    fn test_noise_is_planar() {
        let kernel = SsaoKernel::generate(&seeded(99));
        assert_eq!(kernel.noise.len(), (NOISE_DIM * NOISE_DIM) as usize);
        assert!(kernel.noise.iter().all(|n| n[2] == 0.0));
        assert!(kernel.noise.iter().any(|n| n[0] != 0.0));
        assert_eq!(kernel.noise_texels().len(), kernel.noise.len() * 4);
    }

    #[test]
    fn test_seed_reproducible() {
        assert_eq!(SsaoKernel::generate(&seeded(5)), SsaoKernel::generate(&seeded(5)));
        assert_ne!(SsaoKernel::generate(&seeded(5)), SsaoKernel::generate(&seeded(6)));
    }

    #[test]
    fn test_kernel_size_is_clamped() {
        let config = SsaoConfig {
            kernel_size: 500,
            seed: Some(1),
            ..Default::default()
        };
        let kernel = SsaoKernel::generate(&config);
        assert_eq!(kernel.samples.len(), MAX_KERNEL_SIZE);
        assert_eq!(kernel.padded_samples()[MAX_KERNEL_SIZE - 1][3], 0.0);
    }
}
