use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::LayerForgeError;
use crate::tensor::Tensor;

impl Tensor {
    /// Fills the tensor with independent `Normal(mean, std)` samples drawn from `rng`.
    ///
    /// Passing a seeded generator makes the draw reproducible.
    pub fn set_rand_normal<R: Rng + ?Sized>(
        &mut self,
        mean: f32,
        std: f32,
        rng: &mut R,
    ) -> Result<(), LayerForgeError> {
        // Normal::new only rejects a non-finite std.
        if !mean.is_finite() || !std.is_finite() || std < 0.0 {
            return Err(LayerForgeError::InvalidArgument(format!(
                "normal({}, {}) needs a finite mean and a finite, non-negative std",
                mean, std
            )));
        }
        let normal = Normal::new(mean, std).map_err(|e| {
            LayerForgeError::InvalidArgument(format!("normal({}, {}): {}", mean, std, e))
        })?;
        let samples: Vec<f32> = (0..self.len()).map(|_| normal.sample(rng)).collect();
        self.write_values(&samples)
    }

    /// Fills the tensor with independent samples from `[low, high)`.
    pub fn set_rand_uniform<R: Rng + ?Sized>(
        &mut self,
        low: f32,
        high: f32,
        rng: &mut R,
    ) -> Result<(), LayerForgeError> {
        // Uniform::new panics when the width of the range overflows.
        if !(high - low).is_finite() {
            return Err(LayerForgeError::InvalidArgument(format!(
                "uniform range [{}, {}) is not finite",
                low, high
            )));
        }
        if low >= high {
            return Err(LayerForgeError::InvalidArgument(format!(
                "uniform range [{}, {}) is empty",
                low, high
            )));
        }
        let uniform = Uniform::new(low, high);
        let samples: Vec<f32> = (0..self.len()).map(|_| uniform.sample(rng)).collect();
        self.write_values(&samples)
    }
}
