// layerforge-data/src/batch.rs

use layerforge_core::{LayerForgeError, Tensor};

use crate::generator::SampleGenerator;

/// Outcome of filling one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStatus {
    /// Batch entries holding real samples. The rest are zero.
    pub filled: usize,
    /// The last filled sample ended the epoch.
    pub last: bool,
}

/// Pulls samples from a generator into `[batch, ...]` input and label tensors.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchFiller;

impl BatchFiller {
    /// Fills batch entries in order until the batch is full or the generator
    /// reports the end of the epoch. Remaining entries are zeroed.
    ///
    /// Writes go through batch-slice views, so tensors that share storage
    /// with `input` or `label` (such as the ones bound to a run context) see
    /// the new batch.
    ///
    /// # Errors
    /// `ShapeMismatch` if the tensors disagree on the batch size, and any
    /// error the generator returns.
    pub fn fill<G>(generator: &mut G, input: &Tensor, label: &Tensor) -> Result<BatchStatus, LayerForgeError>
    where
        G: SampleGenerator + ?Sized,
    {
        let batch = input.dim().batch;
        if label.dim().batch != batch {
            return Err(LayerForgeError::ShapeMismatch {
                expected: label.dim().with_batch(batch),
                actual: label.dim(),
                operation: "BatchFiller::fill".to_string(),
            });
        }

        let mut input_sample = vec![0.0f32; input.dim().feature_len()];
        let mut label_sample = vec![0.0f32; label.dim().feature_len()];
        let mut filled = 0;
        let mut last = false;

        while filled < batch && !last {
            input_sample.fill(0.0);
            label_sample.fill(0.0);
            last = generator.generate(&mut input_sample, &mut label_sample)?;
            input.get_batch_slice(filled, 1)?.write_values(&input_sample)?;
            label.get_batch_slice(filled, 1)?.write_values(&label_sample)?;
            filled += 1;
        }

        if filled < batch {
            log::debug!("Epoch ended after {} of {} batch entries; padding with zeros", filled, batch);
            input.get_batch_slice(filled, batch - filled)?.set_zero()?;
            label.get_batch_slice(filled, batch - filled)?.set_zero()?;
        }

        Ok(BatchStatus { filled, last })
    }
}
