// layerforge-data/src/generator.rs

use std::fmt;

use layerforge_core::LayerForgeError;

/// A pull-based source of training samples.
///
/// Each call writes exactly one sample into `input` and its ground truth into
/// `label`, then reports whether that sample was the last one of the epoch.
/// The next call after an epoch end starts the following epoch.
pub trait SampleGenerator: Send {
    fn generate(&mut self, input: &mut [f32], label: &mut [f32]) -> Result<bool, LayerForgeError>;
}

/// Adapts a closure with the `generate` signature.
pub struct FnSampleGenerator<F>
where
    F: FnMut(&mut [f32], &mut [f32]) -> Result<bool, LayerForgeError> + Send,
{
    callback: F,
}

impl<F> FnSampleGenerator<F>
where
    F: FnMut(&mut [f32], &mut [f32]) -> Result<bool, LayerForgeError> + Send,
{
    pub fn new(callback: F) -> Self {
        FnSampleGenerator { callback }
    }
}

impl<F> SampleGenerator for FnSampleGenerator<F>
where
    F: FnMut(&mut [f32], &mut [f32]) -> Result<bool, LayerForgeError> + Send,
{
    fn generate(&mut self, input: &mut [f32], label: &mut [f32]) -> Result<bool, LayerForgeError> {
        (self.callback)(input, label)
    }
}

impl<F> fmt::Debug for FnSampleGenerator<F>
where
    F: FnMut(&mut [f32], &mut [f32]) -> Result<bool, LayerForgeError> + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSampleGenerator").finish_non_exhaustive()
    }
}

/// Replays in-memory `(input, label)` pairs in order, epoch after epoch.
#[derive(Debug, Clone)]
pub struct VecSampleGenerator {
    inputs: Vec<Vec<f32>>,
    labels: Vec<Vec<f32>>,
    cursor: usize,
}

impl VecSampleGenerator {
    /// # Errors
    /// `InvalidArgument` if the two vectors differ in length or are empty.
    pub fn new(inputs: Vec<Vec<f32>>, labels: Vec<Vec<f32>>) -> Result<Self, LayerForgeError> {
        if inputs.len() != labels.len() {
            return Err(LayerForgeError::InvalidArgument(format!(
                "got {} inputs but {} labels",
                inputs.len(),
                labels.len()
            )));
        }
        if inputs.is_empty() {
            return Err(LayerForgeError::InvalidArgument(
                "a sample generator needs at least one sample".to_string(),
            ));
        }
        Ok(VecSampleGenerator {
            inputs,
            labels,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

fn copy_sample(dst: &mut [f32], src: &[f32], what: &str, index: usize) -> Result<(), LayerForgeError> {
    if dst.len() != src.len() {
        return Err(LayerForgeError::DataSource(format!(
            "{} {} has {} values, expected {}",
            what,
            index,
            src.len(),
            dst.len()
        )));
    }
    dst.copy_from_slice(src);
    Ok(())
}

impl SampleGenerator for VecSampleGenerator {
    fn generate(&mut self, input: &mut [f32], label: &mut [f32]) -> Result<bool, LayerForgeError> {
        let index = self.cursor;
        copy_sample(input, &self.inputs[index], "input", index)?;
        copy_sample(label, &self.labels[index], "label", index)?;

        self.cursor += 1;
        let last = self.cursor == self.inputs.len();
        if last {
            self.cursor = 0;
        }
        Ok(last)
    }
}

#[cfg(test)]
#[path = "generator_test.rs"]
mod tests;
