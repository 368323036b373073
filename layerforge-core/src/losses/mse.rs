use crate::context::{InitLayerContext, RunLayerContext};
use crate::error::LayerForgeError;
use crate::layers::{unknown_property, Layer};
use crate::losses::{apply_loss_scale, update_loss};
use crate::tensor::{Tensor, TensorDim};
use crate::types::DType;

/// Mean squared error against the bound label.
///
/// The output always mirrors the input, so inference works without labels.
/// Inputs in a non-canonical precision are up-converted before the error is
/// computed, and the derivative is converted to the context's dtype on write.
#[derive(Debug, Clone, Default)]
pub struct MseLoss;

impl MseLoss {
    pub const TYPE: &'static str = "mse";

    pub fn new() -> Self {
        MseLoss
    }
}

/// Returns `tensor` in the canonical precision, copying only when needed.
fn canonical(tensor: &Tensor) -> Result<Tensor, LayerForgeError> {
    let target = DType::canonical();
    if tensor.dtype() == target {
        return Ok(tensor.clone());
    }
    log::warn!(
        "MseLoss: converting '{}' from {} to {}",
        tensor.name(),
        tensor.dtype(),
        target
    );
    tensor.clone_with_dtype(target)
}

impl Layer for MseLoss {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn finalize(&mut self, context: &mut InitLayerContext) -> Result<(), LayerForgeError> {
        context.expect_inputs(Self::TYPE, 1)?;
        let dim = context.input_dimensions()[0];
        context.set_output_dimensions(vec![dim]);
        log::debug!("MseLoss '{}' finalized with shape {}", context.name(), dim);
        Ok(())
    }

    fn forwarding(&mut self, context: &mut RunLayerContext, _training: bool) -> Result<(), LayerForgeError> {
        let input = context.get_input(0)?;
        context.get_output(0)?.fill(input)?;

        if !context.is_label_available(0) {
            // No label, no loss term: drop the previous pass's value.
            return update_loss(context, &[]);
        }
        let y = canonical(input)?;
        let label = canonical(context.get_label(0)?)?;

        let error = label.subtract(&y)?;
        if error.is_empty() {
            return Err(LayerForgeError::NumericFailure {
                operation: "mse forwarding".to_string(),
                reason: "empty input".to_string(),
            });
        }
        let norm = error.l2norm()?;
        let mean = Tensor::from_vec(TensorDim::from_width(1), vec![norm * norm / error.len() as f32])?;
        update_loss(context, &[&mean])
    }

    fn calc_derivative(&mut self, context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        let y = canonical(context.get_input(0)?)?;
        let label = canonical(context.get_label(0)?)?;

        let mut derivative = y.subtract(&label)?;
        let half_count = derivative.len() as f32 / 2.0;
        derivative.divide_scalar_i(half_count)?;
        apply_loss_scale(context, &mut derivative)?;

        // fill narrows to the outgoing derivative's dtype
        context.get_outgoing_derivative(0)?.fill(&derivative)
    }

    fn requires_label(&self) -> bool {
        true
    }

    fn set_property(&mut self, properties: &[String]) -> Result<(), LayerForgeError> {
        match properties.first() {
            None => Ok(()),
            Some(property) => {
                let (key, _) = crate::props::split_key_value(property)?;
                Err(unknown_property(Self::TYPE, &key))
            }
        }
    }
}

#[cfg(test)]
#[path = "mse_test.rs"]
mod tests;
