// src/losses/mod.rs
// Loss layers and the bookkeeping they share.

use crate::context::RunLayerContext;
use crate::error::LayerForgeError;
use crate::tensor::Tensor;

pub mod mse;
pub mod vae;

pub use mse::MseLoss;
pub use vae::{VaeLoss, VaeLossConfig};

/// Records the layer's scalar loss: the sum of every element of `terms`
/// plus the regularization penalty of the context's weights.
pub fn update_loss(context: &mut RunLayerContext, terms: &[&Tensor]) -> Result<(), LayerForgeError> {
    let mut loss = context.regularization_loss()?;
    for term in terms {
        loss += term.sum()?;
    }
    log::trace!("Loss of '{}' updated to {}", context.name(), loss);
    context.set_loss(loss);
    Ok(())
}

/// Scales a derivative by the context's loss scale when it is not 1.
pub fn apply_loss_scale(context: &RunLayerContext, derivative: &mut Tensor) -> Result<(), LayerForgeError> {
    let scale = context.loss_scale();
    if scale != 1.0 {
        derivative.multiply_scalar_i(scale)?;
    }
    Ok(())
}
