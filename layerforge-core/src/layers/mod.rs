// src/layers/mod.rs
// Layer contract and the non-loss layers.

use std::fmt::Debug;

use crate::context::{InitLayerContext, RunLayerContext};
use crate::error::LayerForgeError;

pub mod activation;
pub mod bottleneck;
pub mod l2norm;
pub mod lstm;
pub mod rnn;

pub use activation::Activation;
pub use bottleneck::{Bottleneck, BottleneckConfig};
pub use l2norm::PreprocessL2Norm;
pub use lstm::{Lstm, LstmConfig, LstmHandles};
pub use rnn::{Rnn, RnnConfig, RnnWeights};

/// The contract every layer implements for the graph executor.
///
/// Lifecycle: constructed, then `finalize` exactly once, then any number of
/// `forwarding` calls each optionally followed by `calc_derivative`. A
/// backward call only reads state cached by the forward call right before it.
pub trait Layer: Debug + Send {
    /// Registry name of this layer type, e.g. `"bottleneck"`.
    fn type_name(&self) -> &'static str;

    /// Validates input arity, fixes output shapes and requests scratch tensors
    /// and weights.
    ///
    /// # Errors
    /// `InvalidInputCount` when the number of bound inputs is wrong.
    fn finalize(&mut self, context: &mut InitLayerContext) -> Result<(), LayerForgeError>;

    /// Computes outputs from inputs. Stochastic behavior only when `training`.
    fn forwarding(&mut self, context: &mut RunLayerContext, training: bool) -> Result<(), LayerForgeError>;

    /// Computes outgoing derivatives from the incoming derivative and the
    /// state cached by the preceding `forwarding` call.
    fn calc_derivative(&mut self, context: &mut RunLayerContext) -> Result<(), LayerForgeError>;

    /// Accumulates weight gradients. Weightless layers keep the default.
    fn calc_gradient(&mut self, _context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        Ok(())
    }

    fn supports_backward(&self) -> bool {
        true
    }

    /// Loss layers read a label during training.
    fn requires_label(&self) -> bool {
        false
    }

    /// Applies `"key=value"` properties.
    ///
    /// # Errors
    /// `UnknownProperty` for keys this layer does not understand and
    /// `InvalidProperty` for malformed values.
    fn set_property(&mut self, properties: &[String]) -> Result<(), LayerForgeError>;
}

/// Error for a key no layer option matches.
pub(crate) fn unknown_property(layer: &str, key: &str) -> LayerForgeError {
    LayerForgeError::UnknownProperty {
        layer: layer.to_string(),
        key: key.to_string(),
    }
}
