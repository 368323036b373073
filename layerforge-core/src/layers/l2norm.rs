use crate::context::{InitLayerContext, RunLayerContext};
use crate::error::LayerForgeError;
use crate::layers::{unknown_property, Layer};
use crate::props;

/// Scales its single `[batch, 1, 1, width]` input to unit L2 norm.
///
/// The norm is taken over the whole tensor. Forward only.
#[derive(Debug, Clone, Default)]
pub struct PreprocessL2Norm;

impl PreprocessL2Norm {
    pub const TYPE: &'static str = "preprocess_l2norm";

    pub fn new() -> Self {
        PreprocessL2Norm
    }
}

impl Layer for PreprocessL2Norm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn finalize(&mut self, context: &mut InitLayerContext) -> Result<(), LayerForgeError> {
        context.expect_inputs(Self::TYPE, 1)?;
        let dim = context.input_dimensions()[0];
        if dim.channel != 1 || dim.height != 1 {
            return Err(LayerForgeError::InvalidArgument(format!(
                "preprocess_l2norm expects channel and height of 1, got {}",
                dim
            )));
        }
        context.set_output_dimensions(vec![dim]);
        Ok(())
    }

    fn forwarding(&mut self, context: &mut RunLayerContext, _training: bool) -> Result<(), LayerForgeError> {
        let input = context.get_input(0)?;
        let norm = input.l2norm()?;
        let normalized = input.divide_scalar(norm)?;
        context.get_output(0)?.fill(&normalized)
    }

    fn calc_derivative(&mut self, _context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        Err(LayerForgeError::UnsupportedBackward {
            layer: Self::TYPE.to_string(),
        })
    }

    fn supports_backward(&self) -> bool {
        false
    }

    fn set_property(&mut self, properties: &[String]) -> Result<(), LayerForgeError> {
        match properties.first() {
            None => Ok(()),
            Some(property) => {
                let (key, _) = props::split_key_value(property)?;
                Err(unknown_property(Self::TYPE, &key))
            }
        }
    }
}
