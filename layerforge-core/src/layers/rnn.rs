use crate::context::{InitLayerContext, RunLayerContext, WeightHandle};
use crate::error::LayerForgeError;
use crate::layers::{unknown_property, Activation, Layer};
use crate::props;
use crate::tensor::{Tensor, TensorDim};
use crate::weight::{Initializer, Regularizer, WeightSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct RnnConfig {
    /// Hidden size. Must be set to a positive value before finalize.
    pub unit: usize,
    pub activation: Activation,
    pub weight_initializer: Initializer,
    pub bias_initializer: Initializer,
    pub weight_regularizer: Regularizer,
    pub weight_regularizer_constant: f32,
}

impl Default for RnnConfig {
    fn default() -> Self {
        RnnConfig {
            unit: 0,
            activation: Activation::Tanh,
            weight_initializer: Initializer::XavierUniform,
            bias_initializer: Initializer::Zeros,
            weight_regularizer: Regularizer::None,
            weight_regularizer_constant: 1.0,
        }
    }
}

/// Handles of the three RNN weights inside the run context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RnnWeights {
    /// `[1, 1, feature, unit]`
    pub xh: WeightHandle,
    /// `[1, 1, unit, unit]`
    pub hh: WeightHandle,
    /// `[1, 1, 1, unit]`
    pub bias: WeightHandle,
}

/// Elman recurrence over `[batch, 1, time, feature]` inputs.
///
/// For every batch entry, steps run in order:
///
/// `h_t = act(x_t . W_xh + h_{t-1} . W_hh + b)`
///
/// The last hidden state of each batch entry is kept in `h_prev` and seeds
/// the next forward call. It is never reset implicitly; call `reset_state`
/// at sequence boundaries. Backward propagation is not supported.
#[derive(Debug)]
pub struct Rnn {
    config: RnnConfig,
    weights: Option<RnnWeights>,
    h_prev: Option<Tensor>,
}

impl Rnn {
    pub const TYPE: &'static str = "rnn";

    pub fn new(unit: usize) -> Self {
        Self::with_config(RnnConfig {
            unit,
            ..RnnConfig::default()
        })
    }

    pub fn with_config(config: RnnConfig) -> Self {
        Rnn {
            config,
            weights: None,
            h_prev: None,
        }
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    pub fn weights(&self) -> Option<RnnWeights> {
        self.weights
    }

    /// Hidden state carried into the next forward call, `[batch, 1, 1, unit]`.
    pub fn hidden_state(&self) -> Option<&Tensor> {
        self.h_prev.as_ref()
    }

    /// Zeroes the carried hidden state.
    pub fn reset_state(&mut self) -> Result<(), LayerForgeError> {
        match self.h_prev.as_mut() {
            Some(h) => h.set_zero(),
            None => Err(self.not_finalized()),
        }
    }

    fn not_finalized(&self) -> LayerForgeError {
        LayerForgeError::NotFinalized {
            layer: Self::TYPE.to_string(),
        }
    }
}

impl Default for Rnn {
    fn default() -> Self {
        Self::with_config(RnnConfig::default())
    }
}

impl Layer for Rnn {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn finalize(&mut self, context: &mut InitLayerContext) -> Result<(), LayerForgeError> {
        if self.weights.is_some() {
            return Err(LayerForgeError::AlreadyFinalized {
                layer: Self::TYPE.to_string(),
            });
        }
        context.expect_inputs(Self::TYPE, 1)?;
        let input = context.input_dimensions()[0];
        if input.channel != 1 {
            return Err(LayerForgeError::InvalidArgument(format!(
                "rnn input must be [batch, 1, time, feature], got {}",
                input
            )));
        }
        let unit = self.config.unit;
        if unit == 0 {
            return Err(LayerForgeError::InvalidProperty {
                key: "unit".to_string(),
                value: "0".to_string(),
                reason: "unit must be positive".to_string(),
            });
        }

        let weight = |dim: TensorDim, name: &str| {
            WeightSpec::new(dim, name)
                .with_initializer(self.config.weight_initializer)
                .with_regularizer(self.config.weight_regularizer, self.config.weight_regularizer_constant)
        };
        let xh = context.request_weight(weight(TensorDim::new(1, 1, input.width, unit), "weight_xh"));
        let hh = context.request_weight(weight(TensorDim::new(1, 1, unit, unit), "weight_hh"));
        let bias = context.request_weight(
            WeightSpec::new(TensorDim::from_width(unit), "bias_h").with_initializer(self.config.bias_initializer),
        );
        self.weights = Some(RnnWeights { xh, hh, bias });
        self.h_prev = Some(
            Tensor::new(TensorDim::new(input.batch, 1, 1, unit), context.dtype()).with_name("rnn:h_prev"),
        );

        let output = input.with_width(unit);
        context.set_output_dimensions(vec![output]);
        log::debug!("Rnn '{}' finalized: {} -> {}", context.name(), input, output);
        Ok(())
    }

    fn forwarding(&mut self, context: &mut RunLayerContext, _training: bool) -> Result<(), LayerForgeError> {
        let handles = self.weights.ok_or_else(|| self.not_finalized())?;
        let h_prev = match self.h_prev.as_mut() {
            Some(h) => h,
            None => {
                return Err(LayerForgeError::NotFinalized {
                    layer: Self::TYPE.to_string(),
                })
            }
        };

        let input = context.get_input(0)?;
        let dim = input.dim();
        let (batch, time, feature, unit) = (dim.batch, dim.height, dim.width, self.config.unit);
        if time == 0 {
            log::warn!("Rnn '{}' received an empty sequence", context.name());
            return Ok(());
        }

        let weight_xh = context.get_weight(handles.xh)?;
        let weight_hh = context.get_weight(handles.hh)?;
        let bias_h = context.get_weight(handles.bias)?;
        let output = context.get_output(0)?;

        // TODO: batch entries are independent and could run on separate threads.
        for b in 0..batch {
            let islice = input.get_batch_slice(b, 1)?;
            let oslice = output.get_batch_slice(b, 1)?;
            let mut state = h_prev.get_batch_slice(b, 1)?;
            let mut hs_prev = state.deep_clone()?;

            for t in 0..time {
                let xs = islice.get_shared_data_tensor(TensorDim::from_width(feature), t * feature)?;
                let mut hs = oslice.get_shared_data_tensor(TensorDim::from_width(unit), t * unit)?;

                let mut recurrent = hs_prev.dot(&weight_hh)?;
                recurrent.add_i(&bias_h)?;
                xs.dot_into(&weight_xh, &mut hs)?;
                hs.add_i(&recurrent)?;
                self.config.activation.run_i(&mut hs)?;
                hs_prev = hs;
            }
            state.fill(&hs_prev)?;
        }
        log::trace!("Rnn forward over {} batch entries x {} steps", batch, time);
        Ok(())
    }

    fn calc_derivative(&mut self, _context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        Err(LayerForgeError::UnsupportedBackward {
            layer: Self::TYPE.to_string(),
        })
    }

    fn calc_gradient(&mut self, _context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        Err(LayerForgeError::UnsupportedBackward {
            layer: Self::TYPE.to_string(),
        })
    }

    fn supports_backward(&self) -> bool {
        false
    }

    fn set_property(&mut self, properties: &[String]) -> Result<(), LayerForgeError> {
        for property in properties {
            let (key, value) = props::split_key_value(property)?;
            match key.as_str() {
                "unit" => {
                    let unit = props::parse_u32(&key, &value)?;
                    if unit == 0 {
                        return Err(LayerForgeError::InvalidProperty {
                            key,
                            value,
                            reason: "unit must be positive".to_string(),
                        });
                    }
                    self.config.unit = unit as usize;
                }
                "activation" => self.config.activation = value.parse()?,
                "weight_initializer" => self.config.weight_initializer = value.parse()?,
                "bias_initializer" => self.config.bias_initializer = value.parse()?,
                "weight_regularizer" => self.config.weight_regularizer = value.parse()?,
                "weight_regularizer_constant" => {
                    self.config.weight_regularizer_constant = props::parse_f32(&key, &value)?
                }
                _ => return Err(unknown_property(Self::TYPE, &key)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "rnn_test.rs"]
mod tests;
