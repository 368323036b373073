use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::context::{InitLayerContext, RunLayerContext, TensorHandle, WeightHandle};
use crate::error::LayerForgeError;
use crate::layers::{unknown_property, Activation, Layer};
use crate::props;
use crate::tensor::{Tensor, TensorDim};
use crate::weight::{Initializer, Regularizer, WeightSpec};

/// Gates per unit, stored in the order input, forget, cell candidate, output.
const NUM_GATES: usize = 4;

/// Dropout rates at or below this are treated as no dropout.
const DROPOUT_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub struct LstmConfig {
    /// Hidden size. Must be set to a positive value before finalize.
    pub unit: usize,
    /// Applied to the cell candidate and to the cell state on output.
    pub hidden_state_activation: Activation,
    /// Applied to the input, forget and output gates.
    pub recurrent_activation: Activation,
    /// Emit every step's hidden state instead of only the last one.
    pub return_sequences: bool,
    pub dropout_rate: f32,
    pub weight_initializer: Initializer,
    pub bias_initializer: Initializer,
    pub weight_regularizer: Regularizer,
    pub weight_regularizer_constant: f32,
    /// Seed for the dropout mask. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for LstmConfig {
    fn default() -> Self {
        LstmConfig {
            unit: 0,
            hidden_state_activation: Activation::Tanh,
            recurrent_activation: Activation::Sigmoid,
            return_sequences: false,
            dropout_rate: 0.0,
            weight_initializer: Initializer::XavierUniform,
            bias_initializer: Initializer::Zeros,
            weight_regularizer: Regularizer::None,
            weight_regularizer_constant: 1.0,
            seed: None,
        }
    }
}

/// Weights and scratch tensors an LSTM requests at finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LstmHandles {
    /// `[1, 1, feature, 4 * unit]`
    pub xh: WeightHandle,
    /// `[1, 1, unit, 4 * unit]`
    pub hh: WeightHandle,
    /// `[1, 1, 1, 4 * unit]`
    pub bias: WeightHandle,
    /// Every step's hidden state, `[batch, 1, time, unit]`.
    pub hidden_state: TensorHandle,
    /// Every step's cell state, `[batch, 1, time, unit]`.
    pub mem_cell: TensorHandle,
    /// Activated gates, `[batch, 1, time, 4 * unit]`.
    pub fgio: TensorHandle,
    /// Gradient of the gate pre-activations, shaped like `fgio`.
    pub d_fgio: TensorHandle,
    /// Scaled keep mask over the hidden states, only with dropout.
    pub dropout_mask: Option<TensorHandle>,
}

/// Long short-term memory over `[batch, 1, time, feature]` inputs.
///
/// Each step computes the gates from `x_t . W_xh + h_{t-1} . W_hh + b`, then
///
/// `c_t = f * c_{t-1} + i * g`, `h_t = o * act(c_t)`
///
/// with `h_{-1} = c_{-1} = 0`. Unlike `Rnn`, no state survives between
/// forward calls. The output is `[batch, 1, time, unit]` with
/// `return_sequences`, otherwise the last step only, `[batch, 1, 1, unit]`.
///
/// Backward runs through time once per forward pass. `calc_derivative` and
/// `calc_gradient` may be called in either order and share that result.
#[derive(Debug)]
pub struct Lstm {
    config: LstmConfig,
    rng: StdRng,
    handles: Option<LstmHandles>,
    gate_gradients_ready: bool,
}

impl Lstm {
    pub const TYPE: &'static str = "lstm";

    pub fn new(unit: usize) -> Self {
        Self::with_config(LstmConfig {
            unit,
            ..LstmConfig::default()
        })
    }

    pub fn with_config(config: LstmConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Lstm {
            config,
            rng,
            handles: None,
            gate_gradients_ready: false,
        }
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    pub fn handles(&self) -> Option<LstmHandles> {
        self.handles
    }

    fn finalized_handles(&self) -> Result<LstmHandles, LayerForgeError> {
        self.handles.ok_or_else(|| LayerForgeError::NotFinalized {
            layer: Self::TYPE.to_string(),
        })
    }

    fn uses_dropout(&self) -> bool {
        self.config.dropout_rate > DROPOUT_EPSILON
    }

    /// Runs backpropagation through time into the `d_fgio` scratch tensor.
    fn backprop_gates(&mut self, context: &RunLayerContext) -> Result<(), LayerForgeError> {
        if self.gate_gradients_ready {
            return Ok(());
        }
        let handles = self.finalized_handles()?;
        let unit = self.config.unit;
        let act = self.config.hidden_state_activation;
        let rec = self.config.recurrent_activation;

        let hidden = context.get_tensor(handles.hidden_state)?;
        let mem_cell = context.get_tensor(handles.mem_cell)?;
        let fgio = context.get_tensor(handles.fgio)?;
        let mut d_fgio = context.get_tensor(handles.d_fgio)?;
        let mask = match handles.dropout_mask {
            Some(handle) => Some(context.get_tensor(handle)?),
            None => None,
        };
        let weight_hh_t = context.get_weight(handles.hh)?.transpose()?;

        let dim = hidden.dim();
        let (batch, time) = (dim.batch, dim.height);
        let dtype = hidden.dtype();

        // Spread the incoming derivative over the steps that produced output.
        let incoming = context.get_incoming_derivative(0)?;
        let mut dh_all = Tensor::new(dim, dtype);
        if self.config.return_sequences {
            dh_all.fill(incoming)?;
        } else {
            for b in 0..batch {
                step(&dh_all.get_batch_slice(b, 1)?, time - 1, unit)?.fill(&incoming.get_batch_slice(b, 1)?)?;
            }
        }

        d_fgio.set_zero()?;
        let zeros = Tensor::new(TensorDim::from_width(unit), dtype);

        for b in 0..batch {
            let dh_b = dh_all.get_batch_slice(b, 1)?;
            let c_b = mem_cell.get_batch_slice(b, 1)?;
            let g_b = fgio.get_batch_slice(b, 1)?;
            let dg_b = d_fgio.get_batch_slice(b, 1)?;
            let mask_b = match &mask {
                Some(m) => Some(m.get_batch_slice(b, 1)?),
                None => None,
            };

            let mut dh_next = zeros.deep_clone()?;
            let mut dc_next = zeros.deep_clone()?;

            for t in (0..time).rev() {
                let mut dh = step(&dh_b, t, unit)?;
                dh.add_i(&dh_next)?;
                if let Some(m) = &mask_b {
                    dh.multiply_i(&step(m, t, unit)?)?;
                }

                let cs = step(&c_b, t, unit)?;
                let cs_prev = if t == 0 { zeros.clone() } else { step(&c_b, t - 1, unit)? };
                let gates = step(&g_b, t, NUM_GATES * unit)?;
                let [gi, gf, gg, go] = split_gates(&gates, unit)?;
                let d_gates = step(&dg_b, t, NUM_GATES * unit)?;
                let [mut di, mut df, mut dg, mut d_o] = split_gates(&d_gates, unit)?;

                let mut act_c = cs.deep_clone()?;
                act.run_i(&mut act_c)?;

                d_o.fill(&dh)?;
                d_o.multiply_i(&act_c)?;

                let mut dc = dh.multiply(&go)?;
                act.run_prime_i(&act_c, &mut dc)?;
                dc.add_i(&dc_next)?;

                df.fill(&dc)?;
                df.multiply_i(&cs_prev)?;
                di.fill(&dc)?;
                di.multiply_i(&gg)?;
                dg.fill(&dc)?;
                dg.multiply_i(&gi)?;
                dc_next = dc.multiply(&gf)?;

                rec.run_prime_i(&gi, &mut di)?;
                rec.run_prime_i(&gf, &mut df)?;
                act.run_prime_i(&gg, &mut dg)?;
                rec.run_prime_i(&go, &mut d_o)?;

                dh_next = d_gates.dot(&weight_hh_t)?;
            }
        }

        self.gate_gradients_ready = true;
        log::trace!("Lstm backprop through {} steps for {} batch entries", time, batch);
        Ok(())
    }
}

impl Default for Lstm {
    fn default() -> Self {
        Self::with_config(LstmConfig::default())
    }
}

/// View of step `t` inside a `[1, 1, time, width]` batch slice.
fn step(slice: &Tensor, t: usize, width: usize) -> Result<Tensor, LayerForgeError> {
    slice.get_shared_data_tensor(TensorDim::from_width(width), t * width)
}

/// Views of the four gates of one step.
fn split_gates(gates: &Tensor, unit: usize) -> Result<[Tensor; NUM_GATES], LayerForgeError> {
    let gate = |k: usize| gates.get_shared_data_tensor(TensorDim::from_width(unit), k * unit);
    Ok([gate(0)?, gate(1)?, gate(2)?, gate(3)?])
}

impl Layer for Lstm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn finalize(&mut self, context: &mut InitLayerContext) -> Result<(), LayerForgeError> {
        if self.handles.is_some() {
            return Err(LayerForgeError::AlreadyFinalized {
                layer: Self::TYPE.to_string(),
            });
        }
        context.expect_inputs(Self::TYPE, 1)?;
        let input = context.input_dimensions()[0];
        if input.channel != 1 || input.height == 0 {
            return Err(LayerForgeError::InvalidArgument(format!(
                "lstm input must be [batch, 1, time, feature] with time > 0, got {}",
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
        let gates_width = NUM_GATES * unit;

        let weight = |dim: TensorDim, name: &str| {
            WeightSpec::new(dim, name)
                .with_initializer(self.config.weight_initializer)
                .with_regularizer(self.config.weight_regularizer, self.config.weight_regularizer_constant)
        };
        let xh = context.request_weight(weight(TensorDim::new(1, 1, input.width, gates_width), "weight_xh"));
        let hh = context.request_weight(weight(TensorDim::new(1, 1, unit, gates_width), "weight_hh"));
        let bias = context.request_weight(
            WeightSpec::new(TensorDim::from_width(gates_width), "bias_h").with_initializer(self.config.bias_initializer),
        );

        let per_step = input.with_width(unit);
        let hidden_state = context.request_tensor(per_step, "hidden_state");
        let mem_cell = context.request_tensor(per_step, "mem_cell");
        let fgio = context.request_tensor(input.with_width(gates_width), "fgio");
        let d_fgio = context.request_tensor(input.with_width(gates_width), "d_fgio");
        let dropout_mask = if self.uses_dropout() {
            Some(context.request_tensor(per_step, "dropout_mask"))
        } else {
            None
        };

        self.handles = Some(LstmHandles {
            xh,
            hh,
            bias,
            hidden_state,
            mem_cell,
            fgio,
            d_fgio,
            dropout_mask,
        });

        let output = if self.config.return_sequences {
            per_step
        } else {
            per_step.with_height(1)
        };
        context.set_output_dimensions(vec![output]);
        log::debug!("Lstm '{}' finalized: {} -> {}", context.name(), input, output);
        Ok(())
    }

    fn forwarding(&mut self, context: &mut RunLayerContext, training: bool) -> Result<(), LayerForgeError> {
        let handles = self.finalized_handles()?;
        let unit = self.config.unit;
        let act = self.config.hidden_state_activation;
        let rec = self.config.recurrent_activation;
        self.gate_gradients_ready = false;

        let weight_xh = context.get_weight(handles.xh)?;
        let weight_hh = context.get_weight(handles.hh)?;
        let bias_h = context.get_weight(handles.bias)?;
        let mut hidden = context.get_tensor(handles.hidden_state)?;
        let mut mem_cell = context.get_tensor(handles.mem_cell)?;
        let mut fgio = context.get_tensor(handles.fgio)?;
        hidden.set_zero()?;
        mem_cell.set_zero()?;
        fgio.set_zero()?;

        let mask = match handles.dropout_mask {
            Some(handle) => {
                let mut mask = context.get_tensor(handle)?;
                if training {
                    let rate = self.config.dropout_rate;
                    let keep_scale = 1.0 / (1.0 - rate);
                    mask.set_rand_uniform(0.0, 1.0, &mut self.rng)?;
                    mask.apply_i(|u| if u < rate { 0.0 } else { keep_scale })?;
                    Some(mask)
                } else {
                    // Backward after an inference pass sees no dropout.
                    mask.set_value_all(1.0)?;
                    None
                }
            }
            None => None,
        };

        let input = context.get_input(0)?;
        let dim = input.dim();
        let (batch, time, feature) = (dim.batch, dim.height, dim.width);

        for b in 0..batch {
            let x_b = input.get_batch_slice(b, 1)?;
            let h_b = hidden.get_batch_slice(b, 1)?;
            let c_b = mem_cell.get_batch_slice(b, 1)?;
            let g_b = fgio.get_batch_slice(b, 1)?;
            let mask_b = match &mask {
                Some(m) => Some(m.get_batch_slice(b, 1)?),
                None => None,
            };

            for t in 0..time {
                let xs = step(&x_b, t, feature)?;
                let mut hs = step(&h_b, t, unit)?;
                let mut cs = step(&c_b, t, unit)?;
                let mut gates = step(&g_b, t, NUM_GATES * unit)?;

                xs.dot_into(&weight_xh, &mut gates)?;
                gates.add_i(&bias_h)?;
                if t > 0 {
                    let hs_prev = step(&h_b, t - 1, unit)?;
                    gates.add_i(&hs_prev.dot(&weight_hh)?)?;
                }

                let [mut gi, mut gf, mut gg, mut go] = split_gates(&gates, unit)?;
                rec.run_i(&mut gi)?;
                rec.run_i(&mut gf)?;
                act.run_i(&mut gg)?;
                rec.run_i(&mut go)?;

                cs.fill(&gg)?;
                cs.multiply_i(&gi)?;
                if t > 0 {
                    let cs_prev = step(&c_b, t - 1, unit)?;
                    cs.add_i(&gf.multiply(&cs_prev)?)?;
                }

                hs.fill(&cs)?;
                act.run_i(&mut hs)?;
                hs.multiply_i(&go)?;
                if let Some(m) = &mask_b {
                    hs.multiply_i(&step(m, t, unit)?)?;
                }
            }
        }

        let mut output = context.get_output(0)?;
        if self.config.return_sequences {
            output.fill(&hidden)?;
        } else {
            for b in 0..batch {
                let last = step(&hidden.get_batch_slice(b, 1)?, time - 1, unit)?;
                output.get_batch_slice(b, 1)?.fill(&last)?;
            }
        }
        log::trace!("Lstm forward over {} batch entries x {} steps", batch, time);
        Ok(())
    }

    fn calc_derivative(&mut self, context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        self.backprop_gates(context)?;
        let handles = self.finalized_handles()?;
        let weight_xh_t = context.get_weight(handles.xh)?.transpose()?;
        let d_fgio = context.get_tensor(handles.d_fgio)?;
        let mut outgoing = context.get_outgoing_derivative(0)?;
        d_fgio.dot_into(&weight_xh_t, &mut outgoing)
    }

    fn calc_gradient(&mut self, context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        self.backprop_gates(context)?;
        let handles = self.finalized_handles()?;
        let unit = self.config.unit;

        let d_fgio = context.get_tensor(handles.d_fgio)?;
        let hidden = context.get_tensor(handles.hidden_state)?;
        let dim = hidden.dim();
        let (batch, time) = (dim.batch, dim.height);

        // Hidden states shifted one step later, zero at t = 0.
        let hidden_prev = Tensor::new(dim, hidden.dtype());
        for b in 0..batch {
            let h_b = hidden.get_batch_slice(b, 1)?;
            let p_b = hidden_prev.get_batch_slice(b, 1)?;
            for t in 1..time {
                step(&p_b, t, unit)?.fill(&step(&h_b, t - 1, unit)?)?;
            }
        }

        let d_xh = context.get_input(0)?.transpose()?.dot(&d_fgio)?;
        let d_hh = hidden_prev.transpose()?.dot(&d_fgio)?;
        let mut ones = Tensor::new(TensorDim::from_width(batch * time), hidden.dtype());
        ones.set_value_all(1.0)?;
        let d_bias = ones.dot(&d_fgio)?;

        for (handle, grad) in [(handles.xh, &d_xh), (handles.hh, &d_hh), (handles.bias, &d_bias)] {
            let weight = context.weight_mut(handle)?;
            weight.gradient_mut().write_values(&grad.to_vec()?)?;
            weight.apply_regularization_gradient()?;
        }
        Ok(())
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
                "hidden_state_activation" => self.config.hidden_state_activation = value.parse()?,
                "recurrent_activation" => self.config.recurrent_activation = value.parse()?,
                "return_sequences" => self.config.return_sequences = props::parse_bool(&key, &value)?,
                "dropout" => {
                    let rate = props::parse_f32(&key, &value)?;
                    if !(0.0..1.0).contains(&rate) {
                        return Err(LayerForgeError::InvalidProperty {
                            key,
                            value,
                            reason: "dropout must be in [0, 1)".to_string(),
                        });
                    }
                    self.config.dropout_rate = rate;
                }
                "weight_initializer" => self.config.weight_initializer = value.parse()?,
                "bias_initializer" => self.config.bias_initializer = value.parse()?,
                "weight_regularizer" => self.config.weight_regularizer = value.parse()?,
                "weight_regularizer_constant" => {
                    self.config.weight_regularizer_constant = props::parse_f32(&key, &value)?
                }
                "seed" => {
                    let seed = props::parse_u64(&key, &value)?;
                    self.config.seed = Some(seed);
                    self.rng = StdRng::seed_from_u64(seed);
                }
                _ => return Err(unknown_property(Self::TYPE, &key)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "lstm_test.rs"]
mod tests;
