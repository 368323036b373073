use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::context::{InitLayerContext, RunLayerContext, TensorHandle};
use crate::error::LayerForgeError;
use crate::layers::{unknown_property, Layer};
use crate::props;

const MU: usize = 0;
const LOGVAR: usize = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BottleneckConfig {
    /// Seed for the noise generator. `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Variational reparameterization: `z = mu + exp(0.5 * logvar) * epsilon`.
///
/// Inputs are `mu` and `logvar` of identical shape; the output has that shape.
/// The noise draw `epsilon` is kept in a scratch tensor so the backward pass
/// differentiates through the exact sample used forward. Inference passes use
/// `epsilon = 0`, i.e. `z = mu`.
#[derive(Debug)]
pub struct Bottleneck {
    config: BottleneckConfig,
    rng: StdRng,
    epsilon: Option<TensorHandle>,
}

impl Bottleneck {
    pub const TYPE: &'static str = "bottleneck";

    pub fn new() -> Self {
        Self::with_config(BottleneckConfig::default())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_config(BottleneckConfig { seed: Some(seed) })
    }

    pub fn with_config(config: BottleneckConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Bottleneck {
            config,
            rng,
            epsilon: None,
        }
    }

    pub fn config(&self) -> &BottleneckConfig {
        &self.config
    }

    /// Scratch tensor holding the most recent noise draw.
    pub fn epsilon(&self) -> Option<TensorHandle> {
        self.epsilon
    }

    fn epsilon_handle(&self) -> Result<TensorHandle, LayerForgeError> {
        self.epsilon.ok_or_else(|| LayerForgeError::NotFinalized {
            layer: Self::TYPE.to_string(),
        })
    }
}

impl Default for Bottleneck {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for Bottleneck {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn finalize(&mut self, context: &mut InitLayerContext) -> Result<(), LayerForgeError> {
        if self.epsilon.is_some() {
            return Err(LayerForgeError::AlreadyFinalized {
                layer: Self::TYPE.to_string(),
            });
        }
        context.expect_inputs(Self::TYPE, 2)?;
        let dims = context.input_dimensions();
        let (mu_dim, logvar_dim) = (dims[MU], dims[LOGVAR]);
        if mu_dim != logvar_dim {
            return Err(LayerForgeError::ShapeMismatch {
                expected: mu_dim,
                actual: logvar_dim,
                operation: "bottleneck finalize".to_string(),
            });
        }

        self.epsilon = Some(context.request_tensor(mu_dim, "epsilon"));
        context.set_output_dimensions(vec![mu_dim]);
        log::debug!("Bottleneck '{}' finalized with shape {}", context.name(), mu_dim);
        Ok(())
    }

    fn forwarding(&mut self, context: &mut RunLayerContext, training: bool) -> Result<(), LayerForgeError> {
        let handle = self.epsilon_handle()?;
        let mu = context.get_input(MU)?;
        let logvar = context.get_input(LOGVAR)?;
        let mut epsilon = context.get_tensor(handle)?;

        if training {
            epsilon.set_rand_normal(0.0, 1.0, &mut self.rng)?;
        } else {
            epsilon.set_zero()?;
        }

        let mut z = logvar.apply(|v| (0.5 * v).exp())?;
        z.multiply_i(&epsilon)?.add_i(mu)?;
        context.get_output(0)?.fill(&z)?;
        log::trace!("Bottleneck forward (training = {})", training);
        Ok(())
    }

    fn calc_derivative(&mut self, context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        let handle = self.epsilon_handle()?;
        let dz = context.get_incoming_derivative(0)?;
        let logvar = context.get_input(LOGVAR)?;
        let epsilon = context.get_tensor(handle)?;

        // dL/dmu = dL/dz
        context.get_outgoing_derivative(MU)?.fill(dz)?;

        // dL/dlogvar = epsilon * sigma / 2 * dL/dz
        let mut dlogvar = logvar.apply(|v| (0.5 * v).exp())?;
        dlogvar.multiply_i(&epsilon)?.multiply_i(dz)?.multiply_scalar_i(0.5)?;
        context.get_outgoing_derivative(LOGVAR)?.fill(&dlogvar)?;
        Ok(())
    }

    fn set_property(&mut self, properties: &[String]) -> Result<(), LayerForgeError> {
        for property in properties {
            let (key, value) = props::split_key_value(property)?;
            match key.as_str() {
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
#[path = "bottleneck_test.rs"]
mod tests;
