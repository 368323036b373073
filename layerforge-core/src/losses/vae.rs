use crate::context::{InitLayerContext, RunLayerContext};
use crate::error::LayerForgeError;
use crate::layers::{unknown_property, Layer};
use crate::losses::{apply_loss_scale, update_loss};
use crate::props;

const RECON: usize = 0;
const MU: usize = 1;
const LOGVAR: usize = 2;

/// Weights of the two loss terms.
#[derive(Debug, Clone, PartialEq)]
pub struct VaeLossConfig {
    pub mse_weight: f32,
    pub kld_weight: f32,
}

impl Default for VaeLossConfig {
    fn default() -> Self {
        VaeLossConfig {
            mse_weight: 1.0,
            kld_weight: 3.0,
        }
    }
}

/// Variational autoencoder loss over `(recon_x, mu, logvar)` and a label.
///
/// The output mirrors `recon_x`. When a label is bound the loss is the sum of
///
/// * `kld_weight * -(1 + logvar - mu^2 - exp(logvar)) / 2`
/// * `mse_weight * 2 * (recon_x - label)`
///
/// over every element. The reconstruction term is neither squared nor
/// averaged; its derivative is the one of the squared error.
#[derive(Debug, Clone, Default)]
pub struct VaeLoss {
    config: VaeLossConfig,
}

impl VaeLoss {
    pub const TYPE: &'static str = "vae_loss";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VaeLossConfig) -> Self {
        VaeLoss { config }
    }

    pub fn config(&self) -> &VaeLossConfig {
        &self.config
    }
}

impl Layer for VaeLoss {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn finalize(&mut self, context: &mut InitLayerContext) -> Result<(), LayerForgeError> {
        context.expect_inputs(Self::TYPE, 3)?;
        let dims = context.input_dimensions();
        if dims[MU] != dims[LOGVAR] {
            return Err(LayerForgeError::ShapeMismatch {
                expected: dims[MU],
                actual: dims[LOGVAR],
                operation: "vae_loss finalize".to_string(),
            });
        }
        let out = dims[RECON];
        context.set_output_dimensions(vec![out]);
        log::debug!("VaeLoss '{}' finalized with output {}", context.name(), out);
        Ok(())
    }

    fn forwarding(&mut self, context: &mut RunLayerContext, _training: bool) -> Result<(), LayerForgeError> {
        let recon = context.get_input(RECON)?;
        context.get_output(0)?.fill(recon)?;

        if !context.is_label_available(0) {
            // No label, no loss term: drop the previous pass's value.
            return update_loss(context, &[]);
        }
        let label = context.get_label(0)?;
        let mu = context.get_input(MU)?;
        let logvar = context.get_input(LOGVAR)?;

        let mut kld = logvar.add_scalar(1.0)?;
        kld.subtract_i(&mu.pow(2.0)?)?
            .subtract_i(&logvar.apply(f32::exp)?)?
            .multiply_scalar_i(-0.5 * self.config.kld_weight)?;

        let mut recon_term = recon.subtract(label)?;
        recon_term.multiply_scalar_i(2.0 * self.config.mse_weight)?;

        update_loss(context, &[&kld, &recon_term])
    }

    fn calc_derivative(&mut self, context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        let label = context.get_label(0)?;
        let recon = context.get_input(RECON)?;
        let mu = context.get_input(MU)?;
        let logvar = context.get_input(LOGVAR)?;

        let mut d_recon = recon.subtract(label)?;
        d_recon.multiply_scalar_i(2.0 * self.config.mse_weight)?;
        apply_loss_scale(context, &mut d_recon)?;
        context.get_outgoing_derivative(RECON)?.fill(&d_recon)?;

        let mut d_mu = mu.multiply_scalar(self.config.kld_weight)?;
        apply_loss_scale(context, &mut d_mu)?;
        context.get_outgoing_derivative(MU)?.fill(&d_mu)?;

        let mut d_logvar = logvar.apply(|v| v.exp() - 1.0)?;
        d_logvar.multiply_scalar_i(0.5 * self.config.kld_weight)?;
        apply_loss_scale(context, &mut d_logvar)?;
        context.get_outgoing_derivative(LOGVAR)?.fill(&d_logvar)?;
        Ok(())
    }

    fn requires_label(&self) -> bool {
        true
    }

    fn set_property(&mut self, properties: &[String]) -> Result<(), LayerForgeError> {
        for property in properties {
            let (key, value) = props::split_key_value(property)?;
            match key.as_str() {
                "mse_weight" => self.config.mse_weight = props::parse_f32(&key, &value)?,
                "kld_weight" => self.config.kld_weight = props::parse_f32(&key, &value)?,
                _ => return Err(unknown_property(Self::TYPE, &key)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "vae_test.rs"]
mod tests;
