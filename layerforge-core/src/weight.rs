use std::str::FromStr;

use rand::Rng;

use crate::error::LayerForgeError;
use crate::tensor::{Tensor, TensorDim};
use crate::types::DType;

/// How a weight's variable is filled on (re-)initialization.
///
/// Fan-in is the weight's height and fan-out its width, matching the
/// `[1, 1, in, out]` layout layers use for their matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Initializer {
    Zeros,
    Ones,
    LecunNormal,
    LecunUniform,
    XavierNormal,
    #[default]
    XavierUniform,
    HeNormal,
    HeUniform,
}

impl FromStr for Initializer {
    type Err = LayerForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zeros" => Ok(Initializer::Zeros),
            "ones" => Ok(Initializer::Ones),
            "lecun_normal" => Ok(Initializer::LecunNormal),
            "lecun_uniform" => Ok(Initializer::LecunUniform),
            "xavier_normal" => Ok(Initializer::XavierNormal),
            "xavier_uniform" => Ok(Initializer::XavierUniform),
            "he_normal" => Ok(Initializer::HeNormal),
            "he_uniform" => Ok(Initializer::HeUniform),
            other => Err(LayerForgeError::InvalidProperty {
                key: "initializer".to_string(),
                value: other.to_string(),
                reason: "unknown initializer".to_string(),
            }),
        }
    }
}

impl Initializer {
    /// Fills `tensor` according to this initializer.
    pub fn initialize<R: Rng + ?Sized>(&self, tensor: &mut Tensor, rng: &mut R) -> Result<(), LayerForgeError> {
        let dim = tensor.dim();
        let fan_in = dim.height.max(1) as f32;
        let fan_out = dim.width.max(1) as f32;
        match self {
            Initializer::Zeros => tensor.set_zero(),
            Initializer::Ones => tensor.set_value_all(1.0),
            Initializer::LecunNormal => tensor.set_rand_normal(0.0, (1.0 / fan_in).sqrt(), rng),
            Initializer::LecunUniform => {
                let limit = (3.0 / fan_in).sqrt();
                tensor.set_rand_uniform(-limit, limit, rng)
            }
            Initializer::XavierNormal => tensor.set_rand_normal(0.0, (2.0 / (fan_in + fan_out)).sqrt(), rng),
            Initializer::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out)).sqrt();
                tensor.set_rand_uniform(-limit, limit, rng)
            }
            Initializer::HeNormal => tensor.set_rand_normal(0.0, (2.0 / fan_in).sqrt(), rng),
            Initializer::HeUniform => {
                let limit = (6.0 / fan_in).sqrt();
                tensor.set_rand_uniform(-limit, limit, rng)
            }
        }
    }
}

/// Penalty attached to a weight's loss contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Regularizer {
    #[default]
    None,
    L2Norm,
}

impl FromStr for Regularizer {
    type Err = LayerForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Regularizer::None),
            "l2norm" => Ok(Regularizer::L2Norm),
            other => Err(LayerForgeError::InvalidProperty {
                key: "weight_regularizer".to_string(),
                value: other.to_string(),
                reason: "unknown regularizer".to_string(),
            }),
        }
    }
}

/// Declaration of a weight, as requested by a layer at finalize time.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSpec {
    pub dim: TensorDim,
    pub initializer: Initializer,
    pub regularizer: Regularizer,
    pub regularizer_constant: f32,
    pub trainable: bool,
    pub name: String,
}

impl WeightSpec {
    pub fn new(dim: TensorDim, name: impl Into<String>) -> Self {
        WeightSpec {
            dim,
            initializer: Initializer::default(),
            regularizer: Regularizer::None,
            regularizer_constant: 1.0,
            trainable: true,
            name: name.into(),
        }
    }

    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn with_regularizer(mut self, regularizer: Regularizer, constant: f32) -> Self {
        self.regularizer = regularizer;
        self.regularizer_constant = constant;
        self
    }

    pub fn trainable(mut self, trainable: bool) -> Self {
        self.trainable = trainable;
        self
    }
}

/// A trainable variable paired with its gradient.
///
/// Both tensors share the declared shape and the context's dtype.
#[derive(Debug, Clone)]
pub struct Weight {
    variable: Tensor,
    gradient: Tensor,
    spec: WeightSpec,
}

impl Weight {
    /// Allocates and initializes a weight from its declaration.
    pub fn new<R: Rng + ?Sized>(spec: WeightSpec, dtype: DType, rng: &mut R) -> Result<Self, LayerForgeError> {
        let mut variable = Tensor::new(spec.dim, dtype).with_name(spec.name.clone());
        let gradient = Tensor::new(spec.dim, dtype).with_name(format!("{}:grad", spec.name));
        spec.initializer.initialize(&mut variable, rng)?;
        log::debug!("Weight '{}' initialized as {:?} with shape {}", spec.name, spec.initializer, spec.dim);
        Ok(Weight {
            variable,
            gradient,
            spec,
        })
    }

    /// Re-declares the weight: reallocates if the shape changed, then re-initializes
    /// and clears the gradient.
    pub fn reset<R: Rng + ?Sized>(&mut self, spec: WeightSpec, rng: &mut R) -> Result<(), LayerForgeError> {
        let dtype = self.variable.dtype();
        *self = Weight::new(spec, dtype, rng)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn dim(&self) -> TensorDim {
        self.spec.dim
    }

    pub fn spec(&self) -> &WeightSpec {
        &self.spec
    }

    pub fn is_trainable(&self) -> bool {
        self.spec.trainable
    }

    pub fn regularizer(&self) -> Regularizer {
        self.spec.regularizer
    }

    pub fn variable(&self) -> &Tensor {
        &self.variable
    }

    pub fn variable_mut(&mut self) -> &mut Tensor {
        &mut self.variable
    }

    pub fn gradient(&self) -> &Tensor {
        &self.gradient
    }

    pub fn gradient_mut(&mut self) -> &mut Tensor {
        &mut self.gradient
    }

    /// `0.5 * constant * ||w||^2` for L2, zero otherwise or when frozen.
    pub fn regularization_loss(&self) -> Result<f32, LayerForgeError> {
        match (self.spec.regularizer, self.spec.trainable) {
            (Regularizer::L2Norm, true) => {
                let norm = self.variable.l2norm()?;
                Ok(0.5 * self.spec.regularizer_constant * norm * norm)
            }
            _ => Ok(0.0),
        }
    }

    /// Adds the regularizer's derivative (`constant * w` for L2) to the gradient.
    pub fn apply_regularization_gradient(&mut self) -> Result<(), LayerForgeError> {
        if self.spec.regularizer == Regularizer::L2Norm && self.spec.trainable {
            let penalty = self.variable.multiply_scalar(self.spec.regularizer_constant)?;
            self.gradient.add_i(&penalty)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "weight_test.rs"]
mod tests;
