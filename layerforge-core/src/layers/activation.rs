use std::str::FromStr;

use crate::error::LayerForgeError;
use crate::tensor::Tensor;

/// Elementwise non-linearity selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Tanh,
    Sigmoid,
    Relu,
    /// Identity.
    None,
}

impl Activation {
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Relu => x.max(0.0),
            Activation::None => x,
        }
    }

    /// Derivative expressed through the activation's output `y = apply(x)`.
    pub fn derivative_from_output(&self, y: f32) -> f32 {
        match self {
            Activation::Tanh => 1.0 - y * y,
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::None => 1.0,
        }
    }

    /// Multiplies `grad` in place by the derivative at the outputs `output`.
    pub fn run_prime_i(&self, output: &Tensor, grad: &mut Tensor) -> Result<(), LayerForgeError> {
        if *self == Activation::None {
            return Ok(());
        }
        let act = *self;
        let prime = output.apply(|y| act.derivative_from_output(y))?;
        grad.multiply_i(&prime)?;
        Ok(())
    }

    /// Applies the activation to `tensor` in place.
    pub fn run_i(&self, tensor: &mut Tensor) -> Result<(), LayerForgeError> {
        if *self == Activation::None {
            return Ok(());
        }
        let act = *self;
        tensor.apply_i(|x| act.apply(x))?;
        Ok(())
    }
}

impl FromStr for Activation {
    type Err = LayerForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            "relu" => Ok(Activation::Relu),
            "none" | "linear" => Ok(Activation::None),
            other => Err(LayerForgeError::InvalidProperty {
                key: "activation".to_string(),
                value: other.to_string(),
                reason: "unknown activation".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorDim;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_values() {
        assert_relative_eq!(Activation::Tanh.apply(0.5), 0.5f32.tanh());
        assert_relative_eq!(Activation::Sigmoid.apply(0.0), 0.5);
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::None.apply(-2.0), -2.0);
    }

    #[test]
    fn test_run_in_place() {
        let mut t = Tensor::from_vec(TensorDim::from_width(3), vec![-1.0, 0.0, 2.0]).unwrap();
        Activation::Relu.run_i(&mut t).unwrap();
        assert_eq!(t.to_vec().unwrap(), vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_derivative_from_output() {
        let x = 0.3f32;
        let h = 1e-3f32;
        for act in [Activation::Tanh, Activation::Sigmoid, Activation::None] {
            let numeric = (act.apply(x + h) - act.apply(x - h)) / (2.0 * h);
            assert_relative_eq!(act.derivative_from_output(act.apply(x)), numeric, epsilon = 1e-3);
        }
        assert_eq!(Activation::Relu.derivative_from_output(0.0), 0.0);
        assert_eq!(Activation::Relu.derivative_from_output(2.0), 1.0);
    }

    #[test]
    fn test_run_prime_scales_gradient() {
        let y = Tensor::from_vec(TensorDim::from_width(2), vec![0.5, 0.0]).unwrap();
        let mut grad = Tensor::from_vec(TensorDim::from_width(2), vec![2.0, 2.0]).unwrap();
        Activation::Tanh.run_prime_i(&y, &mut grad).unwrap();
        assert_eq!(grad.to_vec().unwrap(), vec![1.5, 2.0]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("TANH".parse::<Activation>().unwrap(), Activation::Tanh);
        assert_eq!("linear".parse::<Activation>().unwrap(), Activation::None);
        assert!("softmax".parse::<Activation>().is_err());
    }
}
