use crate::error::LayerForgeError;
use crate::tensor::Tensor;

// Copying forms allocate a result and leave `self` untouched.
// `_i` forms mutate `self` in place and return it for chaining:
//
//     l.subtract_i(&a)?.divide_scalar_i(-2.0)?;
//
// Tensor-tensor forms require identical shape and dtype; nothing is broadcast.

impl Tensor {
    fn zip_inplace<F>(&mut self, other: &Tensor, operation: &str, f: F) -> Result<&mut Self, LayerForgeError>
    where
        F: Fn(f32, f32) -> f32,
    {
        self.ensure_same_dim(other, operation)?;
        self.ensure_same_dtype(other, operation)?;
        // Read the right-hand side before taking the write lock: views of the
        // same buffer share one lock.
        let rhs = other.to_vec()?;
        self.map_values(|i, v| f(v, rhs[i]))?;
        Ok(self)
    }

    fn scalar_inplace<F>(&mut self, f: F) -> Result<&mut Self, LayerForgeError>
    where
        F: Fn(f32) -> f32,
    {
        self.map_values(|_, v| f(v))?;
        Ok(self)
    }

    fn copying<F>(&self, op: F) -> Result<Tensor, LayerForgeError>
    where
        F: FnOnce(&mut Tensor) -> Result<&mut Tensor, LayerForgeError>,
    {
        let mut out = self.deep_clone()?;
        op(&mut out)?;
        Ok(out)
    }

    // --- Tensor operands ---

    pub fn add(&self, other: &Tensor) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.add_i(other))
    }

    pub fn add_i(&mut self, other: &Tensor) -> Result<&mut Self, LayerForgeError> {
        self.zip_inplace(other, "add_i", |a, b| a + b)
    }

    pub fn subtract(&self, other: &Tensor) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.subtract_i(other))
    }

    pub fn subtract_i(&mut self, other: &Tensor) -> Result<&mut Self, LayerForgeError> {
        self.zip_inplace(other, "subtract_i", |a, b| a - b)
    }

    pub fn multiply(&self, other: &Tensor) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.multiply_i(other))
    }

    pub fn multiply_i(&mut self, other: &Tensor) -> Result<&mut Self, LayerForgeError> {
        self.zip_inplace(other, "multiply_i", |a, b| a * b)
    }

    /// Elementwise division. Zero divisors follow IEEE semantics (inf/NaN).
    pub fn divide(&self, other: &Tensor) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.divide_i(other))
    }

    pub fn divide_i(&mut self, other: &Tensor) -> Result<&mut Self, LayerForgeError> {
        self.zip_inplace(other, "divide_i", |a, b| a / b)
    }

    // --- Scalar operands ---

    pub fn add_scalar(&self, value: f32) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.add_scalar_i(value))
    }

    pub fn add_scalar_i(&mut self, value: f32) -> Result<&mut Self, LayerForgeError> {
        self.scalar_inplace(|v| v + value)
    }

    pub fn subtract_scalar(&self, value: f32) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.subtract_scalar_i(value))
    }

    pub fn subtract_scalar_i(&mut self, value: f32) -> Result<&mut Self, LayerForgeError> {
        self.scalar_inplace(|v| v - value)
    }

    pub fn multiply_scalar(&self, value: f32) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.multiply_scalar_i(value))
    }

    pub fn multiply_scalar_i(&mut self, value: f32) -> Result<&mut Self, LayerForgeError> {
        self.scalar_inplace(|v| v * value)
    }

    pub fn divide_scalar(&self, value: f32) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.divide_scalar_i(value))
    }

    /// Divides every element by `value`.
    ///
    /// # Errors
    /// Returns `LayerForgeError::NumericFailure` when `value` is zero or not
    /// finite; the tensor is left unchanged in that case.
    pub fn divide_scalar_i(&mut self, value: f32) -> Result<&mut Self, LayerForgeError> {
        if value == 0.0 || !value.is_finite() {
            return Err(LayerForgeError::NumericFailure {
                operation: "divide_scalar_i".to_string(),
                reason: format!("invalid divisor {}", value),
            });
        }
        self.scalar_inplace(|v| v / value)
    }

    pub fn pow(&self, exponent: f32) -> Result<Tensor, LayerForgeError> {
        self.copying(|t| t.pow_i(exponent))
    }

    pub fn pow_i(&mut self, exponent: f32) -> Result<&mut Self, LayerForgeError> {
        self.scalar_inplace(|v| v.powf(exponent))
    }

    // --- Elementwise functions ---

    /// Returns a new tensor with `f` applied to every element.
    pub fn apply<F>(&self, f: F) -> Result<Tensor, LayerForgeError>
    where
        F: Fn(f32) -> f32,
    {
        self.copying(|t| t.apply_i(f))
    }

    /// Applies `f` to every element in place.
    pub fn apply_i<F>(&mut self, f: F) -> Result<&mut Self, LayerForgeError>
    where
        F: Fn(f32) -> f32,
    {
        self.scalar_inplace(f)
    }
}

#[cfg(test)]
#[path = "arithmetic_test.rs"]
mod tests;
