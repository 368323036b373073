use crate::error::LayerForgeError;
use crate::tensor::{Tensor, TensorDim};

impl Tensor {
    /// Matrix product, each operand seen as `(batch*channel*height) x width`.
    ///
    /// The result keeps `self`'s batch, channel and height and takes
    /// `other`'s width.
    pub fn dot(&self, other: &Tensor) -> Result<Tensor, LayerForgeError> {
        let out_dim = self.dot_output_dim(other)?;
        let mut out = Tensor::new(out_dim, self.dtype);
        self.dot_into(other, &mut out)?;
        Ok(out)
    }

    /// Matrix product written into `out`'s existing buffer.
    ///
    /// `out` may be a view; nothing is allocated for it. Its element count must
    /// equal `rows(self) * other.width`.
    pub fn dot_into(&self, other: &Tensor, out: &mut Tensor) -> Result<(), LayerForgeError> {
        let expected = self.dot_output_dim(other)?;
        if out.len() != expected.len() {
            return Err(LayerForgeError::ShapeMismatch {
                expected,
                actual: out.dim(),
                operation: "dot_into (output)".to_string(),
            });
        }

        let (m, k, n) = (self.dim.matrix_rows(), self.dim.width, other.dim.width);
        let a = self.to_vec()?;
        let b = other.to_vec()?;
        let mut c = vec![0.0f32; m * n];
        for i in 0..m {
            let a_row = &a[i * k..(i + 1) * k];
            let c_row = &mut c[i * n..(i + 1) * n];
            for (p, &a_ip) in a_row.iter().enumerate() {
                if a_ip == 0.0 {
                    continue;
                }
                let b_row = &b[p * n..(p + 1) * n];
                for (c_ij, &b_pj) in c_row.iter_mut().zip(b_row) {
                    *c_ij += a_ip * b_pj;
                }
            }
        }
        out.write_values(&c)
    }

    /// Matrix transpose of the `(batch*channel*height) x width` view, returned
    /// as a fresh `[1, 1, width, rows]` tensor.
    pub fn transpose(&self) -> Result<Tensor, LayerForgeError> {
        let (rows, cols) = (self.dim.matrix_rows(), self.dim.width);
        let values = self.to_vec()?;
        let mut out = Tensor::new(TensorDim::new(1, 1, cols, rows), self.dtype);
        let transposed: Vec<f32> = (0..cols)
            .flat_map(|j| (0..rows).map(move |i| (i, j)))
            .map(|(i, j)| values[i * cols + j])
            .collect();
        out.write_values(&transposed)?;
        Ok(out)
    }

    fn dot_output_dim(&self, other: &Tensor) -> Result<TensorDim, LayerForgeError> {
        self.ensure_same_dtype(other, "dot")?;
        if self.dim.width != other.dim.matrix_rows() {
            return Err(LayerForgeError::ShapeMismatch {
                expected: TensorDim::new(1, 1, self.dim.width, other.dim.width),
                actual: other.dim,
                operation: "dot (inner dimension)".to_string(),
            });
        }
        Ok(self.dim.with_width(other.dim.width))
    }
}
