use std::sync::Arc;

use crate::error::LayerForgeError;
use crate::tensor::{Tensor, TensorDim};

impl Tensor {
    /// Returns a zero-copy view of `dim.len()` elements starting `offset`
    /// elements into this tensor.
    ///
    /// The view shares this tensor's buffer: writes through either side are
    /// visible to the other. The range must lie inside this tensor's own
    /// extent, so a view of a view can only narrow.
    pub fn get_shared_data_tensor(&self, dim: TensorDim, offset: usize) -> Result<Tensor, LayerForgeError> {
        let storage = self.storage()?;
        let capacity = self.dim.len();
        match offset.checked_add(dim.len()) {
            Some(end) if end <= capacity => {}
            _ => {
                return Err(LayerForgeError::ViewOutOfBounds {
                    offset,
                    len: dim.len(),
                    capacity,
                })
            }
        }
        Ok(Tensor {
            storage: Some(Arc::clone(storage)),
            dim,
            dtype: self.dtype,
            offset: self.offset + offset,
            name: self.name.clone(),
        })
    }

    /// View over `count` consecutive batch entries starting at `batch`.
    pub fn get_batch_slice(&self, batch: usize, count: usize) -> Result<Tensor, LayerForgeError> {
        let dim = self.dim.with_batch(count);
        self.get_shared_data_tensor(dim, batch * self.dim.feature_len())
    }
}
