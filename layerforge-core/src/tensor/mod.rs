// src/tensor/mod.rs

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use half::f16;

use crate::buffer::CpuBuffer;
use crate::error::LayerForgeError;
use crate::types::DType;

mod arithmetic;
mod debug;
pub mod dim;
mod linalg;
mod random;
mod view;

pub use dim::TensorDim;

/// Whether a tensor currently owns a handle on element storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationState {
    Unallocated,
    Allocated,
}

/// A 4-D numeric buffer (batch, channel, height, width).
///
/// `Tensor` holds an `Arc<RwLock<CpuBuffer>>` so that:
/// 1.  **Views are zero-copy:** `get_shared_data_tensor` hands out another
///     `Tensor` pointing at the same buffer with a narrower shape and an
///     element offset. Writes through a view land in the parent.
/// 2.  **Clones are shallow:** `clone()` shares the buffer. Use `deep_clone`
///     or the copying arithmetic (`add`, `multiply`, ...) for fresh storage.
///
/// Concurrent writers to a tensor and its views must be serialized by the
/// caller; the lock only keeps individual element runs consistent.
#[derive(Clone)]
pub struct Tensor {
    pub(crate) storage: Option<Arc<RwLock<CpuBuffer>>>,
    pub(crate) dim: TensorDim,
    pub(crate) dtype: DType,
    /// Offset, in elements, of this tensor's first element inside `storage`.
    pub(crate) offset: usize,
    pub(crate) name: String,
}

impl Tensor {
    /// Creates a zero-filled, allocated tensor.
    pub fn new(dim: TensorDim, dtype: DType) -> Self {
        Tensor {
            storage: Some(Arc::new(RwLock::new(CpuBuffer::zeros(dtype, dim.len())))),
            dim,
            dtype,
            offset: 0,
            name: String::new(),
        }
    }

    /// Creates a zero-filled F32 tensor.
    pub fn zeros(dim: TensorDim) -> Self {
        Tensor::new(dim, DType::F32)
    }

    /// Creates a tensor descriptor without backing storage; call `allocate` before use.
    pub fn unallocated(dim: TensorDim, dtype: DType) -> Self {
        Tensor {
            storage: None,
            dim,
            dtype,
            offset: 0,
            name: String::new(),
        }
    }

    /// Creates an F32 tensor from row-major values.
    ///
    /// # Errors
    /// Returns `LayerForgeError::InvalidArgument` if `values.len()` differs from `dim.len()`.
    pub fn from_vec(dim: TensorDim, values: Vec<f32>) -> Result<Self, LayerForgeError> {
        Self::check_data_len(dim, values.len())?;
        Ok(Tensor {
            storage: Some(Arc::new(RwLock::new(CpuBuffer::F32(values)))),
            dim,
            dtype: DType::F32,
            offset: 0,
            name: String::new(),
        })
    }

    /// Creates an F16 tensor from row-major half values.
    pub fn from_vec_f16(dim: TensorDim, values: Vec<f16>) -> Result<Self, LayerForgeError> {
        Self::check_data_len(dim, values.len())?;
        Ok(Tensor {
            storage: Some(Arc::new(RwLock::new(CpuBuffer::F16(values)))),
            dim,
            dtype: DType::F16,
            offset: 0,
            name: String::new(),
        })
    }

    fn check_data_len(dim: TensorDim, data_len: usize) -> Result<(), LayerForgeError> {
        if data_len != dim.len() {
            return Err(LayerForgeError::InvalidArgument(format!(
                "data length {} does not match shape {} ({} elements)",
                data_len,
                dim,
                dim.len()
            )));
        }
        Ok(())
    }

    /// Attaches a debug name, reported in allocation errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dim(&self) -> TensorDim {
        self.dim
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.dim.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dim.is_empty()
    }

    /// Element offset inside the shared buffer (non-zero for views).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte offset inside the shared buffer.
    pub fn byte_offset(&self) -> usize {
        self.offset * self.dtype.size_of()
    }

    // --- Allocation lifecycle ---

    pub fn allocation_state(&self) -> AllocationState {
        match self.storage {
            Some(_) => AllocationState::Allocated,
            None => AllocationState::Unallocated,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.storage.is_some()
    }

    /// Gives an unallocated tensor fresh zeroed storage. No-op when already allocated.
    pub fn allocate(&mut self) {
        if self.storage.is_none() {
            self.storage = Some(Arc::new(RwLock::new(CpuBuffer::zeros(self.dtype, self.dim.len()))));
            self.offset = 0;
        }
    }

    /// Drops this tensor's handle on its storage. Views taken earlier keep the
    /// buffer alive; the tensor itself becomes unusable until `allocate`.
    pub fn deallocate(&mut self) {
        self.storage = None;
        self.offset = 0;
    }

    /// True when both tensors point at the same underlying buffer.
    pub fn shares_storage_with(&self, other: &Tensor) -> bool {
        match (&self.storage, &other.storage) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn storage(&self) -> Result<&Arc<RwLock<CpuBuffer>>, LayerForgeError> {
        self.storage
            .as_ref()
            .ok_or_else(|| LayerForgeError::TensorNotAllocated {
                name: self.name.clone(),
            })
    }

    pub(crate) fn read_buffer(&self) -> Result<RwLockReadGuard<'_, CpuBuffer>, LayerForgeError> {
        self.storage()?
            .read()
            .map_err(|e| LayerForgeError::LockError {
                lock_type: "read".to_string(),
                reason: e.to_string(),
            })
    }

    pub(crate) fn write_buffer(&self) -> Result<RwLockWriteGuard<'_, CpuBuffer>, LayerForgeError> {
        self.storage()?
            .write()
            .map_err(|e| LayerForgeError::LockError {
                lock_type: "write".to_string(),
                reason: e.to_string(),
            })
    }

    // --- Element access ---

    /// Copies the elements out as f32, whatever the storage type.
    pub fn to_vec(&self) -> Result<Vec<f32>, LayerForgeError> {
        self.read_buffer()?.read_f32(self.offset, self.dim.len())
    }

    /// Overwrites every element from f32 values, narrowing to the storage type.
    pub fn write_values(&mut self, values: &[f32]) -> Result<(), LayerForgeError> {
        Self::check_data_len(self.dim, values.len())?;
        let offset = self.offset;
        self.write_buffer()?.write_f32(offset, values)
    }

    /// Rewrites each element through `f(flat_index, value)`.
    pub(crate) fn map_values<F>(&mut self, f: F) -> Result<(), LayerForgeError>
    where
        F: FnMut(usize, f32) -> f32,
    {
        let (offset, len) = (self.offset, self.dim.len());
        self.write_buffer()?.map_range(offset, len, f)
    }

    fn flat_index(&self, b: usize, c: usize, h: usize, w: usize) -> Result<usize, LayerForgeError> {
        self.dim
            .index(b, c, h, w)
            .ok_or(LayerForgeError::IndexOutOfBounds {
                index: [b, c, h, w],
                dim: self.dim,
            })
    }

    pub fn get_value(&self, b: usize, c: usize, h: usize, w: usize) -> Result<f32, LayerForgeError> {
        let index = self.flat_index(b, c, h, w)?;
        let values = self.read_buffer()?.read_f32(self.offset + index, 1)?;
        Ok(values[0])
    }

    pub fn set_value(
        &mut self,
        b: usize,
        c: usize,
        h: usize,
        w: usize,
        value: f32,
    ) -> Result<(), LayerForgeError> {
        let index = self.flat_index(b, c, h, w)?;
        let offset = self.offset + index;
        self.write_buffer()?.write_f32(offset, &[value])
    }

    /// Sets every element to `value`.
    pub fn set_value_all(&mut self, value: f32) -> Result<(), LayerForgeError> {
        self.map_values(|_, _| value)
    }

    pub fn set_zero(&mut self) -> Result<(), LayerForgeError> {
        self.set_value_all(0.0)
    }

    // --- Copies ---

    /// Copies values from `other` into this tensor's existing buffer.
    ///
    /// Shapes must match exactly. Differing element types are converted
    /// explicitly through f32; the receiver keeps its own dtype.
    pub fn fill(&mut self, other: &Tensor) -> Result<(), LayerForgeError> {
        self.ensure_same_dim(other, "fill")?;
        // Snapshot first: `other` may be a view of our own buffer.
        let values = other.to_vec()?;
        self.write_values(&values)
    }

    /// Deep copy with fresh storage and the same dtype.
    pub fn deep_clone(&self) -> Result<Tensor, LayerForgeError> {
        self.clone_with_dtype(self.dtype)
    }

    /// Deep copy converted to `dtype`.
    pub fn clone_with_dtype(&self, dtype: DType) -> Result<Tensor, LayerForgeError> {
        let values = self.to_vec()?;
        Ok(Tensor {
            storage: Some(Arc::new(RwLock::new(CpuBuffer::from_f32(dtype, &values)))),
            dim: self.dim,
            dtype,
            offset: 0,
            name: self.name.clone(),
        })
    }

    pub(crate) fn ensure_same_dim(&self, other: &Tensor, operation: &str) -> Result<(), LayerForgeError> {
        if self.dim != other.dim {
            return Err(LayerForgeError::ShapeMismatch {
                expected: self.dim,
                actual: other.dim,
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_same_dtype(&self, other: &Tensor, operation: &str) -> Result<(), LayerForgeError> {
        if self.dtype != other.dtype {
            return Err(LayerForgeError::DataTypeMismatch {
                expected: self.dtype,
                actual: other.dtype,
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    // --- Reductions ---

    pub fn sum(&self) -> Result<f32, LayerForgeError> {
        Ok(self.to_vec()?.iter().sum())
    }

    /// Euclidean norm: square root of the sum of squares.
    pub fn l2norm(&self) -> Result<f32, LayerForgeError> {
        let sum_sq: f32 = self.to_vec()?.iter().map(|v| v * v).sum();
        Ok(sum_sq.sqrt())
    }
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
