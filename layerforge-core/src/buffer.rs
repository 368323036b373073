use std::fmt::Debug;

use half::f16;

use crate::error::LayerForgeError;
use crate::types::{DType, TensorElement};

/// Typed element storage living in main memory.
///
/// A `Tensor` and all the views carved out of it share one `CpuBuffer`
/// behind an `Arc<RwLock<..>>`, so a write through any of them is seen by all.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuBuffer {
    /// Buffer holding f32 data.
    F32(Vec<f32>),
    /// Buffer holding half-precision data.
    F16(Vec<f16>),
}

impl CpuBuffer {
    /// Allocates a zero-filled buffer of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => CpuBuffer::F32(vec![0.0; len]),
            DType::F16 => CpuBuffer::F16(vec![f16::ZERO; len]),
        }
    }

    /// Builds a buffer of `dtype` from f32 values, narrowing if needed.
    pub fn from_f32(dtype: DType, values: &[f32]) -> Self {
        match dtype {
            DType::F32 => CpuBuffer::F32(values.to_vec()),
            DType::F16 => CpuBuffer::F16(values.iter().map(|&v| f16::from_f32(v)).collect()),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            CpuBuffer::F32(_) => DType::F32,
            CpuBuffer::F16(_) => DType::F16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CpuBuffer::F32(data) => data.len(),
            CpuBuffer::F16(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), LayerForgeError> {
        let capacity = self.len();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(LayerForgeError::ViewOutOfBounds {
                offset,
                len,
                capacity,
            }),
        }
    }

    /// Reads `len` elements starting at `offset`, widened to f32.
    pub fn read_f32(&self, offset: usize, len: usize) -> Result<Vec<f32>, LayerForgeError> {
        self.check_range(offset, len)?;
        Ok(match self {
            CpuBuffer::F32(data) => data[offset..offset + len].to_vec(),
            CpuBuffer::F16(data) => widen(&data[offset..offset + len]),
        })
    }

    /// Overwrites the range starting at `offset` with `values`.
    pub fn write_f32(&mut self, offset: usize, values: &[f32]) -> Result<(), LayerForgeError> {
        self.check_range(offset, values.len())?;
        match self {
            CpuBuffer::F32(data) => data[offset..offset + values.len()].copy_from_slice(values),
            CpuBuffer::F16(data) => narrow_into(&mut data[offset..offset + values.len()], values),
        }
        Ok(())
    }

    /// Rewrites every element of the range through `f(index, value)`.
    pub fn map_range<F>(&mut self, offset: usize, len: usize, mut f: F) -> Result<(), LayerForgeError>
    where
        F: FnMut(usize, f32) -> f32,
    {
        self.check_range(offset, len)?;
        match self {
            CpuBuffer::F32(data) => map_slice(&mut data[offset..offset + len], &mut f),
            CpuBuffer::F16(data) => map_slice(&mut data[offset..offset + len], &mut f),
        }
        Ok(())
    }
}

fn widen<E: TensorElement>(values: &[E]) -> Vec<f32> {
    values.iter().map(|v| v.to_f32()).collect()
}

fn narrow_into<E: TensorElement>(dst: &mut [E], values: &[f32]) {
    for (slot, &v) in dst.iter_mut().zip(values) {
        *slot = E::from_f32(v);
    }
}

fn map_slice<E, F>(data: &mut [E], f: &mut F)
where
    E: TensorElement,
    F: FnMut(usize, f32) -> f32,
{
    for (i, slot) in data.iter_mut().enumerate() {
        *slot = E::from_f32(f(i, slot.to_f32()));
    }
}
