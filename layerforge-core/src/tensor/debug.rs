// src/tensor/debug.rs
use std::fmt;

use crate::tensor::Tensor;

/// Largest element count printed in full by `Debug`.
const PREVIEW_LIMIT: usize = 8;

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(name={:?}, dim={}, dtype={}, offset={}, ",
            self.name, self.dim, self.dtype, self.offset
        )?;
        if !self.is_allocated() {
            return write!(f, "unallocated)");
        }
        match self.to_vec() {
            Ok(values) if values.len() <= PREVIEW_LIMIT => write!(f, "data={:?})", values),
            Ok(values) => write!(f, "data=[{:?}, ... {} elements])", &values[..PREVIEW_LIMIT], values.len()),
            Err(_) => write!(f, "data=<unreadable>)"),
        }
    }
}
