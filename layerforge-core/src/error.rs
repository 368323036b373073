use crate::tensor::TensorDim;
use crate::types::DType;
use thiserror::Error;

/// Custom error type for the LayerForge engine.
///
/// Every failure inside a tensor operation or a layer step surfaces as one of
/// these variants. Errors are fatal to the step that produced them; retrying is
/// the caller's business.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum LayerForgeError {
    #[error("Shape mismatch: expected {expected}, got {actual} during operation {operation}")]
    ShapeMismatch {
        expected: TensorDim,
        actual: TensorDim,
        operation: String,
    },

    #[error("Data type mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    DataTypeMismatch {
        expected: DType,
        actual: DType,
        operation: String,
    },

    #[error("Layer '{layer}' expects {expected} input(s), got {actual}")]
    InvalidInputCount {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("Tensor '{name}' is not allocated")]
    TensorNotAllocated { name: String },

    #[error("View out of bounds: offset {offset} + length {len} exceeds capacity {capacity}")]
    ViewOutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Index out of bounds: index {index:?} for shape {dim}")]
    IndexOutOfBounds { index: [usize; 4], dim: TensorDim },

    #[error("Invalid {kind} index {index}: it was never declared")]
    InvalidHandle { kind: &'static str, index: usize },

    #[error("Label {index} is not available for this pass")]
    MissingLabel { index: usize },

    #[error("Numeric failure in {operation}: {reason}")]
    NumericFailure { operation: String, reason: String },

    #[error("Division by zero error")]
    DivisionByZero,

    #[error("Layer '{layer}' does not support backward propagation")]
    UnsupportedBackward { layer: String },

    #[error("Layer '{layer}' used before finalize")]
    NotFinalized { layer: String },

    #[error("Layer '{layer}' is already finalized")]
    AlreadyFinalized { layer: String },

    #[error("Invalid value '{value}' for property '{key}': {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown property '{key}' for layer '{layer}'")]
    UnknownProperty { layer: String, key: String },

    #[error("Unknown layer type: {0}")]
    UnknownLayerType(String),

    #[error("Layer type already registered: {0}")]
    DuplicateLayerType(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to acquire {lock_type} lock: {reason}")]
    LockError { lock_type: String, reason: String },

    #[error("Data source error: {0}")]
    DataSource(String),
}
