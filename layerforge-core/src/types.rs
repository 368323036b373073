use half::f16;
use std::fmt::{self, Debug};

/// Element types a `Tensor` can hold.
///
/// `F32` is the canonical training precision. `F16` is a storage format:
/// values are widened to `f32` for arithmetic and narrowed back on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DType {
    /// 32-bit floating-point type.
    #[default]
    F32,
    /// 16-bit IEEE half float.
    F16,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            DType::F32 => std::mem::size_of::<f32>(),
            DType::F16 => std::mem::size_of::<f16>(),
        }
    }

    /// The precision loss and gradient math are carried out in.
    pub fn canonical() -> DType {
        DType::F32
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F16 => write!(f, "f16"),
        }
    }
}

/// Rust element types that can back a tensor buffer.
///
/// This is the single conversion boundary between the storage formats and the
/// `f32` arithmetic every kernel runs in.
pub trait TensorElement: num_traits::Zero + Copy + Debug + Send + Sync + 'static {
    /// The matching `DType` variant.
    const DTYPE: DType;

    fn to_f32(self) -> f32;

    fn from_f32(value: f32) -> Self;
}

impl TensorElement for f32 {
    const DTYPE: DType = DType::F32;

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

impl TensorElement for f16 {
    const DTYPE: DType = DType::F16;

    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}
