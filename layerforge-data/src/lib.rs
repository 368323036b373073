//! Pull-based sample sources feeding LayerForge input and label tensors.

pub mod batch;
pub mod generator;

// Re-export main components
pub use batch::{BatchFiller, BatchStatus};
pub use generator::{FnSampleGenerator, SampleGenerator, VecSampleGenerator};
