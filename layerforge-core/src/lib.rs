// Core modules of the crate
pub mod buffer;
pub mod context;
pub mod error;
pub mod layers;
pub mod losses;
pub mod props;
pub mod registry;
pub mod tensor;
pub mod types;
pub mod utils;
pub mod weight;

// Flat re-exports so callers can write `layerforge_core::Tensor` and friends.
pub use context::{InitLayerContext, RunLayerContext, TensorHandle, WeightHandle};
pub use error::LayerForgeError;
pub use layers::Layer;
pub use registry::LayerRegistry;
pub use tensor::{Tensor, TensorDim};
pub use types::DType;
pub use weight::{Initializer, Regularizer, Weight, WeightSpec};

// Re-export traits required by public functions/structs
pub use num_traits;
