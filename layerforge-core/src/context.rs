use rand::Rng;

use crate::error::LayerForgeError;
use crate::tensor::{Tensor, TensorDim};
use crate::types::DType;
use crate::weight::{Weight, WeightSpec};

/// Opaque handle to a scratch tensor requested at finalize time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorHandle(usize);

impl TensorHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Opaque handle to a weight requested at finalize time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightHandle(usize);

impl WeightHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Shape and name of a layer-private scratch tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSpec {
    pub dim: TensorDim,
    pub name: String,
}

/// Negotiation surface handed to `Layer::finalize`.
///
/// The executor fills in the input shapes; the layer answers with its output
/// shapes and the scratch tensors and weights it will need at run time.
#[derive(Debug, Clone)]
pub struct InitLayerContext {
    name: String,
    dtype: DType,
    input_dims: Vec<TensorDim>,
    output_dims: Vec<TensorDim>,
    tensor_specs: Vec<TensorSpec>,
    weight_specs: Vec<WeightSpec>,
}

impl InitLayerContext {
    pub fn new(name: impl Into<String>, input_dims: Vec<TensorDim>) -> Self {
        InitLayerContext {
            name: name.into(),
            dtype: DType::default(),
            input_dims,
            output_dims: Vec::new(),
            tensor_specs: Vec::new(),
            weight_specs: Vec::new(),
        }
    }

    /// Element type used for outputs, derivatives, scratch tensors and weights.
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn num_inputs(&self) -> usize {
        self.input_dims.len()
    }

    pub fn input_dimensions(&self) -> &[TensorDim] {
        &self.input_dims
    }

    pub fn set_output_dimensions(&mut self, dims: Vec<TensorDim>) {
        self.output_dims = dims;
    }

    pub fn output_dimensions(&self) -> &[TensorDim] {
        &self.output_dims
    }

    pub fn tensor_specs(&self) -> &[TensorSpec] {
        &self.tensor_specs
    }

    pub fn weight_specs(&self) -> &[WeightSpec] {
        &self.weight_specs
    }

    /// Registers a scratch tensor that will live as long as the run context.
    pub fn request_tensor(&mut self, dim: TensorDim, name: impl Into<String>) -> TensorHandle {
        self.tensor_specs.push(TensorSpec {
            dim,
            name: name.into(),
        });
        TensorHandle(self.tensor_specs.len() - 1)
    }

    pub fn request_weight(&mut self, spec: WeightSpec) -> WeightHandle {
        self.weight_specs.push(spec);
        WeightHandle(self.weight_specs.len() - 1)
    }

    /// Fails with `InvalidInputCount` unless exactly `expected` inputs are bound.
    pub fn expect_inputs(&self, layer: &str, expected: usize) -> Result<(), LayerForgeError> {
        if self.input_dims.len() != expected {
            return Err(LayerForgeError::InvalidInputCount {
                layer: layer.to_string(),
                expected,
                actual: self.input_dims.len(),
            });
        }
        Ok(())
    }
}

/// Per-pass binding of a layer's slots to concrete tensors.
///
/// Everything declared through the `InitLayerContext` is allocated once in
/// `from_init` and reused for every forward/backward cycle. Getters that hand
/// out writable tensors return shallow clones sharing the context's buffer.
#[derive(Debug)]
pub struct RunLayerContext {
    name: String,
    dtype: DType,
    inputs: Vec<Tensor>,
    outputs: Vec<Tensor>,
    incoming_derivatives: Vec<Tensor>,
    outgoing_derivatives: Vec<Tensor>,
    labels: Vec<Option<Tensor>>,
    tensors: Vec<Tensor>,
    weights: Vec<Weight>,
    loss: f32,
    loss_scale: f32,
}

impl RunLayerContext {
    /// Allocates every buffer declared during finalize.
    ///
    /// Outgoing derivatives take the input shapes and incoming derivatives the
    /// output shapes. Inputs start as zeroed placeholders until `set_input`.
    ///
    /// # Errors
    /// `NotFinalized` if no output shape was declared.
    pub fn from_init<R: Rng + ?Sized>(init: &InitLayerContext, rng: &mut R) -> Result<Self, LayerForgeError> {
        if init.output_dims.is_empty() {
            return Err(LayerForgeError::NotFinalized {
                layer: init.name.clone(),
            });
        }
        let dtype = init.dtype;
        let named = |dim: TensorDim, kind: &str, i: usize| {
            Tensor::new(dim, dtype).with_name(format!("{}:{}{}", init.name, kind, i))
        };

        let inputs = enumerate_dims(&init.input_dims, |i, d| named(d, "input", i));
        let outputs = enumerate_dims(&init.output_dims, |i, d| named(d, "output", i));
        let incoming_derivatives = enumerate_dims(&init.output_dims, |i, d| named(d, "incoming_derivative", i));
        let outgoing_derivatives = enumerate_dims(&init.input_dims, |i, d| named(d, "outgoing_derivative", i));
        let tensors = init
            .tensor_specs
            .iter()
            .map(|spec| Tensor::new(spec.dim, dtype).with_name(format!("{}:{}", init.name, spec.name)))
            .collect();
        let weights = init
            .weight_specs
            .iter()
            .map(|spec| Weight::new(spec.clone(), dtype, &mut *rng))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Run context for '{}': {} input(s), {} output(s), {} scratch tensor(s), {} weight(s)",
            init.name,
            init.input_dims.len(),
            init.output_dims.len(),
            init.tensor_specs.len(),
            init.weight_specs.len()
        );

        Ok(RunLayerContext {
            name: init.name.clone(),
            dtype,
            inputs,
            outputs,
            incoming_derivatives,
            outgoing_derivatives,
            labels: vec![None; init.output_dims.len()],
            tensors,
            weights,
            loss: 0.0,
            loss_scale: 1.0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    // --- Read-only slots ---

    pub fn get_input(&self, index: usize) -> Result<&Tensor, LayerForgeError> {
        slot(&self.inputs, "input", index)
    }

    pub fn get_incoming_derivative(&self, index: usize) -> Result<&Tensor, LayerForgeError> {
        slot(&self.incoming_derivatives, "incoming derivative", index)
    }

    /// Label bound for output `index`, if this pass carries ground truth.
    pub fn get_label(&self, index: usize) -> Result<&Tensor, LayerForgeError> {
        match self.labels.get(index) {
            Some(Some(label)) => Ok(label),
            Some(None) => Err(LayerForgeError::MissingLabel { index }),
            None => Err(LayerForgeError::InvalidHandle { kind: "label", index }),
        }
    }

    pub fn is_label_available(&self, index: usize) -> bool {
        matches!(self.labels.get(index), Some(Some(_)))
    }

    // --- Writable slots ---

    pub fn get_output(&self, index: usize) -> Result<Tensor, LayerForgeError> {
        slot(&self.outputs, "output", index).cloned()
    }

    pub fn get_outgoing_derivative(&self, index: usize) -> Result<Tensor, LayerForgeError> {
        slot(&self.outgoing_derivatives, "outgoing derivative", index).cloned()
    }

    pub fn get_tensor(&self, handle: TensorHandle) -> Result<Tensor, LayerForgeError> {
        slot(&self.tensors, "tensor", handle.0).cloned()
    }

    pub fn get_weight(&self, handle: WeightHandle) -> Result<Tensor, LayerForgeError> {
        Ok(self.weight(handle)?.variable().clone())
    }

    pub fn get_weight_grad(&self, handle: WeightHandle) -> Result<Tensor, LayerForgeError> {
        Ok(self.weight(handle)?.gradient().clone())
    }

    pub fn weight(&self, handle: WeightHandle) -> Result<&Weight, LayerForgeError> {
        slot(&self.weights, "weight", handle.0)
    }

    pub fn weight_mut(&mut self, handle: WeightHandle) -> Result<&mut Weight, LayerForgeError> {
        self.weights.get_mut(handle.0).ok_or(LayerForgeError::InvalidHandle {
            kind: "weight",
            index: handle.0,
        })
    }

    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }

    // --- Binding (executor side) ---

    /// Binds `tensor` to input `index`. The tensor is shared, not copied.
    pub fn set_input(&mut self, index: usize, tensor: Tensor) -> Result<(), LayerForgeError> {
        bind(&mut self.inputs, "input", index, tensor)
    }

    pub fn set_incoming_derivative(&mut self, index: usize, tensor: Tensor) -> Result<(), LayerForgeError> {
        bind(&mut self.incoming_derivatives, "incoming derivative", index, tensor)
    }

    /// Binds ground truth for output `index`; it must match that output's shape.
    pub fn set_label(&mut self, index: usize, tensor: Tensor) -> Result<(), LayerForgeError> {
        let expected = slot(&self.outputs, "label", index)?.dim();
        check_bound_dim(expected, tensor.dim(), "set_label")?;
        self.labels[index] = Some(tensor);
        Ok(())
    }

    pub fn clear_label(&mut self, index: usize) -> Result<(), LayerForgeError> {
        match self.labels.get_mut(index) {
            Some(label) => {
                *label = None;
                Ok(())
            }
            None => Err(LayerForgeError::InvalidHandle { kind: "label", index }),
        }
    }

    // --- Loss bookkeeping ---

    pub fn set_loss(&mut self, loss: f32) {
        self.loss = loss;
    }

    pub fn loss(&self) -> f32 {
        self.loss
    }

    pub fn set_loss_scale(&mut self, scale: f32) {
        self.loss_scale = scale;
    }

    pub fn loss_scale(&self) -> f32 {
        self.loss_scale
    }

    /// Sum of the regularization penalties of every weight in this context.
    pub fn regularization_loss(&self) -> Result<f32, LayerForgeError> {
        self.weights
            .iter()
            .map(|w| w.regularization_loss())
            .sum::<Result<f32, _>>()
    }

    // --- Scratch memory between phases ---

    /// Frees scratch tensors. Handles stay valid; reads fail until `allocate_scratch`.
    pub fn deallocate_scratch(&mut self) {
        log::debug!("Releasing {} scratch tensor(s) of '{}'", self.tensors.len(), self.name);
        for tensor in &mut self.tensors {
            tensor.deallocate();
        }
    }

    /// Gives every scratch tensor fresh zeroed storage if it has none.
    pub fn allocate_scratch(&mut self) {
        for tensor in &mut self.tensors {
            tensor.allocate();
        }
    }
}

fn enumerate_dims<F>(dims: &[TensorDim], mut make: F) -> Vec<Tensor>
where
    F: FnMut(usize, TensorDim) -> Tensor,
{
    dims.iter().enumerate().map(|(i, &d)| make(i, d)).collect()
}

fn slot<'a, T>(items: &'a [T], kind: &'static str, index: usize) -> Result<&'a T, LayerForgeError> {
    items.get(index).ok_or(LayerForgeError::InvalidHandle { kind, index })
}

fn bind(items: &mut [Tensor], kind: &'static str, index: usize, tensor: Tensor) -> Result<(), LayerForgeError> {
    let current = items
        .get_mut(index)
        .ok_or(LayerForgeError::InvalidHandle { kind, index })?;
    check_bound_dim(current.dim(), tensor.dim(), kind)?;
    *current = tensor;
    Ok(())
}

fn check_bound_dim(expected: TensorDim, actual: TensorDim, operation: &str) -> Result<(), LayerForgeError> {
    if expected != actual {
        return Err(LayerForgeError::ShapeMismatch {
            expected,
            actual,
            operation: format!("bind {}", operation),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
