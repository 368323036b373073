use layerforge_core::{InitLayerContext, Layer, RunLayerContext, Tensor, TensorDim};
use rand::rngs::StdRng;
use rand::SeedableRng;

// Finalizes `layer` against the shapes of `inputs`, allocates its run context
// and binds the inputs, the way a graph executor would.
#[allow(dead_code)]
pub fn bind(layer: &mut dyn Layer, inputs: Vec<Tensor>) -> RunLayerContext {
    let dims = inputs.iter().map(|t| t.dim()).collect();
    let mut init = InitLayerContext::new(layer.type_name(), dims);
    layer.finalize(&mut init).expect("finalize failed");
    let mut ctx = RunLayerContext::from_init(&init, &mut StdRng::seed_from_u64(0)).expect("run context failed");
    for (i, tensor) in inputs.into_iter().enumerate() {
        ctx.set_input(i, tensor).expect("binding input failed");
    }
    ctx
}

#[allow(dead_code)]
pub fn tensor(dim: TensorDim, data: &[f32]) -> Tensor {
    Tensor::from_vec(dim, data.to_vec()).expect("Test tensor creation failed")
}

#[allow(dead_code)]
pub fn random_tensor(dim: TensorDim, low: f32, high: f32, seed: u64) -> Tensor {
    let mut t = Tensor::zeros(dim);
    t.set_rand_uniform(low, high, &mut StdRng::seed_from_u64(seed))
        .expect("random fill failed");
    t
}
