use super::*;
use crate::types::DType;
use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

const WXH: [f32; 4] = [0.5, -0.2, 0.1, 0.3];
const WHH: [f32; 4] = [0.4, 0.0, -0.3, 0.2];
const BIAS: [f32; 2] = [0.1, -0.1];

fn step(x: &[f32], h: &[f32]) -> Vec<f32> {
    (0..2)
        .map(|j| {
            let pre = x[0] * WXH[j] + x[1] * WXH[2 + j] + h[0] * WHH[j] + h[1] * WHH[2 + j] + BIAS[j];
            pre.tanh()
        })
        .collect()
}

fn setup(layer: &mut Rnn, batch: usize, time: usize) -> RunLayerContext {
    let mut init = InitLayerContext::new("rnn", vec![TensorDim::new(batch, 1, time, 2)]);
    layer.finalize(&mut init).unwrap();
    let mut ctx = RunLayerContext::from_init(&init, &mut StdRng::seed_from_u64(0)).unwrap();
    let w = layer.weights().unwrap();
    ctx.weight_mut(w.xh).unwrap().variable_mut().write_values(&WXH).unwrap();
    ctx.weight_mut(w.hh).unwrap().variable_mut().write_values(&WHH).unwrap();
    ctx.weight_mut(w.bias).unwrap().variable_mut().write_values(&BIAS).unwrap();
    ctx
}

#[test]
fn test_finalize_shapes() {
    let mut layer = Rnn::new(3);
    let mut init = InitLayerContext::new("rnn", vec![TensorDim::new(4, 1, 5, 2)]);
    layer.finalize(&mut init).unwrap();
    assert_eq!(init.output_dimensions(), &[TensorDim::new(4, 1, 5, 3)]);
    let dims: Vec<TensorDim> = init.weight_specs().iter().map(|s| s.dim).collect();
    assert_eq!(
        dims,
        vec![
            TensorDim::new(1, 1, 2, 3),
            TensorDim::new(1, 1, 3, 3),
            TensorDim::new(1, 1, 1, 3)
        ]
    );
    assert_eq!(layer.hidden_state().unwrap().dim(), TensorDim::new(4, 1, 1, 3));
}

#[test]
fn test_finalize_validation() {
    let mut init = InitLayerContext::new("rnn", vec![TensorDim::new(1, 2, 3, 4)]);
    assert!(matches!(
        Rnn::new(2).finalize(&mut init),
        Err(LayerForgeError::InvalidArgument(_))
    ));

    let mut init = InitLayerContext::new("rnn", vec![TensorDim::new(1, 1, 3, 4)]);
    assert!(matches!(
        Rnn::default().finalize(&mut init),
        Err(LayerForgeError::InvalidProperty { .. })
    ));

    let mut init = InitLayerContext::new("rnn", vec![]);
    assert!(matches!(
        Rnn::new(2).finalize(&mut init),
        Err(LayerForgeError::InvalidInputCount { expected: 1, actual: 0, .. })
    ));
}

#[test]
fn test_three_step_recurrence() {
    let mut layer = Rnn::new(2);
    let mut ctx = setup(&mut layer, 1, 3);
    let x = [[1.0f32, 0.0], [0.0, 1.0], [1.0, 1.0]];
    let flat: Vec<f32> = x.iter().flatten().copied().collect();
    ctx.set_input(0, Tensor::from_vec(TensorDim::new(1, 1, 3, 2), flat).unwrap()).unwrap();

    layer.forwarding(&mut ctx, true).unwrap();

    let h0 = step(&x[0], &[0.0, 0.0]);
    let h1 = step(&x[1], &h0);
    let h2 = step(&x[2], &h1);
    let out = ctx.get_output(0).unwrap().to_vec().unwrap();
    for (got, want) in out.iter().zip(h0.iter().chain(&h1).chain(&h2)) {
        assert_relative_eq!(*got, *want, epsilon = 1e-6);
    }

    let carried = layer.hidden_state().unwrap().to_vec().unwrap();
    assert_relative_eq!(carried[0], h2[0], epsilon = 1e-6);
    assert_relative_eq!(carried[1], h2[1], epsilon = 1e-6);
}

#[test]
fn test_state_carries_across_calls_until_reset() {
    let mut layer = Rnn::new(2);
    let mut ctx = setup(&mut layer, 2, 1);
    let input = Tensor::from_vec(TensorDim::new(2, 1, 1, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
    ctx.set_input(0, input).unwrap();

    layer.forwarding(&mut ctx, false).unwrap();
    let first = ctx.get_output(0).unwrap().to_vec().unwrap();
    let a0 = step(&[1.0, 0.0], &[0.0, 0.0]);
    let b0 = step(&[0.0, 1.0], &[0.0, 0.0]);
    assert_relative_eq!(first[0], a0[0], epsilon = 1e-6);
    assert_relative_eq!(first[3], b0[1], epsilon = 1e-6);

    layer.forwarding(&mut ctx, false).unwrap();
    let second = ctx.get_output(0).unwrap().to_vec().unwrap();
    let a1 = step(&[1.0, 0.0], &a0);
    let b1 = step(&[0.0, 1.0], &b0);
    assert_relative_eq!(second[1], a1[1], epsilon = 1e-6);
    assert_relative_eq!(second[2], b1[0], epsilon = 1e-6);

    layer.reset_state().unwrap();
    assert_eq!(layer.hidden_state().unwrap().to_vec().unwrap(), vec![0.0; 4]);
    layer.forwarding(&mut ctx, false).unwrap();
    assert_eq!(ctx.get_output(0).unwrap().to_vec().unwrap(), first);
}

#[test]
fn test_backward_is_unsupported() {
    let mut layer = Rnn::new(2);
    let mut ctx = setup(&mut layer, 1, 2);
    assert!(!layer.supports_backward());
    assert_eq!(
        layer.calc_derivative(&mut ctx).unwrap_err(),
        LayerForgeError::UnsupportedBackward {
            layer: "rnn".to_string()
        }
    );
}

#[test]
fn test_unfinalized_layer() {
    let mut layer = Rnn::new(2);
    assert!(matches!(layer.reset_state(), Err(LayerForgeError::NotFinalized { .. })));
    let mut ctx = setup(&mut Rnn::new(2), 1, 2);
    assert!(matches!(
        layer.forwarding(&mut ctx, false),
        Err(LayerForgeError::NotFinalized { .. })
    ));
}

#[test]
fn test_half_precision_context() {
    let mut layer = Rnn::new(2);
    let mut init = InitLayerContext::new("rnn", vec![TensorDim::new(1, 1, 2, 2)]).with_dtype(DType::F16);
    layer.finalize(&mut init).unwrap();
    let mut ctx = RunLayerContext::from_init(&init, &mut StdRng::seed_from_u64(2)).unwrap();
    let x = Tensor::from_vec(TensorDim::new(1, 1, 2, 2), vec![0.5, -0.5, 1.0, 0.0])
        .unwrap()
        .clone_with_dtype(DType::F16)
        .unwrap();
    ctx.set_input(0, x).unwrap();
    layer.forwarding(&mut ctx, false).unwrap();
    let out = ctx.get_output(0).unwrap();
    assert_eq!(out.dtype(), DType::F16);
    assert!(out.to_vec().unwrap().iter().all(|v| v.abs() <= 1.0));
}

#[test]
fn test_properties() {
    let mut layer = Rnn::default();
    layer
        .set_property(&[
            "unit=4".to_string(),
            "activation=sigmoid".to_string(),
            "weight_initializer=he_uniform".to_string(),
            "weight_regularizer=l2norm".to_string(),
            "weight_regularizer_constant=0.01".to_string(),
        ])
        .unwrap();
    let config = layer.config();
    assert_eq!(config.unit, 4);
    assert_eq!(config.activation, Activation::Sigmoid);
    assert_eq!(config.weight_initializer, Initializer::HeUniform);
    assert_eq!(config.weight_regularizer, Regularizer::L2Norm);
    assert_relative_eq!(config.weight_regularizer_constant, 0.01);

    assert!(layer.set_property(&["unit=0".to_string()]).is_err());
    assert!(layer.set_property(&["activation=gelu".to_string()]).is_err());
    assert!(matches!(
        layer.set_property(&["dropout=0.1".to_string()]),
        Err(LayerForgeError::UnknownProperty { .. })
    ));
}
