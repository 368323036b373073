use super::*;
use crate::tensor::{Tensor, TensorDim};
use approx::assert_relative_eq;

fn dim() -> TensorDim {
    TensorDim::new(2, 1, 1, 3)
}

fn setup(layer: &mut Bottleneck) -> RunLayerContext {
    let mut init = InitLayerContext::new("bn", vec![dim(), dim()]);
    layer.finalize(&mut init).unwrap();
    let mut ctx = RunLayerContext::from_init(&init, &mut StdRng::seed_from_u64(0)).unwrap();
    let mu = Tensor::from_vec(dim(), vec![0.1, -0.2, 0.3, 1.0, 0.0, -1.5]).unwrap();
    let logvar = Tensor::from_vec(dim(), vec![0.0, 0.4, -0.6, 1.2, -2.0, 0.2]).unwrap();
    ctx.set_input(MU, mu).unwrap();
    ctx.set_input(LOGVAR, logvar).unwrap();
    ctx
}

#[test]
fn test_finalize_rejects_wrong_arity() {
    let mut layer = Bottleneck::with_seed(1);
    let mut init = InitLayerContext::new("bn", vec![dim()]);
    assert!(matches!(
        layer.finalize(&mut init),
        Err(LayerForgeError::InvalidInputCount { expected: 2, actual: 1, .. })
    ));
}

#[test]
fn test_finalize_rejects_mismatched_shapes() {
    let mut layer = Bottleneck::with_seed(1);
    let mut init = InitLayerContext::new("bn", vec![dim(), TensorDim::from_width(3)]);
    assert!(matches!(
        layer.finalize(&mut init),
        Err(LayerForgeError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_finalize_twice_fails() {
    let mut layer = Bottleneck::with_seed(1);
    let mut init = InitLayerContext::new("bn", vec![dim(), dim()]);
    layer.finalize(&mut init).unwrap();
    assert_eq!(init.output_dimensions(), &[dim()]);
    assert!(matches!(
        layer.finalize(&mut init),
        Err(LayerForgeError::AlreadyFinalized { .. })
    ));
}

#[test]
fn test_forward_before_finalize_fails() {
    let mut ctx = setup(&mut Bottleneck::with_seed(1));
    let mut fresh = Bottleneck::with_seed(1);
    assert!(matches!(
        fresh.forwarding(&mut ctx, true),
        Err(LayerForgeError::NotFinalized { .. })
    ));
}

#[test]
fn test_inference_returns_mu() {
    let mut layer = Bottleneck::with_seed(4);
    let mut ctx = setup(&mut layer);
    layer.forwarding(&mut ctx, false).unwrap();
    let z = ctx.get_output(0).unwrap().to_vec().unwrap();
    assert_eq!(z, ctx.get_input(MU).unwrap().to_vec().unwrap());
}

#[test]
fn test_training_forward_matches_reparameterization() {
    let mut layer = Bottleneck::with_seed(4);
    let mut ctx = setup(&mut layer);
    layer.forwarding(&mut ctx, true).unwrap();

    let eps = ctx.get_tensor(layer.epsilon().unwrap()).unwrap().to_vec().unwrap();
    assert!(eps.iter().any(|&e| e != 0.0));
    let mu = ctx.get_input(MU).unwrap().to_vec().unwrap();
    let logvar = ctx.get_input(LOGVAR).unwrap().to_vec().unwrap();
    let z = ctx.get_output(0).unwrap().to_vec().unwrap();
    for i in 0..z.len() {
        assert_relative_eq!(z[i], mu[i] + (0.5 * logvar[i]).exp() * eps[i], epsilon = 1e-6);
    }
}

#[test]
fn test_backward_uses_cached_noise() {
    let mut layer = Bottleneck::with_seed(9);
    let mut ctx = setup(&mut layer);
    layer.forwarding(&mut ctx, true).unwrap();

    let dz = Tensor::from_vec(dim(), vec![1.0, 2.0, -1.0, 0.5, 0.0, 3.0]).unwrap();
    ctx.set_incoming_derivative(0, dz.clone()).unwrap();
    layer.calc_derivative(&mut ctx).unwrap();

    let dz = dz.to_vec().unwrap();
    let eps = ctx.get_tensor(layer.epsilon().unwrap()).unwrap().to_vec().unwrap();
    let logvar = ctx.get_input(LOGVAR).unwrap().to_vec().unwrap();
    let dmu = ctx.get_outgoing_derivative(MU).unwrap().to_vec().unwrap();
    let dlogvar = ctx.get_outgoing_derivative(LOGVAR).unwrap().to_vec().unwrap();

    assert_eq!(dmu, dz);
    for i in 0..dz.len() {
        let expected = eps[i] * (0.5 * logvar[i]).exp() / 2.0 * dz[i];
        assert_relative_eq!(dlogvar[i], expected, epsilon = 1e-6);
    }
}

#[test]
fn test_same_seed_same_draw() {
    let mut a = Bottleneck::with_seed(21);
    let mut b = Bottleneck::new();
    b.set_property(&["seed=21".to_string()]).unwrap();
    assert_eq!(b.config().seed, Some(21));

    let mut ctx_a = setup(&mut a);
    let mut ctx_b = setup(&mut b);
    a.forwarding(&mut ctx_a, true).unwrap();
    b.forwarding(&mut ctx_b, true).unwrap();
    assert_eq!(
        ctx_a.get_output(0).unwrap().to_vec().unwrap(),
        ctx_b.get_output(0).unwrap().to_vec().unwrap()
    );
}

#[test]
fn test_unknown_property() {
    let mut layer = Bottleneck::new();
    assert_eq!(
        layer.set_property(&["unit=3".to_string()]).unwrap_err(),
        LayerForgeError::UnknownProperty {
            layer: "bottleneck".to_string(),
            key: "unit".to_string()
        }
    );
    assert!(layer.set_property(&["seed=abc".to_string()]).is_err());
}
