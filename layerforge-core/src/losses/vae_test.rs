use super::*;
use crate::tensor::{Tensor, TensorDim};
use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn recon_dim() -> TensorDim {
    TensorDim::new(1, 1, 1, 4)
}

fn latent_dim() -> TensorDim {
    TensorDim::new(1, 1, 1, 2)
}

fn setup(layer: &mut VaeLoss, recon: Vec<f32>, mu: Vec<f32>, logvar: Vec<f32>) -> RunLayerContext {
    let mut init = InitLayerContext::new("vae", vec![recon_dim(), latent_dim(), latent_dim()]);
    layer.finalize(&mut init).unwrap();
    let mut ctx = RunLayerContext::from_init(&init, &mut StdRng::seed_from_u64(0)).unwrap();
    ctx.set_input(RECON, Tensor::from_vec(recon_dim(), recon).unwrap()).unwrap();
    ctx.set_input(MU, Tensor::from_vec(latent_dim(), mu).unwrap()).unwrap();
    ctx.set_input(LOGVAR, Tensor::from_vec(latent_dim(), logvar).unwrap()).unwrap();
    ctx
}

#[test]
fn test_finalize_requires_three_inputs() {
    let mut init = InitLayerContext::new("vae", vec![recon_dim(), latent_dim()]);
    assert!(matches!(
        VaeLoss::new().finalize(&mut init),
        Err(LayerForgeError::InvalidInputCount { expected: 3, actual: 2, .. })
    ));
}

#[test]
fn test_output_mirrors_reconstruction_without_label() {
    let mut layer = VaeLoss::new();
    let mut ctx = setup(&mut layer, vec![0.1, 0.2, 0.3, 0.4], vec![1.0, -1.0], vec![0.5, 0.2]);
    layer.forwarding(&mut ctx, false).unwrap();
    assert_eq!(ctx.get_output(0).unwrap().to_vec().unwrap(), vec![0.1, 0.2, 0.3, 0.4]);
    assert_eq!(ctx.loss(), 0.0);
}

#[test]
fn test_loss_value() {
    let mut layer = VaeLoss::new();
    let mut ctx = setup(&mut layer, vec![1.0, 1.0, 1.0, 1.0], vec![1.0, 0.0], vec![0.0, 0.0]);
    ctx.set_label(0, Tensor::from_vec(recon_dim(), vec![0.5, 1.0, 1.0, 1.0]).unwrap()).unwrap();
    layer.forwarding(&mut ctx, true).unwrap();

    // kld: -(1 + 0 - 1 - 1) / 2 * 3 = 1.5 for mu = 1, 0 for mu = 0
    // recon: 2 * 0.5 = 1.0
    assert_relative_eq!(ctx.loss(), 2.5, epsilon = 1e-6);
}

#[test]
fn test_unlabeled_forward_clears_previous_loss() {
    let mut layer = VaeLoss::new();
    let mut ctx = setup(&mut layer, vec![1.0, 1.0, 1.0, 1.0], vec![1.0, 0.0], vec![0.0, 0.0]);
    ctx.set_label(0, Tensor::from_vec(recon_dim(), vec![0.5, 1.0, 1.0, 1.0]).unwrap()).unwrap();
    layer.forwarding(&mut ctx, true).unwrap();
    assert_relative_eq!(ctx.loss(), 2.5, epsilon = 1e-6);

    ctx.clear_label(0).unwrap();
    layer.forwarding(&mut ctx, false).unwrap();
    assert_eq!(ctx.loss(), 0.0);
}

#[test]
fn test_derivatives() {
    let mut layer = VaeLoss::with_config(VaeLossConfig {
        mse_weight: 0.5,
        kld_weight: 2.0,
    });
    let mut ctx = setup(&mut layer, vec![1.0, 2.0, 3.0, 4.0], vec![0.5, -1.0], vec![0.0, 1.0]);
    ctx.set_label(0, Tensor::from_vec(recon_dim(), vec![0.0, 2.0, 4.0, 4.0]).unwrap()).unwrap();
    layer.forwarding(&mut ctx, true).unwrap();
    layer.calc_derivative(&mut ctx).unwrap();

    assert_eq!(
        ctx.get_outgoing_derivative(RECON).unwrap().to_vec().unwrap(),
        vec![1.0, 0.0, -1.0, 0.0]
    );
    assert_eq!(ctx.get_outgoing_derivative(MU).unwrap().to_vec().unwrap(), vec![1.0, -2.0]);
    let d_logvar = ctx.get_outgoing_derivative(LOGVAR).unwrap().to_vec().unwrap();
    assert_relative_eq!(d_logvar[0], 0.0, epsilon = 1e-6);
    assert_relative_eq!(d_logvar[1], 1.0f32.exp() - 1.0, epsilon = 1e-5);
}

#[test]
fn test_loss_scale_scales_derivatives() {
    let mut layer = VaeLoss::new();
    let mut ctx = setup(&mut layer, vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 0.0], vec![0.0, 0.0]);
    ctx.set_label(0, Tensor::zeros(recon_dim())).unwrap();
    ctx.set_loss_scale(0.5);
    layer.calc_derivative(&mut ctx).unwrap();
    assert_eq!(
        ctx.get_outgoing_derivative(RECON).unwrap().to_vec().unwrap(),
        vec![1.0, 0.0, 0.0, 0.0]
    );
    assert_eq!(ctx.get_outgoing_derivative(MU).unwrap().to_vec().unwrap(), vec![1.5, 0.0]);
}

#[test]
fn test_backward_without_label_fails() {
    let mut layer = VaeLoss::new();
    let mut ctx = setup(&mut layer, vec![0.0; 4], vec![0.0; 2], vec![0.0; 2]);
    assert_eq!(
        layer.calc_derivative(&mut ctx).unwrap_err(),
        LayerForgeError::MissingLabel { index: 0 }
    );
}

#[test]
fn test_properties() {
    let mut layer = VaeLoss::new();
    assert!(layer.requires_label());
    layer
        .set_property(&["mse_weight=0.25".to_string(), "KLD_WEIGHT = 1".to_string()])
        .unwrap();
    assert_eq!(
        layer.config(),
        &VaeLossConfig {
            mse_weight: 0.25,
            kld_weight: 1.0
        }
    );
    assert!(matches!(
        layer.set_property(&["beta=1".to_string()]),
        Err(LayerForgeError::UnknownProperty { .. })
    ));
}
