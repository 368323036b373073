use super::*;
use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_initializer_from_str() {
    assert_eq!("xavier_uniform".parse::<Initializer>().unwrap(), Initializer::XavierUniform);
    assert_eq!(" He_Normal ".parse::<Initializer>().unwrap(), Initializer::HeNormal);
    assert!(matches!(
        "glorot".parse::<Initializer>(),
        Err(LayerForgeError::InvalidProperty { .. })
    ));
    assert_eq!("l2norm".parse::<Regularizer>().unwrap(), Regularizer::L2Norm);
    assert!("l1".parse::<Regularizer>().is_err());
}

#[test]
fn test_constant_initializers() {
    let mut rng = StdRng::seed_from_u64(3);
    let ones = Weight::new(
        WeightSpec::new(TensorDim::new(1, 1, 2, 3), "w").with_initializer(Initializer::Ones),
        DType::F32,
        &mut rng,
    )
    .unwrap();
    assert_eq!(ones.variable().to_vec().unwrap(), vec![1.0; 6]);
    assert_eq!(ones.gradient().to_vec().unwrap(), vec![0.0; 6]);
    assert_eq!(ones.name(), "w");
    assert!(ones.is_trainable());
}

#[test]
fn test_uniform_initializer_respects_limit() {
    let mut rng = StdRng::seed_from_u64(11);
    let dim = TensorDim::new(1, 1, 16, 8);
    let w = Weight::new(
        WeightSpec::new(dim, "w").with_initializer(Initializer::XavierUniform),
        DType::F32,
        &mut rng,
    )
    .unwrap();
    let limit = (6.0f32 / 24.0).sqrt();
    let values = w.variable().to_vec().unwrap();
    assert!(values.iter().all(|v| v.abs() <= limit));
    assert!(values.iter().any(|&v| v != 0.0));
}

#[test]
fn test_seeded_initialization_is_reproducible() {
    let spec = WeightSpec::new(TensorDim::new(1, 1, 4, 4), "w").with_initializer(Initializer::HeNormal);
    let a = Weight::new(spec.clone(), DType::F32, &mut StdRng::seed_from_u64(5)).unwrap();
    let b = Weight::new(spec, DType::F32, &mut StdRng::seed_from_u64(5)).unwrap();
    assert_eq!(a.variable().to_vec().unwrap(), b.variable().to_vec().unwrap());
}

#[test]
fn test_reset_changes_shape_and_clears_gradient() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut w = Weight::new(
        WeightSpec::new(TensorDim::from_width(2), "w").with_initializer(Initializer::Ones),
        DType::F16,
        &mut rng,
    )
    .unwrap();
    w.gradient_mut().set_value_all(4.0).unwrap();

    w.reset(
        WeightSpec::new(TensorDim::from_width(3), "w").with_initializer(Initializer::Zeros),
        &mut rng,
    )
    .unwrap();
    assert_eq!(w.dim(), TensorDim::from_width(3));
    assert_eq!(w.variable().dtype(), DType::F16);
    assert_eq!(w.gradient().to_vec().unwrap(), vec![0.0; 3]);
}

#[test]
fn test_l2_regularization() {
    let mut rng = StdRng::seed_from_u64(0);
    let spec = WeightSpec::new(TensorDim::from_width(2), "w")
        .with_initializer(Initializer::Ones)
        .with_regularizer(Regularizer::L2Norm, 0.1);
    let mut w = Weight::new(spec, DType::F32, &mut rng).unwrap();
    w.variable_mut().write_values(&[3.0, 4.0]).unwrap();

    // 0.5 * 0.1 * 25
    assert_relative_eq!(w.regularization_loss().unwrap(), 1.25, epsilon = 1e-6);

    w.apply_regularization_gradient().unwrap();
    let grad = w.gradient().to_vec().unwrap();
    assert_relative_eq!(grad[0], 0.3, epsilon = 1e-6);
    assert_relative_eq!(grad[1], 0.4, epsilon = 1e-6);
}

#[test]
fn test_frozen_weight_has_no_penalty() {
    let mut rng = StdRng::seed_from_u64(0);
    let spec = WeightSpec::new(TensorDim::from_width(2), "w")
        .with_initializer(Initializer::Ones)
        .with_regularizer(Regularizer::L2Norm, 1.0)
        .trainable(false);
    let mut w = Weight::new(spec, DType::F32, &mut rng).unwrap();
    assert_eq!(w.regularization_loss().unwrap(), 0.0);
    w.apply_regularization_gradient().unwrap();
    assert_eq!(w.gradient().to_vec().unwrap(), vec![0.0, 0.0]);
}
