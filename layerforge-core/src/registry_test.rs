use super::*;
use crate::context::{InitLayerContext, RunLayerContext};

#[derive(Debug)]
struct Identity;

impl Layer for Identity {
    fn type_name(&self) -> &'static str {
        "identity"
    }

    fn finalize(&mut self, context: &mut InitLayerContext) -> Result<(), LayerForgeError> {
        context.expect_inputs("identity", 1)?;
        let dims = context.input_dimensions().to_vec();
        context.set_output_dimensions(dims);
        Ok(())
    }

    fn forwarding(&mut self, context: &mut RunLayerContext, _training: bool) -> Result<(), LayerForgeError> {
        let input = context.get_input(0)?;
        context.get_output(0)?.fill(input)
    }

    fn calc_derivative(&mut self, context: &mut RunLayerContext) -> Result<(), LayerForgeError> {
        let incoming = context.get_incoming_derivative(0)?;
        context.get_outgoing_derivative(0)?.fill(incoming)
    }

    fn set_property(&mut self, _properties: &[String]) -> Result<(), LayerForgeError> {
        Ok(())
    }
}

#[test]
fn test_builtin_layers_are_registered() {
    let registry = LayerRegistry::with_builtin_layers();
    assert_eq!(
        registry.type_names(),
        vec!["bottleneck", "lstm", "mse", "preprocess_l2norm", "rnn", "vae_loss"]
    );
    for name in registry.type_names() {
        let layer = registry.create(name, &[]).unwrap();
        assert_eq!(layer.type_name(), name);
    }
}

#[test]
fn test_create_applies_properties() {
    let registry = LayerRegistry::with_builtin_layers();
    let layer = registry.create("RNN", &["unit=3".to_string()]).unwrap();
    assert!(!layer.supports_backward());
    assert!(registry.create("rnn", &["bogus=1".to_string()]).is_err());

    let lstm = registry
        .create("lstm", &["unit=2".to_string(), "return_sequences=true".to_string()])
        .unwrap();
    assert!(lstm.supports_backward());
}

#[test]
fn test_unknown_type() {
    let registry = LayerRegistry::new();
    assert!(!registry.contains("mse"));
    assert_eq!(
        registry.create("mse", &[]).unwrap_err(),
        LayerForgeError::UnknownLayerType("mse".to_string())
    );
}

#[test]
fn test_register_custom_and_duplicate() {
    let mut registry = LayerRegistry::with_builtin_layers();
    registry.register("identity", || Box::new(Identity)).unwrap();
    assert!(registry.contains("Identity"));
    assert_eq!(
        registry.register("identity", || Box::new(Identity)).unwrap_err(),
        LayerForgeError::DuplicateLayerType("identity".to_string())
    );
    assert!(registry.register("mse", || Box::new(Identity)).is_err());
    assert!(format!("{:?}", registry).contains("identity"));
}
