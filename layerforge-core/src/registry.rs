use std::collections::BTreeMap;
use std::fmt;

use crate::error::LayerForgeError;
use crate::layers::{Bottleneck, Layer, Lstm, PreprocessL2Norm, Rnn};
use crate::losses::{MseLoss, VaeLoss};

/// Builds a fresh, unconfigured layer.
pub type LayerFactory = Box<dyn Fn() -> Box<dyn Layer> + Send + Sync>;

/// Maps layer type names to factories.
///
/// Constructed explicitly and handed to whatever builds models; there is no
/// process-wide instance.
#[derive(Default)]
pub struct LayerRegistry {
    factories: BTreeMap<String, LayerFactory>,
}

impl LayerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every layer this crate ships.
    pub fn with_builtin_layers() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, LayerFactory); 6] = [
            (Bottleneck::TYPE, Box::new(|| Box::new(Bottleneck::new()) as Box<dyn Layer>)),
            (VaeLoss::TYPE, Box::new(|| Box::new(VaeLoss::new()) as Box<dyn Layer>)),
            (MseLoss::TYPE, Box::new(|| Box::new(MseLoss::new()) as Box<dyn Layer>)),
            (Rnn::TYPE, Box::new(|| Box::new(Rnn::default()) as Box<dyn Layer>)),
            (Lstm::TYPE, Box::new(|| Box::new(Lstm::default()) as Box<dyn Layer>)),
            (PreprocessL2Norm::TYPE, Box::new(|| Box::new(PreprocessL2Norm::new()) as Box<dyn Layer>)),
        ];
        for (name, factory) in builtins {
            registry.factories.insert(name.to_string(), factory);
        }
        registry
    }

    /// Adds a layer type.
    ///
    /// # Errors
    /// `DuplicateLayerType` if `name` is already taken.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), LayerForgeError>
    where
        F: Fn() -> Box<dyn Layer> + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if self.factories.contains_key(&key) {
            return Err(LayerForgeError::DuplicateLayerType(key));
        }
        log::debug!("Registered layer type '{}'", key);
        self.factories.insert(key, Box::new(factory));
        Ok(())
    }

    /// Instantiates `name` and applies `properties` to it.
    pub fn create(&self, name: &str, properties: &[String]) -> Result<Box<dyn Layer>, LayerForgeError> {
        let key = name.to_lowercase();
        let factory = self
            .factories
            .get(&key)
            .ok_or(LayerForgeError::UnknownLayerType(key))?;
        let mut layer = factory();
        layer.set_property(properties)?;
        Ok(layer)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Registered names in sorted order.
    pub fn type_names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
