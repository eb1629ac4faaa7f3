use crate::error::{EffectError, Result};
use crate::layers::{
    Conv1D, Dense, Dropout, Layer, LayerDecl, MonteCarloDropout, SequentialParams, Stack, DROPOUT,
    MONTE_CARLO_DROPOUT, SEQUENTIAL,
};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Builds a layer from its declaration and the shape it will receive
pub type LayerConstructor = fn(&LayerDecl, &[usize], &LayerRegistry) -> Result<Layer>;

/// Registry of instantiable layer classes: class name → constructor
///
/// Deserializing a model configuration is a lookup per declaration. Custom
/// classes such as `MonteCarloDropout` must be registered before a
/// configuration that uses them can be rebuilt.
///
/// # Example Usage
/// ```
/// use dropeffect::graph::LayerRegistry;
///
/// let registry = LayerRegistry::global();
/// assert!(registry.contains("Dropout"));
/// assert!(registry.contains("MonteCarloDropout"));
/// assert!(!LayerRegistry::standard().contains("MonteCarloDropout"));
/// ```
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    constructors: HashMap<String, LayerConstructor>,
}

static GLOBAL: OnceLock<LayerRegistry> = OnceLock::new();

impl LayerRegistry {
    /// Built-in layer classes only
    pub fn standard() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register("Dense", |decl, shape, _| {
            Ok(Layer::Dense(Dense::new(decl.params()?, shape)?))
        });
        registry.register("Conv1D", |decl, shape, _| {
            Ok(Layer::Conv1D(Conv1D::new(decl.params()?, shape)?))
        });
        registry.register("GlobalMaxPooling1D", |decl, shape, _| {
            if shape.len() != 2 {
                return Err(EffectError::config(format!(
                    "GlobalMaxPooling1D expects (length, channels) input, got {:?}",
                    shape
                )));
            }
            Ok(Layer::GlobalMaxPooling1D(decl.params()?))
        });
        registry.register("Flatten", |decl, _, _| Ok(Layer::Flatten(decl.params()?)));
        registry.register("Activation", |decl, _, _| {
            Ok(Layer::Activation(decl.params()?))
        });
        registry.register(DROPOUT, |decl, _, _| {
            Ok(Layer::Dropout(Dropout::new(decl.params()?)))
        });
        registry.register(SEQUENTIAL, |decl, shape, registry| {
            let params: SequentialParams = decl.params()?;
            if let Some(declared) = &params.input_shape {
                if declared.as_slice() != shape {
                    return Err(EffectError::shape("nested Sequential input", declared, shape));
                }
            }
            Ok(Layer::Sequential(registry.build_stack(&params, shape)?))
        });
        registry
    }

    /// Built-in classes plus `MonteCarloDropout`
    pub fn with_monte_carlo() -> Self {
        let mut registry = Self::standard();
        registry.register(MONTE_CARLO_DROPOUT, |decl, _, _| {
            Ok(Layer::MonteCarloDropout(MonteCarloDropout::from_serialized(
                decl.params()?,
            )))
        });
        registry
    }

    /// Process-wide registry, initialized once with `with_monte_carlo()`
    pub fn global() -> &'static LayerRegistry {
        GLOBAL.get_or_init(Self::with_monte_carlo)
    }

    /// Register (or replace) a layer class, returning the previous constructor
    pub fn register(
        &mut self,
        class_name: &str,
        constructor: LayerConstructor,
    ) -> Option<LayerConstructor> {
        self.constructors.insert(class_name.to_string(), constructor)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    /// Instantiate one declaration for the given input shape
    pub fn build(&self, decl: &LayerDecl, input_shape: &[usize]) -> Result<Layer> {
        let constructor = self
            .constructors
            .get(&decl.class_name)
            .ok_or_else(|| EffectError::UnknownLayer(decl.class_name.clone()))?;
        constructor(decl, input_shape, self)
    }

    /// Instantiate a chain of declarations, threading shapes through it
    pub fn build_stack(&self, params: &SequentialParams, input_shape: &[usize]) -> Result<Stack> {
        let mut shape = input_shape.to_vec();
        let mut layers = Vec::with_capacity(params.layers.len());
        for decl in &params.layers {
            let layer = self.build(decl, &shape)?;
            shape = layer.output_shape(&shape);
            layers.push(layer);
        }
        Ok(Stack {
            name: params.name.clone(),
            layers,
            input_shape: input_shape.to_vec(),
            output_shape: shape,
        })
    }
}
