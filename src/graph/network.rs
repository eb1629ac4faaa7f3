use super::{LayerRegistry, Model, Predictor};
use crate::error::{EffectError, Result};
use crate::layers::{Layer, LayerDecl, SequentialParams, Stack, SEQUENTIAL};
use ndarray::{Array2, Array3, ArrayD, Ix2};
use rand::rngs::StdRng;
use serde_json::Value;

/// Feed-forward sequence network: `(rows, length, channels)` → `(rows, outputs)`
///
/// Serializes to a `Sequential` declaration whose `input_shape` is
/// `[length, channels]`; weights are listed layer by layer in declaration
/// order (kernel, then bias).
#[derive(Debug, Clone)]
pub struct Network {
    stack: Stack,
}

impl Network {
    /// Rebuild a network from a serialized configuration tree
    ///
    /// Weights start at zero; transplant trained values with `set_weights`.
    ///
    /// # Errors
    /// `Config` for malformed trees, `UnknownLayer` for unregistered classes.
    pub fn from_config(config: &Value, registry: &LayerRegistry) -> Result<Self> {
        let decl: LayerDecl = serde_json::from_value(config.clone())
            .map_err(|e| EffectError::config(format!("malformed model configuration: {}", e)))?;
        if decl.class_name != SEQUENTIAL {
            return Err(EffectError::config(format!(
                "top-level model must be {}, got {}",
                SEQUENTIAL, decl.class_name
            )));
        }

        let params: SequentialParams = decl.params()?;
        let input_shape = params
            .input_shape
            .clone()
            .ok_or_else(|| EffectError::config("top-level Sequential needs input_shape"))?;
        if input_shape.len() != 2 {
            return Err(EffectError::config(format!(
                "input_shape must be [length, channels], got {:?}",
                input_shape
            )));
        }

        let stack = registry.build_stack(&params, &input_shape)?;
        if stack.output_shape.len() != 1 {
            return Err(EffectError::config(format!(
                "network must end in a flat output, got shape {:?}",
                stack.output_shape
            )));
        }

        Ok(Self { stack })
    }

    /// Build a network from layer declarations using the global registry
    pub fn sequential(input_shape: &[usize], layers: Vec<LayerDecl>) -> Result<Self> {
        let params = SequentialParams {
            name: None,
            input_shape: Some(input_shape.to_vec()),
            layers,
        };
        let config = serde_json::to_value(LayerDecl::new(SEQUENTIAL, &params)?)?;
        Self::from_config(&config, LayerRegistry::global())
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.stack.input_shape
    }

    pub fn output_width(&self) -> usize {
        self.stack.output_shape[0]
    }

    pub fn layers(&self) -> &[Layer] {
        &self.stack.layers
    }

    /// Number of layers of `class_name`, including nested ones
    pub fn count_layers(&self, class_name: &str) -> usize {
        self.stack.layers.iter().map(|l| l.count(class_name)).sum()
    }

    /// Forward pass with an explicit training flag
    pub fn forward(
        &self,
        batch: &Array3<f32>,
        training: bool,
        rng: &mut StdRng,
    ) -> Result<Array2<f32>> {
        let (rows, length, channels) = batch.dim();
        if [length, channels] != self.stack.input_shape[..] {
            return Err(EffectError::shape(
                "network input",
                &[rows, self.stack.input_shape[0], self.stack.input_shape[1]],
                &[rows, length, channels],
            ));
        }

        let out = self
            .stack
            .forward(batch.clone().into_dyn(), training, rng)?;
        out.into_dimensionality::<Ix2>()
            .map_err(|e| EffectError::config(format!("network output is not 2-D: {}", e)))
    }

    /// Replace all weights, in the order `weights()` lists them
    ///
    /// Either every array is loaded or the network is left untouched.
    pub fn set_weights(&mut self, weights: &[ArrayD<f32>]) -> Result<()> {
        let expected = self.weights().len();
        if weights.len() != expected {
            return Err(EffectError::WeightShape(format!(
                "expected {} weight arrays, got {}",
                expected,
                weights.len()
            )));
        }

        let mut layers = self.stack.layers.clone();
        let mut iter = weights.iter();
        for layer in &mut layers {
            layer.load_weights(&mut iter)?;
        }
        self.stack.layers = layers;
        Ok(())
    }

    /// Glorot-uniform weights, zero biases
    pub fn randomize(&mut self, rng: &mut StdRng) {
        for layer in &mut self.stack.layers {
            layer.randomize(rng);
        }
    }
}

impl Predictor for Network {
    fn output_width(&self) -> usize {
        Network::output_width(self)
    }

    fn predict(&self, batch: &Array3<f32>, rng: &mut StdRng) -> Result<Array2<f32>> {
        self.forward(batch, false, rng)
    }
}

impl Model for Network {
    fn config(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.stack.declaration(true)?)?)
    }

    fn weights(&self) -> Vec<ArrayD<f32>> {
        self.stack.layers.iter().flat_map(Layer::weights).collect()
    }
}
