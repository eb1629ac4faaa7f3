//! Layer variants of the bundled sequence network
//!
//! Layers are an explicit enum selected by the declaration's class name;
//! composite `Sequential` blocks nest further layers. Shapes exclude the
//! batch axis.

mod activation;
mod conv;
mod dense;
mod dropout;

pub use activation::{Activation, ActivationParams};
pub use conv::{global_max_pool, Conv1D, Conv1DParams};
pub use dense::{Dense, DenseParams};
pub use dropout::{Dropout, DropoutParams, MonteCarloDropout, MonteCarloParams};

use crate::error::{EffectError, Result};
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Class name of the standard dropout layer
pub const DROPOUT: &str = "Dropout";

/// Class name of the always-on dropout layer
pub const MONTE_CARLO_DROPOUT: &str = "MonteCarloDropout";

/// Class name of the nested layer container
pub const SEQUENTIAL: &str = "Sequential";

/// One node of a serialized layer graph: `{"class_name": ..., "config": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDecl {
    pub class_name: String,
    #[serde(default)]
    pub config: Value,
}

impl LayerDecl {
    pub fn new<T: Serialize>(class_name: &str, params: &T) -> Result<Self> {
        Ok(Self {
            class_name: class_name.to_string(),
            config: serde_json::to_value(params)?,
        })
    }

    /// Decode the declaration's parameters; a missing config reads as `{}`
    pub fn params<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let config = match &self.config {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(config)
            .map_err(|e| EffectError::config(format!("{}: {}", self.class_name, e)))
    }
}

/// Parameters of a `Sequential` container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Input shape without the batch axis; required on the outermost container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Vec<usize>>,
    #[serde(default)]
    pub layers: Vec<LayerDecl>,
}

/// Parameters of layers that carry nothing but an optional name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An ordered chain of layers with known input and output shapes
#[derive(Debug, Clone)]
pub struct Stack {
    pub name: Option<String>,
    pub layers: Vec<Layer>,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
}

impl Stack {
    pub fn forward(
        &self,
        mut x: ArrayD<f32>,
        training: bool,
        rng: &mut StdRng,
    ) -> Result<ArrayD<f32>> {
        for layer in &self.layers {
            x = layer.forward(x, training, rng)?;
        }
        Ok(x)
    }

    pub fn declaration(&self, include_input_shape: bool) -> Result<LayerDecl> {
        let params = SequentialParams {
            name: self.name.clone(),
            input_shape: include_input_shape.then(|| self.input_shape.clone()),
            layers: self
                .layers
                .iter()
                .map(Layer::declaration)
                .collect::<Result<Vec<_>>>()?,
        };
        LayerDecl::new(SEQUENTIAL, &params)
    }
}

/// A single network layer
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Conv1D(Conv1D),
    GlobalMaxPooling1D(NamedParams),
    Flatten(NamedParams),
    Activation(ActivationParams),
    Dropout(Dropout),
    MonteCarloDropout(MonteCarloDropout),
    Sequential(Stack),
}

impl Layer {
    pub fn class_name(&self) -> &'static str {
        match self {
            Layer::Dense(_) => "Dense",
            Layer::Conv1D(_) => "Conv1D",
            Layer::GlobalMaxPooling1D(_) => "GlobalMaxPooling1D",
            Layer::Flatten(_) => "Flatten",
            Layer::Activation(_) => "Activation",
            Layer::Dropout(_) => DROPOUT,
            Layer::MonteCarloDropout(_) => MONTE_CARLO_DROPOUT,
            Layer::Sequential(_) => SEQUENTIAL,
        }
    }

    /// Output shape for the input shape this layer was built with
    pub fn output_shape(&self, input_shape: &[usize]) -> Vec<usize> {
        match self {
            Layer::Dense(dense) => dense.output_shape(),
            Layer::Conv1D(conv) => conv.output_shape(),
            Layer::GlobalMaxPooling1D(_) => input_shape.last().copied().into_iter().collect(),
            Layer::Flatten(_) => vec![input_shape.iter().product()],
            Layer::Sequential(stack) => stack.output_shape.clone(),
            Layer::Activation(_) | Layer::Dropout(_) | Layer::MonteCarloDropout(_) => {
                input_shape.to_vec()
            }
        }
    }

    pub fn forward(
        &self,
        x: ArrayD<f32>,
        training: bool,
        rng: &mut StdRng,
    ) -> Result<ArrayD<f32>> {
        match self {
            Layer::Dense(dense) => dense.forward(x),
            Layer::Conv1D(conv) => conv.forward(x),
            Layer::GlobalMaxPooling1D(_) => global_max_pool(x),
            Layer::Flatten(_) => flatten(x),
            Layer::Activation(params) => Ok(params.activation.apply(x)),
            Layer::Dropout(dropout) => dropout.forward(x, training, rng),
            Layer::MonteCarloDropout(dropout) => dropout.forward(x, training, rng),
            Layer::Sequential(stack) => stack.forward(x, training, rng),
        }
    }

    /// Serialize back into a declaration
    pub fn declaration(&self) -> Result<LayerDecl> {
        let class_name = self.class_name();
        match self {
            Layer::Dense(dense) => LayerDecl::new(class_name, &dense.params),
            Layer::Conv1D(conv) => LayerDecl::new(class_name, &conv.params),
            Layer::GlobalMaxPooling1D(params) | Layer::Flatten(params) => {
                LayerDecl::new(class_name, params)
            }
            Layer::Activation(params) => LayerDecl::new(class_name, params),
            Layer::Dropout(dropout) => LayerDecl::new(class_name, &dropout.params),
            Layer::MonteCarloDropout(dropout) => LayerDecl::new(class_name, &dropout.serialized()),
            Layer::Sequential(stack) => stack.declaration(false),
        }
    }

    /// Trainable arrays in declaration order
    pub fn weights(&self) -> Vec<ArrayD<f32>> {
        match self {
            Layer::Dense(dense) => dense.weights(),
            Layer::Conv1D(conv) => conv.weights(),
            Layer::Sequential(stack) => stack.layers.iter().flat_map(Layer::weights).collect(),
            _ => Vec::new(),
        }
    }

    pub fn load_weights<'a, I>(&mut self, weights: &mut I) -> Result<()>
    where
        I: Iterator<Item = &'a ArrayD<f32>>,
    {
        match self {
            Layer::Dense(dense) => dense.load_weights(weights),
            Layer::Conv1D(conv) => conv.load_weights(weights),
            Layer::Sequential(stack) => stack
                .layers
                .iter_mut()
                .try_for_each(|layer| layer.load_weights(weights)),
            _ => Ok(()),
        }
    }

    pub fn randomize(&mut self, rng: &mut StdRng) {
        match self {
            Layer::Dense(dense) => dense.randomize(rng),
            Layer::Conv1D(conv) => conv.randomize(rng),
            Layer::Sequential(stack) => stack.layers.iter_mut().for_each(|l| l.randomize(rng)),
            _ => {}
        }
    }

    /// Number of layers with `class_name`, counting nested containers
    pub fn count(&self, class_name: &str) -> usize {
        let own = usize::from(self.class_name() == class_name);
        match self {
            Layer::Sequential(stack) => {
                own + stack.layers.iter().map(|l| l.count(class_name)).sum::<usize>()
            }
            _ => own,
        }
    }
}

fn flatten(x: ArrayD<f32>) -> Result<ArrayD<f32>> {
    let rows = x.shape().first().copied().unwrap_or(0);
    let features: usize = x.shape().iter().skip(1).product();
    x.as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(&[rows, features]))
        .map_err(|e| EffectError::config(format!("Flatten: {}", e)))
}

/// Next weight array, checked against `dim` and copied into standard layout
pub(crate) fn load_weight<'a, I, D>(weights: &mut I, dim: D, what: &str) -> Result<Array<f32, D>>
where
    I: Iterator<Item = &'a ArrayD<f32>>,
    D: Dimension,
{
    let expected = dim.slice().to_vec();
    let weight = weights
        .next()
        .ok_or_else(|| EffectError::WeightShape(format!("missing {}", what)))?;
    if weight.shape() != expected.as_slice() {
        return Err(EffectError::WeightShape(format!(
            "{} expects shape {:?}, got {:?}",
            what,
            expected,
            weight.shape()
        )));
    }
    Array::from_shape_vec(dim, weight.iter().copied().collect())
        .map_err(|e| EffectError::WeightShape(format!("{}: {}", what, e)))
}

/// Glorot/Xavier uniform initialization
pub(crate) fn glorot_uniform<D: Dimension>(
    dim: D,
    fan_in: usize,
    fan_out: usize,
    rng: &mut StdRng,
) -> Array<f32, D> {
    let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    Array::from_shape_simple_fn(dim, || rng.gen_range(-limit..limit))
}
