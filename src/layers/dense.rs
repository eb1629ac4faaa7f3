//! Fully connected layer

use super::activation::Activation;
use super::{glorot_uniform, load_weight};
use crate::error::{EffectError, Result};
use ndarray::{Array1, Array2, ArrayD, Ix2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Constructor parameters of a `Dense` layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseParams {
    pub units: usize,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default = "default_true")]
    pub use_bias: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Fully connected layer over `(rows, features)` inputs
#[derive(Debug, Clone)]
pub struct Dense {
    pub params: DenseParams,
    kernel: Array2<f32>,
    bias: Array1<f32>,
}

impl Dense {
    /// Zero-initialized layer for inputs of shape `[features]`
    pub fn new(params: DenseParams, input_shape: &[usize]) -> Result<Self> {
        let [features] = input_shape else {
            return Err(EffectError::config(format!(
                "Dense expects a flat input, got shape {:?}",
                input_shape
            )));
        };
        if params.units == 0 {
            return Err(EffectError::config("Dense units must be > 0"));
        }
        Ok(Self {
            kernel: Array2::zeros((*features, params.units)),
            bias: Array1::zeros(params.units),
            params,
        })
    }

    pub fn output_shape(&self) -> Vec<usize> {
        vec![self.params.units]
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix2>().map_err(|_| {
            EffectError::config("Dense received a non-flat input; add a Flatten layer")
        })?;
        if x.ncols() != self.kernel.nrows() {
            return Err(EffectError::shape(
                "Dense input",
                &[x.nrows(), self.kernel.nrows()],
                &[x.nrows(), x.ncols()],
            ));
        }
        let mut out = x.dot(&self.kernel);
        if self.params.use_bias {
            out += &self.bias;
        }
        Ok(self.params.activation.apply(out.into_dyn()))
    }

    pub fn weights(&self) -> Vec<ArrayD<f32>> {
        let mut weights = vec![self.kernel.clone().into_dyn()];
        if self.params.use_bias {
            weights.push(self.bias.clone().into_dyn());
        }
        weights
    }

    pub fn load_weights<'a, I>(&mut self, weights: &mut I) -> Result<()>
    where
        I: Iterator<Item = &'a ArrayD<f32>>,
    {
        self.kernel = load_weight(weights, self.kernel.raw_dim(), "Dense kernel")?;
        if self.params.use_bias {
            self.bias = load_weight(weights, self.bias.raw_dim(), "Dense bias")?;
        }
        Ok(())
    }

    pub fn randomize(&mut self, rng: &mut StdRng) {
        let (fan_in, fan_out) = self.kernel.dim();
        self.kernel = glorot_uniform(self.kernel.raw_dim(), fan_in, fan_out, rng);
        self.bias.fill(0.0);
    }
}
