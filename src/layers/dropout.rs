//! Standard and Monte Carlo (always-on) dropout
//!
//! Standard dropout masks activations only while training; at inference it
//! is the identity. `MonteCarloDropout` keeps masking at inference too, so
//! repeated predictions on one input sample from the approximate posterior
//! predictive distribution of the network.
//!
//! # References
//!
//! Gal, Y., & Ghahramani, Z. (2016). Dropout as a Bayesian approximation:
//! Representing model uncertainty in deep learning. ICML.

use super::Layer;
use crate::error::{EffectError, Result};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Constructor parameters shared by both dropout variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropoutParams {
    /// Probability of zeroing each element
    pub rate: f64,

    /// Mask shape including the batch axis; `None` entries take the input's
    /// extent, size-1 entries share one mask value along that axis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_shape: Option<Vec<Option<usize>>>,

    /// Re-keys this layer's mask stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DropoutParams {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            noise_shape: None,
            seed: None,
            name: None,
        }
    }

    /// Masking is a no-op unless `0 < rate < 1`
    pub fn is_active(&self) -> bool {
        self.rate > 0.0 && self.rate < 1.0
    }

    fn mask_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        let Some(noise) = &self.noise_shape else {
            return Ok(input.to_vec());
        };
        if noise.len() != input.len() {
            return Err(EffectError::shape(
                "dropout noise_shape rank",
                &[input.len()],
                &[noise.len()],
            ));
        }
        noise
            .iter()
            .zip(input)
            .map(|(n, &extent)| match *n {
                None => Ok(extent),
                Some(1) => Ok(1),
                Some(n) if n == extent => Ok(n),
                Some(_) => Err(EffectError::shape(
                    "dropout noise_shape",
                    input,
                    &noise.iter().map(|n| n.unwrap_or(0)).collect::<Vec<_>>(),
                )),
            })
            .collect()
    }

    /// Zero each element with probability `rate`, scale survivors by `1/(1-rate)`
    fn apply(&self, input: ArrayD<f32>, rng: &mut StdRng) -> Result<ArrayD<f32>> {
        if !self.is_active() {
            return Ok(input);
        }

        let shape = self.mask_shape(input.shape())?;
        let keep = 1.0 - self.rate;
        let scale = (1.0 / keep) as f32;

        let mut keyed;
        let rng = match self.seed {
            Some(seed) => {
                keyed = StdRng::seed_from_u64(seed ^ rng.gen::<u64>());
                &mut keyed
            }
            None => rng,
        };

        let mask = ArrayD::from_shape_simple_fn(IxDyn(&shape), || {
            if rng.gen::<f64>() < keep {
                scale
            } else {
                0.0
            }
        });
        let mask = mask
            .broadcast(input.raw_dim())
            .ok_or_else(|| EffectError::shape("dropout mask", input.shape(), &shape))?;

        Ok(input * &mask)
    }
}

/// Standard dropout: masks in training mode, identity otherwise
#[derive(Debug, Clone, PartialEq)]
pub struct Dropout {
    pub params: DropoutParams,
}

impl Dropout {
    pub fn new(params: DropoutParams) -> Self {
        Self { params }
    }

    pub fn forward(
        &self,
        input: ArrayD<f32>,
        training: bool,
        rng: &mut StdRng,
    ) -> Result<ArrayD<f32>> {
        if training {
            self.params.apply(input, rng)
        } else {
            Ok(input)
        }
    }
}

/// Serialized parameters of `MonteCarloDropout`
///
/// Same parameter set as `Dropout`, so a standard declaration can be retagged
/// without touching its config. `always_on = false` restores standard behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloParams {
    #[serde(flatten)]
    pub dropout: DropoutParams,
    #[serde(default = "default_true")]
    pub always_on: bool,
}

/// Dropout that ignores the training flag and masks on every forward pass
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloDropout {
    pub params: DropoutParams,
    pub always_on: bool,
}

impl MonteCarloDropout {
    pub fn new(params: DropoutParams) -> Self {
        Self {
            params,
            always_on: true,
        }
    }

    /// Copy the parameters of an existing standard dropout layer
    ///
    /// # Errors
    /// `InvalidArgument` when `layer` is not a standard `Dropout`.
    pub fn create_from(layer: &Layer) -> Result<Self> {
        match layer {
            Layer::Dropout(dropout) => Ok(Self::new(dropout.params.clone())),
            other => Err(EffectError::invalid(format!(
                "only Dropout layers can be converted to MonteCarloDropout, got {}",
                other.class_name()
            ))),
        }
    }

    pub fn from_serialized(params: MonteCarloParams) -> Self {
        Self {
            params: params.dropout,
            always_on: params.always_on,
        }
    }

    pub fn serialized(&self) -> MonteCarloParams {
        MonteCarloParams {
            dropout: self.params.clone(),
            always_on: self.always_on,
        }
    }

    pub fn forward(
        &self,
        input: ArrayD<f32>,
        training: bool,
        rng: &mut StdRng,
    ) -> Result<ArrayD<f32>> {
        if self.always_on || training {
            self.params.apply(input, rng)
        } else {
            Ok(input)
        }
    }
}
