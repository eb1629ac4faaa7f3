// Model capabilities and serialized layer graphs
//
// A model is consumed through two capabilities: `Predictor` maps a one-hot
// batch to an output matrix, `Model` additionally exposes its serialized
// layer graph and weights so it can be rebuilt with different layer classes.
//
// Prediction takes the RNG explicitly. Stochastic layers draw their masks
// from it, so a shared model is immutable (`Sync`) during sampling and a
// draw is reproducible from its RNG seed alone.

mod network;
mod registry;

pub use network::Network;
pub use registry::{LayerConstructor, LayerRegistry};

use crate::error::Result;
use ndarray::{Array2, Array3, ArrayD};
use rand::rngs::StdRng;
use serde_json::Value;

/// Maps a `(rows, length, channels)` batch to `(rows, outputs)` predictions
pub trait Predictor: Sync {
    /// Number of output channels per row
    fn output_width(&self) -> usize;

    /// Inference-mode forward pass
    fn predict(&self, batch: &Array3<f32>, rng: &mut StdRng) -> Result<Array2<f32>>;
}

/// A predictor that can be serialized and rebuilt
pub trait Model: Predictor {
    /// Serialized layer graph
    fn config(&self) -> Result<Value>;

    /// Weight arrays in layer order
    fn weights(&self) -> Vec<ArrayD<f32>>;
}
