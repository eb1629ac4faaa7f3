//! Dropeffect - Monte Carlo dropout estimation of DNA variant effects
//!
//! This library turns a trained sequence model into a stochastic one by
//! keeping its dropout layers active at inference, samples predictions for
//! reference and mutated sequences in both strand orientations, and reduces
//! the samples to effect sizes, variances and paired t-test p-values.

pub mod combiner;
pub mod config;
pub mod error;
pub mod estimate;
pub mod graph;
pub mod layers;
pub mod output;
pub mod sampler;
pub mod sequence;
pub mod transform;

pub use config::EstimationConfig;
pub use error::{EffectError, Result};
pub use estimate::{estimate, EstimateRequest, Orientation, VariantBatches};
pub use graph::{LayerRegistry, Model, Network, Predictor};
pub use layers::{Layer, MonteCarloDropout};
pub use output::{ChannelSelection, EffectReport, EffectTable};
pub use transform::to_monte_carlo;
