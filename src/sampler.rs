//! Repeated stochastic sampling of a Monte Carlo dropout model
//!
//! Each forward pass gets its own RNG derived from `(base seed, stream,
//! iteration)`, so a sample tensor depends only on the seed and never on how
//! iterations are scheduled. That makes the iterations safe to run on the
//! rayon pool against one shared model.

use crate::error::{EffectError, Result};
use crate::graph::Predictor;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// SplitMix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Per-draw RNG seeds derived from one base seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSeeds {
    base: u64,
}

impl DrawSeeds {
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    /// Fresh base seed from the thread RNG
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    /// Fixed seed when given, fresh one otherwise
    pub fn from_option(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::new)
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// RNG for one forward pass
    pub fn rng(&self, stream: u64, iteration: usize) -> StdRng {
        let stream_seed = mix(self.base ^ mix(stream));
        StdRng::seed_from_u64(mix(stream_seed ^ iteration as u64))
    }
}

/// Runs a predictor repeatedly and stacks the selected output channels
#[derive(Debug, Clone)]
pub struct StochasticSampler {
    iterations: usize,
    seeds: DrawSeeds,
    parallel: bool,
}

impl StochasticSampler {
    pub fn new(iterations: usize, seeds: DrawSeeds) -> Self {
        Self {
            iterations,
            seeds,
            parallel: false,
        }
    }

    /// Spread iterations over the rayon pool (no effect without the `parallel` feature)
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Sample tensor of shape `(iterations, rows, channel_mask.len())`
    ///
    /// `stream` separates the draws of different input batches that share
    /// one base seed.
    pub fn sample<P: Predictor + ?Sized>(
        &self,
        model: &P,
        batch: &Array3<f32>,
        channel_mask: &[usize],
        stream: u64,
    ) -> Result<Array3<f32>> {
        if self.iterations == 0 {
            return Err(EffectError::invalid("iterations must be > 0"));
        }
        let width = model.output_width();
        if let Some(&bad) = channel_mask.iter().find(|&&c| c >= width) {
            return Err(EffectError::invalid(format!(
                "channel index {} out of range for {} model outputs",
                bad, width
            )));
        }

        let draws = self.draw_all(model, batch, channel_mask, stream)?;
        let views: Vec<ArrayView2<f32>> = draws.iter().map(|d| d.view()).collect();
        ndarray::stack(Axis(0), &views)
            .map_err(|e| EffectError::config(format!("inconsistent prediction shapes: {}", e)))
    }

    fn draw<P: Predictor + ?Sized>(
        &self,
        model: &P,
        batch: &Array3<f32>,
        channel_mask: &[usize],
        stream: u64,
        iteration: usize,
    ) -> Result<Array2<f32>> {
        let mut rng = self.seeds.rng(stream, iteration);
        let prediction = model.predict(batch, &mut rng)?;
        Ok(prediction.select(Axis(1), channel_mask))
    }

    #[cfg(feature = "parallel")]
    fn draw_all<P: Predictor + ?Sized>(
        &self,
        model: &P,
        batch: &Array3<f32>,
        channel_mask: &[usize],
        stream: u64,
    ) -> Result<Vec<Array2<f32>>> {
        if self.parallel {
            (0..self.iterations)
                .into_par_iter()
                .map(|i| self.draw(model, batch, channel_mask, stream, i))
                .collect()
        } else {
            (0..self.iterations)
                .map(|i| self.draw(model, batch, channel_mask, stream, i))
                .collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn draw_all<P: Predictor + ?Sized>(
        &self,
        model: &P,
        batch: &Array3<f32>,
        channel_mask: &[usize],
        stream: u64,
    ) -> Result<Vec<Array2<f32>>> {
        (0..self.iterations)
            .map(|i| self.draw(model, batch, channel_mask, stream, i))
            .collect()
    }
}

/// Run `model` `iterations` times on `batch` with fresh randomness
pub fn sample<P: Predictor + ?Sized>(
    model: &P,
    batch: &Array3<f32>,
    channel_mask: &[usize],
    iterations: usize,
) -> Result<Array3<f32>> {
    StochasticSampler::new(iterations, DrawSeeds::from_entropy()).sample(
        model,
        batch,
        channel_mask,
        0,
    )
}
