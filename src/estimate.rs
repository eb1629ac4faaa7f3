//! Dropout-based effect and uncertainty estimation
//!
//! Entry point wiring the pipeline together: preconditions are checked
//! first, without touching the model; the Monte Carlo copy is built once;
//! each of the four batches is sampled on its own RNG stream; the samples
//! are reduced by the paired combiner and labeled.

use crate::combiner::{combine, MergedStatistics};
use crate::config::EstimationConfig;
use crate::error::{EffectError, Result};
use crate::graph::Model;
use crate::output::{ChannelSelection, EffectReport, EffectTable};
use crate::sampler::{DrawSeeds, StochasticSampler};
use crate::transform::to_monte_carlo;
use ndarray::{Array2, Array3, Axis};
use std::time::Instant;

/// The four one-hot batches of one set of variants
#[derive(Debug, Clone)]
pub struct VariantBatches {
    pub reference: Array3<f32>,
    pub reference_rc: Array3<f32>,
    pub alternative: Array3<f32>,
    pub alternative_rc: Array3<f32>,
}

impl VariantBatches {
    pub fn new(
        reference: Array3<f32>,
        reference_rc: Array3<f32>,
        alternative: Array3<f32>,
        alternative_rc: Array3<f32>,
    ) -> Self {
        Self {
            reference,
            reference_rc,
            alternative,
            alternative_rc,
        }
    }

    /// Forward batches plus their reverse complements
    pub fn from_forward(reference: Array3<f32>, alternative: Array3<f32>) -> Self {
        let reference_rc = crate::sequence::reverse_complement(&reference);
        let alternative_rc = crate::sequence::reverse_complement(&alternative);
        Self::new(reference, reference_rc, alternative, alternative_rc)
    }

    pub fn rows(&self) -> usize {
        self.reference.len_of(Axis(0))
    }

    pub fn batch(&self, orientation: Orientation) -> &Array3<f32> {
        match orientation {
            Orientation::Reference => &self.reference,
            Orientation::ReferenceRc => &self.reference_rc,
            Orientation::Alternative => &self.alternative,
            Orientation::AlternativeRc => &self.alternative_rc,
        }
    }

    /// All four batches must share one shape
    pub fn validate(&self) -> Result<()> {
        for orientation in Orientation::ALL {
            let batch = self.batch(orientation);
            if batch.shape() != self.reference.shape() {
                return Err(EffectError::shape(
                    orientation.name(),
                    self.reference.shape(),
                    batch.shape(),
                ));
            }
        }
        Ok(())
    }
}

/// Which of the four batches a sample tensor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Reference,
    ReferenceRc,
    Alternative,
    AlternativeRc,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Reference,
        Orientation::ReferenceRc,
        Orientation::Alternative,
        Orientation::AlternativeRc,
    ];

    /// RNG stream of this batch's dropout draws
    pub fn stream(self) -> u64 {
        match self {
            Orientation::Reference => 0,
            Orientation::ReferenceRc => 1,
            Orientation::Alternative => 2,
            Orientation::AlternativeRc => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Reference => "reference batch",
            Orientation::ReferenceRc => "reverse-complement reference batch",
            Orientation::Alternative => "alternative batch",
            Orientation::AlternativeRc => "reverse-complement alternative batch",
        }
    }
}

/// Estimate variant effects and their uncertainty with Monte Carlo dropout
///
/// Returns one table per statistic, rows = variants, columns = the selected
/// channel labels in selection order.
///
/// # Errors
/// - `InvalidArgument` for an invalid config, a position count that differs
///   from the row count, a label count that differs from the model's output
///   width, or an invalid channel selection
/// - `ShapeMismatch` when the four batches differ in shape
/// - transform errors when the model cannot be rebuilt with Monte Carlo dropout
///
/// All of these except the transform errors are raised before the model is
/// used.
pub fn estimate<M: Model + ?Sized>(
    model: &M,
    batches: &VariantBatches,
    mutation_positions: &[usize],
    labels: &[String],
    selection: &ChannelSelection,
    config: &EstimationConfig,
) -> Result<EffectReport> {
    let (indices, merged) = estimate_statistics(
        model,
        batches,
        mutation_positions,
        labels,
        selection,
        config,
    )?;
    let columns: Vec<String> = indices.iter().map(|&i| labels[i].clone()).collect();

    let table = |values: Array2<f64>| EffectTable::new(columns.clone(), values);
    Ok(EffectReport {
        pv: table(merged.pvalue)?,
        ref_mean: table(merged.ref_mean)?,
        alt_mean: table(merged.alt_mean)?,
        ref_var: table(merged.ref_var)?,
        alt_var: table(merged.alt_var)?,
        cvar: table(merged.cvar)?,
        diff: table(merged.diff)?,
    })
}

/// Like [`estimate`], but returns the selected channel indices and the full
/// merged statistics, including both per-orientation t-tests
pub fn estimate_statistics<M: Model + ?Sized>(
    model: &M,
    batches: &VariantBatches,
    mutation_positions: &[usize],
    labels: &[String],
    selection: &ChannelSelection,
    config: &EstimationConfig,
) -> Result<(Vec<usize>, MergedStatistics)> {
    config.validate().map_err(EffectError::InvalidArgument)?;
    batches.validate()?;
    if mutation_positions.len() != batches.rows() {
        return Err(EffectError::invalid(format!(
            "{} mutation positions for {} rows",
            mutation_positions.len(),
            batches.rows()
        )));
    }
    if labels.len() != model.output_width() {
        return Err(EffectError::invalid(format!(
            "{} channel labels for {} model outputs",
            labels.len(),
            model.output_width()
        )));
    }
    let indices = selection.resolve(labels)?;

    let start = Instant::now();
    let stochastic = to_monte_carlo(model)?;
    let seeds = DrawSeeds::from_option(config.seed);
    let sampler = StochasticSampler::new(config.iterations, seeds).with_parallel(config.parallel);

    let mut samples = Vec::with_capacity(Orientation::ALL.len());
    for orientation in Orientation::ALL {
        tracing::debug!(
            batch = orientation.name(),
            iterations = config.iterations,
            "sampling Monte Carlo dropout predictions"
        );
        samples.push(sampler.sample(
            &stochastic,
            batches.batch(orientation),
            &indices,
            orientation.stream(),
        )?);
    }

    let merged = combine(&samples[0], &samples[1], &samples[2], &samples[3])?;
    let reverse_cells = merged.selector.iter().filter(|&&rc| rc).count();
    tracing::info!(
        rows = batches.rows(),
        channels = indices.len(),
        iterations = config.iterations,
        reverse_cells,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "dropout effect estimation complete"
    );

    Ok((indices, merged))
}

/// Owned request with optional channel filters
///
/// # Example
/// ```no_run
/// # fn run(model: &dropeffect::Network, batches: dropeffect::VariantBatches) -> dropeffect::Result<()> {
/// use dropeffect::EstimateRequest;
///
/// let labels = vec!["DNase".to_string(), "CTCF".to_string()];
/// let report = EstimateRequest::new(model, batches, vec![500], labels)
///     .with_wanted_channels(vec!["CTCF".to_string()])
///     .with_iterations(50)
///     .run()?;
/// assert_eq!(report.diff.columns, vec!["CTCF"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EstimateRequest<'a, M: ?Sized> {
    model: &'a M,
    batches: VariantBatches,
    mutation_positions: Vec<usize>,
    labels: Vec<String>,
    channel_mask: Option<Vec<usize>>,
    wanted_channels: Option<Vec<String>>,
    config: EstimationConfig,
}

impl<'a, M: Model + ?Sized> EstimateRequest<'a, M> {
    pub fn new(
        model: &'a M,
        batches: VariantBatches,
        mutation_positions: Vec<usize>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            model,
            batches,
            mutation_positions,
            labels,
            channel_mask: None,
            wanted_channels: None,
            config: EstimationConfig::default(),
        }
    }

    pub fn with_channel_mask(mut self, mask: Vec<usize>) -> Self {
        self.channel_mask = Some(mask);
        self
    }

    pub fn with_wanted_channels(mut self, names: Vec<String>) -> Self {
        self.wanted_channels = Some(names);
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    pub fn with_config(mut self, config: EstimationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn run(self) -> Result<EffectReport> {
        let selection = ChannelSelection::from_options(self.channel_mask, self.wanted_channels)?;
        estimate(
            self.model,
            &self.batches,
            &self.mutation_positions,
            &self.labels,
            &selection,
            &self.config,
        )
    }

    /// Run and key the tables by the configured prefix
    pub fn run_named(self) -> Result<std::collections::BTreeMap<String, EffectTable>> {
        let prefix = self.config.prefix.clone();
        Ok(self.run()?.into_named(&prefix))
    }
}
