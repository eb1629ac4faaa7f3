// Paired statistical combiner
//
// Reduces the four Monte Carlo sample tensors of a variant batch (reference,
// alternative, and both reverse complements) to per-(row, channel) effect
// statistics. Forward and reverse-complement orientations are tested
// separately with a paired t-test (reference vs alternative under the same
// dropout draws); each cell then reports the orientation with the more
// significant p-value.
//
// Scientific Foundation:
// - Gal, Y., & Ghahramani, Z. (2016). Dropout as a Bayesian approximation:
//   representing model uncertainty in deep learning. ICML.
//   Dropout left on at inference samples an approximate predictive posterior.
// - Paired t-test via statrs' Student-t distribution.

mod merge;
mod statistics;

pub use merge::{combine, overwrite_by, select_reverse, MergedStatistics};
pub use statistics::{paired_ttest, PairedTTest, SampleMoments};
