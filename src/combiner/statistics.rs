// Element-wise statistics over the iteration axis of sample tensors
//
// Sample tensors are (iterations, rows, channels). Every statistic here
// reduces axis 0 and yields a (rows, channels) matrix in f64.
//
// - Paired t-test: d = a - b, t = mean(d) / sqrt(var(d, ddof=1) / n),
//   two-sided p from the Student-t survival function with n - 1 dof (statrs)
// - Moments: mean, population variance (ddof 0), squared coefficient of
//   variation var / mean^2
//
// Degenerate cells are not errors. Zero spread with a non-zero mean gives
// t = +/-inf and p = 0; zero spread with zero mean gives NaN for both.

use crate::error::{EffectError, Result};
use ndarray::{Array2, Array3, Axis, Zip};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of an element-wise paired t-test
#[derive(Debug, Clone, PartialEq)]
pub struct PairedTTest {
    /// t statistic per (row, channel)
    pub statistic: Array2<f64>,

    /// Two-sided p-value per (row, channel)
    pub pvalue: Array2<f64>,

    /// Degrees of freedom (iterations - 1)
    pub df: f64,
}

/// Paired t-test of `a` against `b` along the iteration axis
///
/// # Errors
/// `ShapeMismatch` when the tensors differ in shape, `InvalidArgument` with
/// fewer than two iterations.
pub fn paired_ttest(a: &Array3<f32>, b: &Array3<f32>) -> Result<PairedTTest> {
    if a.shape() != b.shape() {
        return Err(EffectError::shape("paired samples", a.shape(), b.shape()));
    }
    let n = a.len_of(Axis(0));
    if n < 2 {
        return Err(EffectError::invalid(format!(
            "paired t-test needs at least 2 iterations, got {}",
            n
        )));
    }

    let d = a.mapv(f64::from) - b.mapv(f64::from);
    let mean = d
        .mean_axis(Axis(0))
        .ok_or_else(|| EffectError::invalid("empty iteration axis"))?;
    let var = d.var_axis(Axis(0), 1.0);
    let n_f = n as f64;
    let df = n_f - 1.0;

    let statistic = Zip::from(&mean)
        .and(&var)
        .map_collect(|&m, &v| m / (v / n_f).sqrt());

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| EffectError::invalid(format!("Student-t with {} dof: {}", df, e)))?;
    let pvalue = statistic.mapv(|t| two_sided_pvalue(&dist, t));

    Ok(PairedTTest {
        statistic,
        pvalue,
        df,
    })
}

fn two_sided_pvalue(dist: &StudentsT, t: f64) -> f64 {
    if t.is_nan() {
        f64::NAN
    } else if t.is_infinite() {
        0.0
    } else {
        (2.0 * dist.sf(t.abs())).min(1.0)
    }
}

/// Across-iteration moments of one sample tensor
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMoments {
    pub mean: Array2<f64>,
    /// Population variance (ddof 0)
    pub var: Array2<f64>,
    /// Squared coefficient of variation, `var / mean²`
    pub cvar2: Array2<f64>,
}

impl SampleMoments {
    pub fn from_samples(samples: &Array3<f32>) -> Result<Self> {
        let samples = samples.mapv(f64::from);
        let mean = samples
            .mean_axis(Axis(0))
            .ok_or_else(|| EffectError::invalid("cannot take moments of zero iterations"))?;
        let var = samples.var_axis(Axis(0), 0.0);
        let cvar2 = Zip::from(&var)
            .and(&mean)
            .map_collect(|&v, &m| v / (m * m));
        Ok(Self { mean, var, cvar2 })
    }
}
