use super::statistics::{paired_ttest, PairedTTest, SampleMoments};
use crate::error::{EffectError, Result};
use ndarray::{Array2, Array3, Zip};

/// Cells where the reverse-complement test is the more significant one
///
/// `|p| > |p_rc|`, strictly: ties and NaN comparisons keep the forward orientation.
pub fn select_reverse(pvalue: &Array2<f64>, pvalue_rc: &Array2<f64>) -> Result<Array2<bool>> {
    if pvalue.shape() != pvalue_rc.shape() {
        return Err(EffectError::shape(
            "reverse-complement p-values",
            pvalue.shape(),
            pvalue_rc.shape(),
        ));
    }
    Ok(Zip::from(pvalue)
        .and(pvalue_rc)
        .map_collect(|p, p_rc| p.abs() > p_rc.abs()))
}

/// Copy of `main` with every cell taken from `alt` where `selector` is true
///
/// # Example
/// ```
/// use dropeffect::combiner::overwrite_by;
/// use ndarray::arr2;
///
/// let main = arr2(&[[1, 2], [4, 5]]);
/// let alt = arr2(&[[1, 8], [4, 5]]);
/// let selector = arr2(&[[false, true], [false, false]]);
/// assert_eq!(overwrite_by(&main, &alt, &selector).unwrap(), arr2(&[[1, 8], [4, 5]]));
/// ```
pub fn overwrite_by<T: Copy>(
    main: &Array2<T>,
    alt: &Array2<T>,
    selector: &Array2<bool>,
) -> Result<Array2<T>> {
    if alt.shape() != main.shape() {
        return Err(EffectError::shape("overwrite values", main.shape(), alt.shape()));
    }
    if selector.shape() != main.shape() {
        return Err(EffectError::shape(
            "overwrite selector",
            main.shape(),
            selector.shape(),
        ));
    }
    Ok(Zip::from(main)
        .and(alt)
        .and(selector)
        .map_collect(|&m, &a, &take| if take { a } else { m }))
}

/// `sqrt((cvar²_ref + cvar²_alt) / 2)`
fn pooled_cvar(reference: &SampleMoments, alternative: &SampleMoments) -> Array2<f64> {
    Zip::from(&reference.cvar2)
        .and(&alternative.cvar2)
        .map_collect(|&r, &a| ((r + a) / 2.0).sqrt())
}

/// Per-orientation statistics reduced to one value per (row, channel)
#[derive(Debug, Clone)]
pub struct MergedStatistics {
    /// Test on the forward strand
    pub forward: PairedTTest,

    /// Test on the reverse-complement strand
    pub reverse: PairedTTest,

    /// True where the reverse-complement orientation was chosen
    pub selector: Array2<bool>,

    pub pvalue: Array2<f64>,
    pub statistic: Array2<f64>,
    pub ref_mean: Array2<f64>,
    pub alt_mean: Array2<f64>,
    pub ref_var: Array2<f64>,
    pub alt_var: Array2<f64>,
    pub cvar: Array2<f64>,

    /// `alt_mean - ref_mean`, after merging
    pub diff: Array2<f64>,
}

/// Combine the four sample tensors of one variant batch
///
/// Each cell reports the orientation whose paired t-test has the smaller
/// p-value.
///
/// # Errors
/// `ShapeMismatch` unless all four tensors share one shape,
/// `InvalidArgument` with fewer than two iterations.
pub fn combine(
    reference: &Array3<f32>,
    reference_rc: &Array3<f32>,
    alternative: &Array3<f32>,
    alternative_rc: &Array3<f32>,
) -> Result<MergedStatistics> {
    for (what, tensor) in [
        ("reverse-complement reference samples", reference_rc),
        ("alternative samples", alternative),
        ("reverse-complement alternative samples", alternative_rc),
    ] {
        if tensor.shape() != reference.shape() {
            return Err(EffectError::shape(what, reference.shape(), tensor.shape()));
        }
    }

    let forward = paired_ttest(reference, alternative)?;
    let reverse = paired_ttest(reference_rc, alternative_rc)?;
    let selector = select_reverse(&forward.pvalue, &reverse.pvalue)?;

    let ref_fwd = SampleMoments::from_samples(reference)?;
    let ref_rev = SampleMoments::from_samples(reference_rc)?;
    let alt_fwd = SampleMoments::from_samples(alternative)?;
    let alt_rev = SampleMoments::from_samples(alternative_rc)?;

    let pick = |main: &Array2<f64>, alt: &Array2<f64>| overwrite_by(main, alt, &selector);

    let pvalue = pick(&forward.pvalue, &reverse.pvalue)?;
    let statistic = pick(&forward.statistic, &reverse.statistic)?;
    let cvar = pick(
        &pooled_cvar(&ref_fwd, &alt_fwd),
        &pooled_cvar(&ref_rev, &alt_rev),
    )?;
    let ref_mean = pick(&ref_fwd.mean, &ref_rev.mean)?;
    let alt_mean = pick(&alt_fwd.mean, &alt_rev.mean)?;
    let ref_var = pick(&ref_fwd.var, &ref_rev.var)?;
    let alt_var = pick(&alt_fwd.var, &alt_rev.var)?;
    let diff = &alt_mean - &ref_mean;

    Ok(MergedStatistics {
        forward,
        reverse,
        selector,
        pvalue,
        statistic,
        ref_mean,
        alt_mean,
        ref_var,
        alt_var,
        cvar,
        diff,
    })
}
