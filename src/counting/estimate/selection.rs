//! Choosing the emitter count from the per-`y` likelihood table.
//!
//! The maximum log-likelihood of a trace never gets worse when more
//! emitters are allowed, so a plain argmax drifts towards large `y`. The
//! default [`SelectionRule::LikelihoodRatio`] instead returns the smallest
//! `y` whose log-likelihood lies within `½·χ²₁(confidence)` of the best
//! one, i.e. the smallest count a likelihood-ratio test at that confidence
//! cannot reject.
use crate::counting::errors::{CountError, CountResult};
use ndarray::{Array1, ArrayView2, Axis};
use statrs::distribution::{ChiSquared, Continuous, ContinuousCDF};

/// Rule mapping a column of per-`y` log-likelihoods to one `y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionRule {
    /// Largest log-likelihood; ties go to the smaller `y`.
    ArgMax,
    /// Smallest `y` within `½·χ²₁(confidence)` of the best log-likelihood.
    LikelihoodRatio { confidence: f64 },
}

impl Default for SelectionRule {
    fn default() -> Self {
        SelectionRule::LikelihoodRatio { confidence: 0.95 }
    }
}

impl SelectionRule {
    pub fn validate(&self) -> CountResult<()> {
        match *self {
            SelectionRule::ArgMax => Ok(()),
            SelectionRule::LikelihoodRatio { confidence } => {
                if confidence.is_finite() && confidence > 0.0 && confidence < 1.0 {
                    Ok(())
                } else {
                    Err(CountError::InvalidConfidence { value: confidence })
                }
            }
        }
    }

    /// Log-likelihood slack tolerated below the best candidate.
    pub fn threshold(&self) -> CountResult<f64> {
        self.validate()?;
        match *self {
            SelectionRule::ArgMax => Ok(0.0),
            SelectionRule::LikelihoodRatio { confidence } => {
                let chi2 = ChiSquared::new(1.0)
                    .map_err(|_| CountError::InvalidConfidence { value: confidence })?;
                // inverse_cdf bisects to ~1e-5; polish with Newton on the cdf
                let mut q = chi2.inverse_cdf(confidence);
                for _ in 0..4 {
                    let density = chi2.pdf(q);
                    if !(density.is_finite() && density > 0.0) {
                        break;
                    }
                    q -= (chi2.cdf(q) - confidence) / density;
                }
                Ok(0.5 * q)
            }
        }
    }
}

/// Pick `y` per trace from a `[n_candidates, n_traces]` log-likelihood table
/// whose first row corresponds to `min_y`. `NaN` counts as `−∞`.
///
/// Errors
/// ------
/// - `CountError::InvalidConfidence` for a malformed rule.
/// - `CountError::ShapeMismatch` if the table has no candidate rows.
pub fn select_y(
    log_likelihoods: ArrayView2<f64>, min_y: usize, rule: SelectionRule,
) -> CountResult<Array1<usize>> {
    if log_likelihoods.nrows() == 0 {
        return Err(CountError::ShapeMismatch {
            what: "log-likelihood table",
            expected: vec![1, log_likelihoods.ncols()],
            found: log_likelihoods.shape().to_vec(),
        });
    }
    let slack = rule.threshold()?;
    let score = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v };

    Ok(log_likelihoods
        .axis_iter(Axis(1))
        .map(|column| {
            let best = column.iter().copied().map(score).fold(f64::NEG_INFINITY, f64::max);
            let pick = column.iter().position(|&v| score(v) >= best - slack).unwrap_or(0);
            min_y + pick
        })
        .collect())
}
