//! Per-parameter search ranges.
//!
//! Purpose
//! -------
//! Describe, for each of the seven model parameters, the interval the
//! estimator may explore and how finely the grid search discretizes it.
//!
//! Key behaviors
//! -------------
//! - [`Range::values`] yields the grid axis: `steps` evenly spaced values
//!   from `min` to `max` inclusive (`[min]` when `steps == 1`).
//! - The same `[min, max]` interval bounds gradient refinement: parameters
//!   are projected back into it after every step, so a degenerate range
//!   (`min == max`) fixes the parameter.
//! - [`ParameterRanges::bounded_by`] caps the emitter intensity axis at the
//!   largest observed intensity.
//!
//! Invariants & assumptions
//! ------------------------
//! After [`ParameterRanges::validate`]: every bound finite, `min ≤ max`,
//! `steps ≥ 1`, probability ranges inside (0, 1], `r_e`, `r_bg`, `sigma_ro`
//! non-negative, `gain` strictly positive.
use crate::counting::{
    core::params::{GAIN, NUM_PARAMS, P_OFF, P_ON, PARAM_NAMES, R_BG, R_E, SIGMA_RO},
    errors::{CountError, CountResult},
};
use ndarray::Array1;

/// Inclusive interval plus grid resolution for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

impl Range {
    pub const fn new(min: f64, max: f64, steps: usize) -> Self {
        Self { min, max, steps }
    }

    /// A degenerate range holding a single value.
    pub const fn fixed(value: f64) -> Self {
        Self { min: value, max: value, steps: 1 }
    }

    /// Whether refinement may move this parameter.
    pub fn is_free(&self) -> bool {
        self.max > self.min
    }

    /// Grid axis values.
    pub fn values(&self) -> Array1<f64> {
        if self.steps <= 1 || !self.is_free() {
            return Array1::from_elem(1, self.min);
        }
        Array1::linspace(self.min, self.max, self.steps)
    }

    /// Project `x` into `[min, max]`.
    pub fn project(&self, x: f64) -> f64 {
        x.clamp(self.min, self.max)
    }
}

/// `ParameterRanges` — one [`Range`] per model parameter.
///
/// Defaults
/// --------
/// | parameter  | min    | max    | steps |
/// |------------|--------|--------|-------|
/// | `r_e`      | 100    | 30000  | 100   |
/// | `r_bg`     | 5000   | 5000   | 1     |
/// | `mu_ro`    | 1000   | 3000   | 1     |
/// | `sigma_ro` | 0.1    | 0.1    | 1     |
/// | `gain`     | 1      | 1      | 1     |
/// | `p_on`     | 1e-4   | 1      | 20    |
/// | `p_off`    | 1e-4   | 1      | 20    |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRanges {
    pub r_e: Range,
    pub r_bg: Range,
    pub mu_ro: Range,
    pub sigma_ro: Range,
    pub gain: Range,
    pub p_on: Range,
    pub p_off: Range,
}

impl Default for ParameterRanges {
    fn default() -> Self {
        Self {
            r_e: Range::new(100.0, 30000.0, 100),
            r_bg: Range::new(5000.0, 5000.0, 1),
            mu_ro: Range::new(1000.0, 3000.0, 1),
            sigma_ro: Range::new(0.1, 0.1, 1),
            gain: Range::new(1.0, 1.0, 1),
            p_on: Range::new(1e-4, 1.0, 20),
            p_off: Range::new(1e-4, 1.0, 20),
        }
    }
}

impl ParameterRanges {
    /// Ranges in parameter index order.
    pub fn as_array(&self) -> [Range; NUM_PARAMS] {
        [self.r_e, self.r_bg, self.mu_ro, self.sigma_ro, self.gain, self.p_on, self.p_off]
    }

    /// Number of grid values along each parameter axis.
    pub fn grid_shape(&self) -> [usize; NUM_PARAMS] {
        self.as_array().map(|r| r.values().len())
    }

    /// Project every entry of a parameter lane into its range.
    pub fn project<'a>(&self, lane: impl IntoIterator<Item = &'a mut f64>) {
        for (x, range) in lane.into_iter().zip(self.as_array()) {
            *x = range.project(*x);
        }
    }

    /// Cap `r_e.max` so a single emitter never exceeds `max_x` photons after
    /// gain. The cap never drops below `r_e.min`.
    pub fn bounded_by(&self, max_x: f64) -> Self {
        let mut out = *self;
        let cap = (max_x / self.gain.min).max(self.r_e.min);
        out.r_e.max = self.r_e.max.min(cap);
        if !out.r_e.is_free() {
            out.r_e.steps = 1;
        }
        out
    }

    /// Reject malformed ranges before any work starts.
    ///
    /// Errors
    /// ------
    /// - `CountError::InvalidRange` naming the first malformed parameter.
    pub fn validate(&self) -> CountResult<()> {
        for (index, range) in self.as_array().into_iter().enumerate() {
            let Range { min, max, steps } = range;
            let fail = |reason| CountError::InvalidRange {
                name: PARAM_NAMES[index],
                min,
                max,
                steps,
                reason,
            };
            if !min.is_finite() || !max.is_finite() {
                return Err(fail("Range bounds must be finite."));
            }
            if min > max {
                return Err(fail("Range minimum must not exceed its maximum."));
            }
            if steps == 0 {
                return Err(fail("Range must have at least one step."));
            }
            match index {
                P_ON | P_OFF if min <= 0.0 || max > 1.0 => {
                    return Err(fail("Probability ranges must lie in (0, 1]."));
                }
                GAIN if min <= 0.0 => return Err(fail("Gain must be strictly positive.")),
                R_E | R_BG | SIGMA_RO if min < 0.0 => {
                    return Err(fail("Intensity ranges must be non-negative."));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
