//! Estimation hyper-parameters.
//!
//! Purpose
//! -------
//! Collect every knob of the estimator in one explicit, validated struct
//! that is passed into each estimation call. There is no process-wide
//! configuration.
//!
//! Key behaviors
//! -------------
//! - [`HyperParameters::default`] mirrors the reference settings: five
//!   restarts, 1000 epochs, a 10-step convergence window with tolerance
//!   1e-5, Adam rates 1e-3 (probabilities) and 1.0 (intensities), and the
//!   likelihood-ratio selection rule at 95 %.
//! - [`HyperParameters::validate`] rejects malformed settings before any
//!   likelihood is evaluated.
//! - [`HyperParameters::learning_rates`] expands the two learning-rate
//!   groups into a per-parameter vector, zeroing fixed parameters.
use crate::counting::{
    core::{
        params::{NUM_PARAMS, is_probability},
        ranges::ParameterRanges,
    },
    errors::{CountError, CountResult},
    estimate::selection::SelectionRule,
};
use crate::optimization::loglik_optimizer::MLEOptions;
use ndarray::Array1;

/// `HyperParameters` — settings for [`estimate_y`](crate::counting::estimate::estimate_y).
///
/// Fields
/// ------
/// - `min_y`: smallest candidate emitter count.
/// - `max_x`: largest plausible intensity; `None` derives it from the data.
/// - `num_guesses`: restarts per trace and candidate count.
/// - `epoch_length`: maximum number of refinement iterations.
/// - `is_done_window`: length `W` of the convergence history (≥ 2).
/// - `is_done_limit`: relative-improvement tolerance of the convergence test.
/// - `learning_rate`: Adam rate for `p_on` and `p_off`.
/// - `intensity_learning_rate`: Adam rate for the intensity parameters.
/// - `maxima_radius`: Chebyshev radius of the grid local-maxima search.
/// - `selection`: rule that picks the final emitter count.
/// - `polish`: optional L-BFGS polish of each trace's best restart.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperParameters {
    pub min_y: usize,
    pub max_x: Option<f64>,
    pub num_guesses: usize,
    pub epoch_length: usize,
    pub is_done_window: usize,
    pub is_done_limit: f64,
    pub learning_rate: f64,
    pub intensity_learning_rate: f64,
    pub maxima_radius: usize,
    pub selection: SelectionRule,
    pub polish: Option<MLEOptions>,
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self {
            min_y: 1,
            max_x: None,
            num_guesses: 5,
            epoch_length: 1000,
            is_done_window: 10,
            is_done_limit: 1e-5,
            learning_rate: 1e-3,
            intensity_learning_rate: 1.0,
            maxima_radius: 1,
            selection: SelectionRule::default(),
            polish: None,
        }
    }
}

impl HyperParameters {
    /// Check every setting.
    ///
    /// Errors
    /// ------
    /// - `CountError::InvalidHyperParameter` naming the first bad setting.
    /// - `CountError::InvalidConfidence` from the selection rule.
    pub fn validate(&self) -> CountResult<()> {
        let positive_count = [
            ("num_guesses", self.num_guesses, 1),
            ("epoch_length", self.epoch_length, 1),
            ("is_done_window", self.is_done_window, 2),
            ("maxima_radius", self.maxima_radius, 1),
        ];
        for (name, value, min) in positive_count {
            if value < min {
                return Err(CountError::InvalidHyperParameter {
                    name,
                    value: value as f64,
                    reason: if min == 1 {
                        "Must be at least 1."
                    } else {
                        "Must be at least 2."
                    },
                });
            }
        }
        if !self.is_done_limit.is_finite() || self.is_done_limit <= 0.0 {
            return Err(CountError::InvalidHyperParameter {
                name: "is_done_limit",
                value: self.is_done_limit,
                reason: "Convergence tolerance must be finite and positive.",
            });
        }
        for (name, value) in [
            ("learning_rate", self.learning_rate),
            ("intensity_learning_rate", self.intensity_learning_rate),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CountError::InvalidHyperParameter {
                    name,
                    value,
                    reason: "Learning rates must be finite and positive.",
                });
            }
        }
        if let Some(max_x) = self.max_x {
            if !max_x.is_finite() || max_x <= 0.0 {
                return Err(CountError::InvalidHyperParameter {
                    name: "max_x",
                    value: max_x,
                    reason: "Maximum intensity must be finite and positive.",
                });
            }
        }
        self.selection.validate()
    }

    /// Per-parameter Adam learning rates; fixed parameters get zero.
    pub fn learning_rates(&self, ranges: &ParameterRanges) -> Array1<f64> {
        let ranges = ranges.as_array();
        Array1::from_shape_fn(NUM_PARAMS, |p| {
            if !ranges[p].is_free() {
                0.0
            } else if is_probability(p) {
                self.learning_rate
            } else {
                self.intensity_learning_rate
            }
        })
    }
}
