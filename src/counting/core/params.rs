//! Photophysical parameter vector for one trace under one candidate count.
//!
//! Purpose
//! -------
//! Name the seven continuous parameters of the blinking-emitter model and
//! fix the order in which they are laid out in every batched array.
//!
//! Conventions
//! -----------
//! - Index order: `r_e, r_bg, mu_ro, sigma_ro, gain, p_on, p_off`
//!   (see the `R_E` … `P_OFF` constants).
//! - `p_on` and `p_off` are per-step switching probabilities; the other five
//!   live on intensity scales and are refined with a separate learning rate.
//! - Batched parameter sets are `Array3<f64>` shaped
//!   `(n_traces, n_guesses, NUM_PARAMS)`.
use crate::counting::errors::{CountError, CountResult};
use ndarray::{Array1, ArrayView1};

/// Number of continuous model parameters.
pub const NUM_PARAMS: usize = 7;

pub const R_E: usize = 0;
pub const R_BG: usize = 1;
pub const MU_RO: usize = 2;
pub const SIGMA_RO: usize = 3;
pub const GAIN: usize = 4;
pub const P_ON: usize = 5;
pub const P_OFF: usize = 6;

/// Parameter names in index order.
pub const PARAM_NAMES: [&str; NUM_PARAMS] =
    ["r_e", "r_bg", "mu_ro", "sigma_ro", "gain", "p_on", "p_off"];

/// Whether the parameter at `index` is a probability.
pub fn is_probability(index: usize) -> bool {
    index == P_ON || index == P_OFF
}

/// `Parameters` — one point in model space.
///
/// Fields
/// ------
/// - `r_e`: expected photons per step from a single "on" emitter.
/// - `r_bg`: expected background photons per step.
/// - `mu_ro`: camera readout offset.
/// - `sigma_ro`: camera readout noise (standard deviation).
/// - `gain`: camera gain applied to the photon count.
/// - `p_on`: probability that an "off" emitter switches on in one step.
/// - `p_off`: probability that an "on" emitter switches off in one step.
///
/// Invariants
/// ----------
/// Values built through [`Parameters::new`] or [`Parameters::from_slice`]
/// satisfy: all finite, `r_e, r_bg, sigma_ro ≥ 0`, `gain > 0`,
/// `p_on, p_off ∈ (0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    pub r_e: f64,
    pub r_bg: f64,
    pub mu_ro: f64,
    pub sigma_ro: f64,
    pub gain: f64,
    pub p_on: f64,
    pub p_off: f64,
}

impl Parameters {
    /// Construct validated parameters.
    ///
    /// Errors
    /// ------
    /// - `CountError::InvalidParameter` naming the first offending member.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        r_e: f64, r_bg: f64, mu_ro: f64, sigma_ro: f64, gain: f64, p_on: f64, p_off: f64,
    ) -> CountResult<Self> {
        let params = Self { r_e, r_bg, mu_ro, sigma_ro, gain, p_on, p_off };
        params.validate()?;
        Ok(params)
    }

    /// Construct validated parameters from a slice in index order.
    ///
    /// Errors
    /// ------
    /// - `CountError::ParameterLength` if `values.len() != NUM_PARAMS`.
    /// - `CountError::InvalidParameter` as for [`Parameters::new`].
    pub fn from_slice(values: &[f64]) -> CountResult<Self> {
        if values.len() != NUM_PARAMS {
            return Err(CountError::ParameterLength {
                expected: NUM_PARAMS,
                found: values.len(),
            });
        }
        let params = Self::from_view_unchecked(ArrayView1::from(values));
        params.validate()?;
        Ok(params)
    }

    /// Read a length-`NUM_PARAMS` lane without validation. Used on lanes of
    /// internally built batches, whose length is fixed by construction.
    pub(crate) fn from_view_unchecked(lane: ArrayView1<f64>) -> Self {
        Self {
            r_e: lane[R_E],
            r_bg: lane[R_BG],
            mu_ro: lane[MU_RO],
            sigma_ro: lane[SIGMA_RO],
            gain: lane[GAIN],
            p_on: lane[P_ON],
            p_off: lane[P_OFF],
        }
    }

    /// Values in index order.
    pub fn to_values(&self) -> [f64; NUM_PARAMS] {
        [self.r_e, self.r_bg, self.mu_ro, self.sigma_ro, self.gain, self.p_on, self.p_off]
    }

    pub fn to_array(&self) -> Array1<f64> {
        Array1::from(self.to_values().to_vec())
    }

    /// Check the domain of every member.
    ///
    /// Errors
    /// ------
    /// - `CountError::InvalidParameter` naming the first offending member.
    pub fn validate(&self) -> CountResult<()> {
        for (index, value) in self.to_values().into_iter().enumerate() {
            let name = PARAM_NAMES[index];
            if !value.is_finite() {
                return Err(CountError::InvalidParameter {
                    name,
                    value,
                    reason: "Parameters must be finite.",
                });
            }
            let reason = match index {
                P_ON | P_OFF if value <= 0.0 || value > 1.0 => {
                    Some("Switching probabilities must lie in (0, 1].")
                }
                GAIN if value <= 0.0 => Some("Gain must be strictly positive."),
                R_E | R_BG | SIGMA_RO if value < 0.0 => Some("Intensities must be non-negative."),
                _ => None,
            };
            if let Some(reason) = reason {
                return Err(CountError::InvalidParameter { name, value, reason });
            }
        }
        Ok(())
    }
}
