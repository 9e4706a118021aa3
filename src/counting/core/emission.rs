//! Gaussian emission model for occupancy states.
//!
//! With `k` emitters "on", the camera records on average
//! `λ_k = r_bg + k·r_e` photons. The observed intensity is modelled as
//! Gaussian with
//!
//! - mean `μ_k = gain·λ_k + mu_ro`,
//! - variance `v_k = gain²·λ_k + sigma_ro²`,
//!
//! i.e. Poisson shot noise scaled by the gain plus Gaussian readout noise.
//! The variance is floored at [`VARIANCE_FLOOR`]. `k = 0` is the pure
//! background state and goes through the same formulas.
use crate::counting::core::params::{
    GAIN, MU_RO, NUM_PARAMS, Parameters, R_BG, R_E, SIGMA_RO,
};
use ndarray::{Array2, ArrayView1};
use statrs::consts::LN_SQRT_2PI;

/// Smallest variance any state may have.
pub const VARIANCE_FLOOR: f64 = 1e-6;

/// Moments of one occupancy state and their parameter derivatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateMoments {
    pub mean: f64,
    pub var: f64,
    pub d_mean: [f64; NUM_PARAMS],
    pub d_var: [f64; NUM_PARAMS],
}

impl StateMoments {
    /// Moments of the state with `k` emitters "on".
    pub fn new(k: usize, params: &Parameters) -> Self {
        let k = k as f64;
        let g = params.gain;
        let lambda = params.r_bg + k * params.r_e;

        let mut d_mean = [0.0; NUM_PARAMS];
        d_mean[R_E] = g * k;
        d_mean[R_BG] = g;
        d_mean[MU_RO] = 1.0;
        d_mean[GAIN] = lambda;

        let raw_var = g * g * lambda + params.sigma_ro * params.sigma_ro;
        let mut d_var = [0.0; NUM_PARAMS];
        if raw_var > VARIANCE_FLOOR {
            d_var[R_E] = g * g * k;
            d_var[R_BG] = g * g;
            d_var[SIGMA_RO] = 2.0 * params.sigma_ro;
            d_var[GAIN] = 2.0 * g * lambda;
        }

        Self { mean: g * lambda + params.mu_ro, var: raw_var.max(VARIANCE_FLOOR), d_mean, d_var }
    }

    /// Log density of `x` under this state.
    pub fn log_density(&self, x: f64) -> f64 {
        let r = x - self.mean;
        -LN_SQRT_2PI - 0.5 * self.var.ln() - r * r / (2.0 * self.var)
    }

    /// Log density of `x` and its partial derivatives in every parameter.
    pub fn log_density_with_grad(&self, x: f64, grad: &mut [f64; NUM_PARAMS]) -> f64 {
        let r = x - self.mean;
        let inv_v = 1.0 / self.var;
        let d_le_d_mean = r * inv_v;
        let d_le_d_var = 0.5 * r * r * inv_v * inv_v - 0.5 * inv_v;
        for p in 0..NUM_PARAMS {
            grad[p] = d_le_d_mean * self.d_mean[p] + d_le_d_var * self.d_var[p];
        }
        -LN_SQRT_2PI - 0.5 * self.var.ln() - r * r * 0.5 * inv_v
    }
}

/// Moments for every occupancy state `0..=y`.
pub fn state_moments(y: usize, params: &Parameters) -> Vec<StateMoments> {
    (0..=y).map(|k| StateMoments::new(k, params)).collect()
}

/// Log densities, shape `[t, y+1]`.
pub fn log_emission_probabilities(
    trace: ArrayView1<f64>, y: usize, params: &Parameters,
) -> Array2<f64> {
    let states = state_moments(y, params);
    Array2::from_shape_fn((trace.len(), y + 1), |(t, k)| states[k].log_density(trace[t]))
}

/// Densities, shape `[t, y+1]`.
pub fn emission_probabilities(trace: ArrayView1<f64>, y: usize, params: &Parameters) -> Array2<f64> {
    log_emission_probabilities(trace, y, params).mapv_into(f64::exp)
}
