//! Forward-algorithm log-likelihood of an intensity trace.
//!
//! This module combines the occupancy chain and the emission model into the
//! marginal log-likelihood `ℓ(θ) = ln p(x₁..x_T | y, θ)` of one trace, and
//! wires it to the [`LogLikelihood`] trait so it plugs into the L-BFGS
//! optimizer.
//!
//! Key ideas:
//! - Scaled forward recursion. At each step the predicted occupancy
//!   distribution `u` is weighted by `exp(le_k − m)`, where `m` is the largest
//!   log emission among reachable states, and renormalized by its sum `c`.
//!   Then `ℓ = Σ_t (m_t + ln c_t)`, which stays finite far beyond the range
//!   where raw probabilities underflow.
//! - Gradient by forward-mode sensitivity propagation. Alongside the
//!   normalized forward vector `α` we carry `D = ∂α/∂θ` (`(y+1) × 7`). The
//!   shift `m_t` cancels analytically, so per step
//!   `∂ℓ += Σ_k ∂ã_k / c` with `ã_k = u_k·exp(le_k − m)`.
//! - The value-only path [`forward_log_likelihood`] takes a precomputed chain
//!   so grid evaluation can share it across traces.
//!
//! A state sequence that becomes impossible (`c = 0`) yields `ℓ = −∞`;
//! `NaN` inputs propagate to a `NaN` result. Nothing here panics on bad
//! numbers.
use crate::{
    counting::core::{
        emission::{StateMoments, state_moments},
        params::{NUM_PARAMS, P_OFF, P_ON, Parameters},
        transition::{
            OccupancyWeights, build_occupancy_weights, create_transition_matrix,
            stationary_distribution, stationary_distribution_with_grad,
            transition_matrix_with_grad,
        },
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{Grad, LogLikelihood, Theta},
    },
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Likelihood model for a fixed candidate emitter count `y`.
///
/// Holds the occupancy weights for `y`, built once and reused by every
/// evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceModel {
    weights: OccupancyWeights,
}

impl TraceModel {
    pub fn new(y: usize) -> Self {
        Self { weights: build_occupancy_weights(y) }
    }

    pub fn y(&self) -> usize {
        self.weights.y
    }

    pub fn weights(&self) -> &OccupancyWeights {
        &self.weights
    }

    /// Transition matrix and stationary initial distribution for `(p_on, p_off)`.
    pub fn chain(&self, p_on: f64, p_off: f64) -> (Array2<f64>, Array1<f64>) {
        (
            create_transition_matrix(p_on, p_off, &self.weights),
            stationary_distribution(self.y(), p_on, p_off),
        )
    }

    /// `ℓ(θ)` for one trace.
    pub fn log_likelihood(&self, trace: ArrayView1<f64>, params: &Parameters) -> f64 {
        let (transition, initial) = self.chain(params.p_on, params.p_off);
        let states = state_moments(self.y(), params);
        forward_log_likelihood(trace, &states, transition.view(), initial.view())
    }

    /// `ℓ(θ)` and `∇ℓ(θ)` (index order of [`Parameters`]) for one trace.
    pub fn log_likelihood_and_grad(
        &self, trace: ArrayView1<f64>, params: &Parameters,
    ) -> (f64, [f64; NUM_PARAMS]) {
        let y = self.y();
        let n = y + 1;
        let chain = transition_matrix_with_grad(params.p_on, params.p_off, &self.weights);
        let init = stationary_distribution_with_grad(y, params.p_on, params.p_off);
        let states = state_moments(y, params);

        let mut alpha = vec![0.0; n];
        let mut d_alpha = vec![[0.0; NUM_PARAMS]; n];
        let mut u = vec![0.0; n];
        let mut du = vec![[0.0; NUM_PARAMS]; n];
        let mut le = vec![0.0; n];
        let mut dle = vec![[0.0; NUM_PARAMS]; n];
        let mut a = vec![0.0; n];
        let mut da = vec![[0.0; NUM_PARAMS]; n];

        let mut ll = 0.0;
        let mut grad = [0.0; NUM_PARAMS];

        for (t, &x) in trace.iter().enumerate() {
            if t == 0 {
                for j in 0..n {
                    u[j] = init.probs[j];
                    du[j] = [0.0; NUM_PARAMS];
                    du[j][P_ON] = init.d_p_on[j];
                    du[j][P_OFF] = init.d_p_off[j];
                }
            } else {
                for j in 0..n {
                    let mut uj = 0.0;
                    let mut duj = [0.0; NUM_PARAMS];
                    for i in 0..n {
                        let pij = chain.matrix[[i, j]];
                        uj += alpha[i] * pij;
                        for p in 0..NUM_PARAMS {
                            duj[p] += d_alpha[i][p] * pij;
                        }
                        duj[P_ON] += alpha[i] * chain.d_p_on[[i, j]];
                        duj[P_OFF] += alpha[i] * chain.d_p_off[[i, j]];
                    }
                    u[j] = uj;
                    du[j] = duj;
                }
            }

            for k in 0..n {
                le[k] = states[k].log_density_with_grad(x, &mut dle[k]);
            }
            let m = reachable_max(&u, &le);

            let mut c = 0.0;
            let mut dc = [0.0; NUM_PARAMS];
            for k in 0..n {
                let e = (le[k] - m).exp();
                a[k] = u[k] * e;
                c += a[k];
                for p in 0..NUM_PARAMS {
                    da[k][p] = du[k][p] * e + a[k] * dle[k][p];
                    dc[p] += da[k][p];
                }
            }
            if c <= 0.0 {
                return (f64::NEG_INFINITY, [f64::NAN; NUM_PARAMS]);
            }

            ll += m + c.ln();
            for p in 0..NUM_PARAMS {
                grad[p] += dc[p] / c;
            }
            for k in 0..n {
                alpha[k] = a[k] / c;
                for p in 0..NUM_PARAMS {
                    d_alpha[k][p] = (da[k][p] - alpha[k] * dc[p]) / c;
                }
            }
        }
        (ll, grad)
    }
}

/// Largest log emission among states with positive predicted mass.
fn reachable_max(u: &[f64], le: &[f64]) -> f64 {
    let m = u
        .iter()
        .zip(le)
        .filter(|&(&uk, _)| uk > 0.0)
        .map(|(_, &l)| l)
        .fold(f64::NEG_INFINITY, f64::max);
    if m.is_finite() { m } else { 0.0 }
}

/// Scaled forward recursion with a precomputed chain (value only).
pub fn forward_log_likelihood(
    trace: ArrayView1<f64>, states: &[StateMoments], transition: ArrayView2<f64>,
    initial: ArrayView1<f64>,
) -> f64 {
    let n = states.len();
    let mut alpha = vec![0.0; n];
    let mut u = initial.to_vec();
    let mut le = vec![0.0; n];
    let mut ll = 0.0;

    for (t, &x) in trace.iter().enumerate() {
        if t > 0 {
            for j in 0..n {
                u[j] = (0..n).map(|i| alpha[i] * transition[[i, j]]).sum();
            }
        }
        for k in 0..n {
            le[k] = states[k].log_density(x);
        }
        let m = reachable_max(&u, &le);
        let mut c = 0.0;
        for k in 0..n {
            alpha[k] = u[k] * (le[k] - m).exp();
            c += alpha[k];
        }
        if c <= 0.0 {
            return f64::NEG_INFINITY;
        }
        ll += m + c.ln();
        for v in alpha.iter_mut() {
            *v /= c;
        }
    }
    ll
}

/// Log-likelihood of `trace` under `y` emitters and `params`.
pub fn trace_log_likelihood(trace: ArrayView1<f64>, y: usize, params: &Parameters) -> f64 {
    TraceModel::new(y).log_likelihood(trace, params)
}

/// Log-likelihood and gradient of `trace` under `y` emitters and `params`.
pub fn trace_log_likelihood_and_grad(
    trace: ArrayView1<f64>, y: usize, params: &Parameters,
) -> (f64, Array1<f64>) {
    let (ll, grad) = TraceModel::new(y).log_likelihood_and_grad(trace, params);
    (ll, Array1::from(grad.to_vec()))
}

/// Model-space parameters from an optimizer vector.
fn params_from_theta(theta: &Theta) -> OptResult<Parameters> {
    if theta.len() != NUM_PARAMS {
        return Err(OptError::ThetaLengthMismatch { expected: NUM_PARAMS, actual: theta.len() });
    }
    Ok(Parameters::from_view_unchecked(theta.view()))
}

impl LogLikelihood for TraceModel {
    type Data = Array1<f64>;

    /// `θ` is the model-space parameter vector in index order.
    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<f64> {
        Ok(self.log_likelihood(data.view(), &params_from_theta(theta)?))
    }

    fn check(&self, theta: &Theta, _data: &Self::Data) -> OptResult<()> {
        let params = params_from_theta(theta)?;
        if let Some(index) = theta.iter().position(|v| !v.is_finite()) {
            return Err(OptError::InvalidThetaInput { index, value: theta[index] });
        }
        params.validate().map_err(|e| OptError::InvalidParameter { text: e.to_string() })
    }

    fn grad(&self, theta: &Theta, data: &Self::Data) -> OptResult<Grad> {
        let (_, grad) = self.log_likelihood_and_grad(data.view(), &params_from_theta(theta)?);
        Ok(Array1::from(grad.to_vec()))
    }
}
