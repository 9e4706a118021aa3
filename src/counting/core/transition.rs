//! Occupancy chain for `y` independently blinking emitters.
//!
//! Purpose
//! -------
//! Build the Markov chain over occupancy states `k = 0..=y` (number of
//! emitters currently "on"): its combinatorial weights, its row-stochastic
//! transition matrix for given `(p_on, p_off)`, and its initial
//! distribution, together with derivatives with respect to `p_on` and
//! `p_off` for gradient-based fitting.
//!
//! Key behaviors
//! -------------
//! - [`build_occupancy_weights`] tabulates the binomial coefficients once
//!   per `y`: the straight table `C(i, a)` counts ways for `a` of `i` "on"
//!   emitters to switch off, the slanted table `C(y − i, b)` counts ways for
//!   `b` of the `y − i` "off" emitters to switch on.
//! - [`create_transition_matrix`] sums, for each `(i, j)`, over all `a` with
//!   `b = j − i + a`:
//!   `C(i,a)·C(y−i,b)·p_off^a·(1−p_off)^(i−a)·p_on^b·(1−p_on)^(y−i−b)`,
//!   then renormalizes each row.
//! - [`stationary_distribution`] is the closed form `Binomial(y, q)` with
//!   `q = p_on / (p_on + p_off)`; [`initial_distribution`] solves for the
//!   left fixed point of an arbitrary matrix and agrees with it.
//!
//! Invariants & assumptions
//! ------------------------
//! - Probabilities are clamped to `[PROB_EPS, 1 − PROB_EPS]` before use, so
//!   `p_on`/`p_off` of exactly 0 or 1 never produce `NaN`. Derivatives are
//!   zero where the clamp is active.
//! - Rows of every produced matrix sum to one and entries lie in `[0, 1]`.
//!
//! Testing notes
//! -------------
//! Unit tests check row sums, the fixed-point property, agreement of the
//! closed form with the linear solve, boundary probabilities, and analytic
//! derivatives against finite differences.
use crate::counting::errors::{CountError, CountResult};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView2};
use statrs::function::factorial::binomial;

/// Distance kept between switching probabilities and {0, 1}.
pub const PROB_EPS: f64 = 1e-9;

/// Binomial weights of the occupancy chain for one emitter count `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyWeights {
    pub y: usize,
    /// `straight[[i, a]] = C(i, a)`, zero for `a > i`.
    pub straight: Array2<f64>,
    /// `slanted[[i, b]] = C(y − i, b)`, zero for `b > y − i`.
    pub slanted: Array2<f64>,
}

/// Tabulate the occupancy weights for `y` emitters.
pub fn build_occupancy_weights(y: usize) -> OccupancyWeights {
    let n = y + 1;
    let straight =
        Array2::from_shape_fn((n, n), |(i, a)| if a <= i { choose(i, a) } else { 0.0 });
    let slanted =
        Array2::from_shape_fn((n, n), |(i, b)| if b <= y - i { choose(y - i, b) } else { 0.0 });
    OccupancyWeights { y, straight, slanted }
}

fn choose(n: usize, k: usize) -> f64 {
    binomial(n as u64, k as u64)
}

/// Clamp a probability and report whether it moved freely.
fn clamp_prob(p: f64) -> (f64, f64) {
    let c = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
    let slope = if p > PROB_EPS && p < 1.0 - PROB_EPS { 1.0 } else { 0.0 };
    (c, slope)
}

/// `p^s · (1 − p)^f` and its derivative in `p`.
fn bernoulli_term(p: f64, s: usize, f: usize) -> (f64, f64) {
    let q = 1.0 - p;
    let ps = p.powi(s as i32);
    let qf = q.powi(f as i32);
    let mut d = 0.0;
    if s > 0 {
        d += s as f64 * p.powi(s as i32 - 1) * qf;
    }
    if f > 0 {
        d -= f as f64 * ps * q.powi(f as i32 - 1);
    }
    (ps * qf, d)
}

/// Transition matrix and its partial derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionWithGrad {
    pub matrix: Array2<f64>,
    pub d_p_on: Array2<f64>,
    pub d_p_off: Array2<f64>,
}

/// Row-stochastic transition matrix for `weights.y` emitters.
///
/// Entry `(i, j)` is the probability of moving from `i` to `j` emitters "on"
/// in one step.
pub fn create_transition_matrix(p_on: f64, p_off: f64, weights: &OccupancyWeights) -> Array2<f64> {
    transition_matrix_with_grad(p_on, p_off, weights).matrix
}

/// [`create_transition_matrix`] plus `∂P/∂p_on` and `∂P/∂p_off`.
pub fn transition_matrix_with_grad(
    p_on: f64, p_off: f64, weights: &OccupancyWeights,
) -> TransitionWithGrad {
    let y = weights.y;
    let n = y + 1;
    let (p_on, on_slope) = clamp_prob(p_on);
    let (p_off, off_slope) = clamp_prob(p_off);

    let mut matrix = Array2::<f64>::zeros((n, n));
    let mut d_p_on = Array2::<f64>::zeros((n, n));
    let mut d_p_off = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        let off_count = y - i;
        for j in 0..n {
            let (mut v, mut d_on, mut d_off) = (0.0, 0.0, 0.0);
            // a emitters switch off, b = j - i + a switch on
            for a in i.saturating_sub(j)..=i {
                let b = j + a - i;
                if b > off_count {
                    break;
                }
                let w = weights.straight[[i, a]] * weights.slanted[[i, b]];
                let (off_v, off_d) = bernoulli_term(p_off, a, i - a);
                let (on_v, on_d) = bernoulli_term(p_on, b, off_count - b);
                v += w * off_v * on_v;
                d_on += w * off_v * on_d;
                d_off += w * off_d * on_v;
            }
            matrix[[i, j]] = v;
            d_p_on[[i, j]] = d_on * on_slope;
            d_p_off[[i, j]] = d_off * off_slope;
        }

        let total: f64 = matrix.row(i).sum();
        let d_total_on: f64 = d_p_on.row(i).sum();
        let d_total_off: f64 = d_p_off.row(i).sum();
        for j in 0..n {
            let p = matrix[[i, j]] / total;
            matrix[[i, j]] = p;
            d_p_on[[i, j]] = (d_p_on[[i, j]] - p * d_total_on) / total;
            d_p_off[[i, j]] = (d_p_off[[i, j]] - p * d_total_off) / total;
        }
    }

    TransitionWithGrad { matrix, d_p_on, d_p_off }
}

/// Initial distribution and its partial derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialWithGrad {
    pub probs: Array1<f64>,
    pub d_p_on: Array1<f64>,
    pub d_p_off: Array1<f64>,
}

/// Closed-form stationary distribution `Binomial(y, p_on / (p_on + p_off))`.
pub fn stationary_distribution(y: usize, p_on: f64, p_off: f64) -> Array1<f64> {
    stationary_distribution_with_grad(y, p_on, p_off).probs
}

/// [`stationary_distribution`] plus `∂π/∂p_on` and `∂π/∂p_off`.
pub fn stationary_distribution_with_grad(y: usize, p_on: f64, p_off: f64) -> InitialWithGrad {
    let (p_on, on_slope) = clamp_prob(p_on);
    let (p_off, off_slope) = clamp_prob(p_off);
    let s = p_on + p_off;
    let q = p_on / s;
    let dq_on = p_off / (s * s) * on_slope;
    let dq_off = -p_on / (s * s) * off_slope;

    let mut probs = Array1::<f64>::zeros(y + 1);
    let mut d_p_on = Array1::<f64>::zeros(y + 1);
    let mut d_p_off = Array1::<f64>::zeros(y + 1);
    for k in 0..=y {
        let c = choose(y, k);
        let (v, dv) = bernoulli_term(q, k, y - k);
        probs[k] = c * v;
        d_p_on[k] = c * dv * dq_on;
        d_p_off[k] = c * dv * dq_off;
    }
    InitialWithGrad { probs, d_p_on, d_p_off }
}

/// Stationary distribution of an arbitrary `(y+1) × (y+1)` transition
/// matrix, found by solving `π (P − I) = 0` with `Σ π = 1`.
///
/// Errors
/// ------
/// - `CountError::ShapeMismatch` if the matrix is not `(y+1) × (y+1)`.
/// - `CountError::SingularTransition` if the linear system has no unique
///   solution (e.g. a reducible chain).
pub fn initial_distribution(y: usize, transition: ArrayView2<f64>) -> CountResult<Array1<f64>> {
    let n = y + 1;
    if transition.dim() != (n, n) {
        return Err(CountError::ShapeMismatch {
            what: "transition matrix",
            expected: vec![n, n],
            found: transition.shape().to_vec(),
        });
    }
    // Rows of (Pᵀ − I), with the last equation replaced by the normalization.
    let system = DMatrix::from_fn(n, n, |r, c| {
        if r == n - 1 {
            1.0
        } else {
            transition[[c, r]] - if r == c { 1.0 } else { 0.0 }
        }
    });
    let mut rhs = DVector::<f64>::zeros(n);
    rhs[n - 1] = 1.0;

    let solution = system.lu().solve(&rhs).ok_or(CountError::SingularTransition { y })?;
    let mut probs = Array1::from_iter(solution.iter().map(|&v| v.max(0.0)));
    let total = probs.sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(CountError::SingularTransition { y });
    }
    probs /= total;
    Ok(probs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    // Purpose
    // -------
    // Rows sum to one and entries are probabilities for several `y`,
    // including boundary switching probabilities.
    fn rows_are_stochastic() {
        for y in 0..=5 {
            let weights = build_occupancy_weights(y);
            for (p_on, p_off) in [(0.3, 0.3), (0.01, 0.9), (0.0, 1.0), (1.0, 1.0)] {
                let p = create_transition_matrix(p_on, p_off, &weights);
                for row in p.rows() {
                    assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
                    assert!(row.iter().all(|&v| (0.0..=1.0).contains(&v) && v.is_finite()));
                }
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // A single emitter reduces to the two-state on/off chain.
    fn single_emitter_matches_two_state_chain() {
        let p = create_transition_matrix(0.2, 0.4, &build_occupancy_weights(1));

        assert_abs_diff_eq!(p[[0, 0]], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(p[[0, 1]], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(p[[1, 0]], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(p[[1, 1]], 0.6, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The closed-form distribution sums to one, is a left fixed point, and
    // matches the generic linear solve.
    fn stationary_is_left_fixed_point() {
        for y in 0..=4 {
            let weights = build_occupancy_weights(y);
            let p = create_transition_matrix(0.15, 0.35, &weights);
            let pi = stationary_distribution(y, 0.15, 0.35);

            assert_abs_diff_eq!(pi.sum(), 1.0, epsilon = 1e-12);
            let next = pi.dot(&p);
            for k in 0..=y {
                assert_abs_diff_eq!(next[k], pi[k], epsilon = 1e-12);
            }
            let solved = initial_distribution(y, p.view()).unwrap();
            for k in 0..=y {
                assert_abs_diff_eq!(solved[k], pi[k], epsilon = 1e-9);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Analytic derivatives match central differences.
    //
    // Given
    // -----
    // y = 3, (p_on, p_off) = (0.25, 0.4), step h = 1e-6.
    fn derivatives_match_finite_differences() {
        let weights = build_occupancy_weights(3);
        let (p_on, p_off, h) = (0.25, 0.4, 1e-6);
        let t = transition_matrix_with_grad(p_on, p_off, &weights);
        let init = stationary_distribution_with_grad(3, p_on, p_off);

        let fd_on = (create_transition_matrix(p_on + h, p_off, &weights)
            - create_transition_matrix(p_on - h, p_off, &weights))
            / (2.0 * h);
        let fd_off = (create_transition_matrix(p_on, p_off + h, &weights)
            - create_transition_matrix(p_on, p_off - h, &weights))
            / (2.0 * h);
        for (a, b) in t.d_p_on.iter().zip(fd_on.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
        for (a, b) in t.d_p_off.iter().zip(fd_off.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }

        let fd_pi_on = (stationary_distribution(3, p_on + h, p_off)
            - stationary_distribution(3, p_on - h, p_off))
            / (2.0 * h);
        for (a, b) in init.d_p_on.iter().zip(fd_pi_on.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    // Purpose
    // -------
    // The generic solver rejects matrices of the wrong size.
    fn initial_distribution_checks_shape() {
        let p = Array2::<f64>::eye(2);
        assert!(matches!(
            initial_distribution(3, p.view()),
            Err(CountError::ShapeMismatch { .. })
        ));
    }
}
