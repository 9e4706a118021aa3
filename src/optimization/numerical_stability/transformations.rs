//! Numerically stable scalar transforms.
//!
//! - [`safe_logistic`]: `1 / (1 + e^{-z})` without overflow in either tail.
//! - [`safe_logit`]: inverse of the logistic, clamped away from {0, 1}.
//! - [`to_bounded`] / [`from_bounded`]: map between ℝ and an open interval
//!   `(lo, hi)` through the logistic, plus the derivative
//!   [`to_bounded_deriv`] for the chain rule.
//!
//! These let a box-constrained problem be handed to an unconstrained
//! solver. All functions are pure and allocation-free.

/// Smallest distance kept between a probability and {0, 1} before taking a
/// logit.
pub const LOGIT_EPS: f64 = 1e-12;

/// Stable logistic function.
pub fn safe_logistic(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Logit of `p`, with `p` clamped to `[LOGIT_EPS, 1 - LOGIT_EPS]`.
pub fn safe_logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    p.ln() - (-p).ln_1p()
}

/// `lo + (hi - lo) · σ(z)`.
pub fn to_bounded(z: f64, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * safe_logistic(z)
}

/// Inverse of [`to_bounded`]. Values at or beyond the bounds map to a large
/// finite `z`.
pub fn from_bounded(x: f64, lo: f64, hi: f64) -> f64 {
    safe_logit((x - lo) / (hi - lo))
}

/// `d/dz to_bounded(z, lo, hi) = (hi - lo) · σ(z) · (1 - σ(z))`.
pub fn to_bounded_deriv(z: f64, lo: f64, hi: f64) -> f64 {
    let s = safe_logistic(z);
    (hi - lo) * s * (1.0 - s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    // Purpose
    // -------
    // The stable logistic matches the naive formula and saturates cleanly.
    fn logistic_matches_naive_and_saturates() {
        for z in [-5.0, -0.3, 0.0, 1.7, 8.0] {
            let naive = 1.0 / (1.0 + f64::exp(-z));
            assert_abs_diff_eq!(safe_logistic(z), naive, epsilon = 1e-15);
        }
        assert_eq!(safe_logistic(-800.0), 0.0);
        assert_eq!(safe_logistic(800.0), 1.0);
    }

    #[test]
    // Purpose
    // -------
    // `from_bounded` inverts `to_bounded` inside the interval and stays finite
    // at the edges.
    fn bounded_transform_inverts_inside_interval() {
        let (lo, hi) = (10.0, 250.0);
        for x in [10.5, 80.0, 249.0] {
            assert_abs_diff_eq!(to_bounded(from_bounded(x, lo, hi), lo, hi), x, epsilon = 1e-9);
        }
        assert!(from_bounded(lo, lo, hi).is_finite());
        assert!(from_bounded(hi + 1.0, lo, hi).is_finite());
    }

    #[test]
    // Purpose
    // -------
    // The analytic derivative agrees with a central difference.
    fn bounded_derivative_matches_central_difference() {
        let (lo, hi, h) = (-2.0, 3.0, 1e-6);
        for z in [-3.0, 0.0, 0.8] {
            let fd = (to_bounded(z + h, lo, hi) - to_bounded(z - h, lo, hi)) / (2.0 * h);
            assert_abs_diff_eq!(to_bounded_deriv(z, lo, hi), fd, epsilon = 1e-7);
        }
    }
}
