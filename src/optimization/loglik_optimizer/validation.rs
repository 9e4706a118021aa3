//! Validation helpers shared by the log-likelihood optimizer.
//!
//! - [`verify_tol_grad`], [`verify_tol_cost`]: optional tolerances must be
//!   finite and strictly positive.
//! - [`validate_grad`]: dimension and finiteness of a gradient.
//! - [`validate_theta_hat`]: presence and finiteness of a solver optimum.
//! - [`validate_value`]: finiteness of a log-likelihood value.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::types::{Grad, Theta},
};

/// Validate the optional gradient-norm tolerance.
///
/// # Errors
/// [`OptError::InvalidTolGrad`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional cost-change tolerance.
///
/// # Errors
/// [`OptError::InvalidTolCost`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate a gradient vector against the expected dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if `grad.len() != dim`.
/// - [`OptError::InvalidGradient`] for the first `NaN`/`±∞` entry.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    match grad.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidGradient {
            index,
            value: grad[index],
            reason: "Gradient elements must be finite.",
        }),
        None => Ok(()),
    }
}

/// Unwrap the best parameter vector reported by the solver.
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if the solver kept no parameters.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let theta = theta_hat.ok_or(OptError::MissingThetaHat)?;
    if let Some(index) = theta.iter().position(|v| !v.is_finite()) {
        return Err(OptError::InvalidThetaHat {
            index,
            value: theta[index],
            reason: "Parameter estimates must be finite.",
        });
    }
    Ok(theta)
}

/// Log-likelihood values may be any finite number.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Tolerances must be strictly positive; `None` disables the rule.
    fn tolerances_reject_non_positive_values() {
        assert!(verify_tol_grad(None).is_ok());
        assert!(verify_tol_grad(Some(1e-6)).is_ok());
        assert!(matches!(verify_tol_grad(Some(0.0)), Err(OptError::InvalidTolGrad { .. })));
        assert!(matches!(verify_tol_cost(Some(f64::NAN)), Err(OptError::InvalidTolCost { .. })));
    }

    #[test]
    // Purpose
    // -------
    // The first non-finite gradient entry is reported with its index.
    fn validate_grad_reports_first_non_finite_entry() {
        let grad = array![1.0, f64::NAN, f64::INFINITY];

        let err = validate_grad(&grad, 3).unwrap_err();

        match err {
            OptError::InvalidGradient { index, .. } => assert_eq!(index, 1),
            other => panic!("expected InvalidGradient, got {other:?}"),
        }
        assert!(matches!(validate_grad(&grad, 2), Err(OptError::GradientDimMismatch { .. })));
    }

    #[test]
    // Purpose
    // -------
    // A missing optimum is an error, a finite one is returned as-is.
    fn validate_theta_hat_requires_finite_vector() {
        assert_eq!(validate_theta_hat(None), Err(OptError::MissingThetaHat));
        let theta = validate_theta_hat(Some(array![0.5, -1.0])).unwrap();
        assert_eq!(theta, array![0.5, -1.0]);
    }
}
