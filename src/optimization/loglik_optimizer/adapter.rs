//! Bridge from a [`LogLikelihood`] to argmin's `CostFunction` and `Gradient`.
//!
//! argmin minimizes, so the adapter exposes `c(θ) = -ℓ(θ)` and `-∇ℓ(θ)`.
//! Problems without an analytic gradient are differentiated numerically on
//! the cost itself: central differences first, forward differences if a
//! central probe fails or produces a non-finite component.
use std::cell::RefCell;

use crate::optimization::{
    errors::OptError,
    loglik_optimizer::{
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// Borrowing view of a likelihood problem and its data, as seen by argmin.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }

    /// Numerical gradient of the cost.
    ///
    /// The finite-difference closure must return a bare `f64`, so the first
    /// failure is parked in `first_err` and the probe evaluates to `NaN`.
    fn numerical_gradient(&self, theta: &Theta) -> Result<Grad, Error> {
        let first_err: RefCell<Option<Error>> = RefCell::new(None);
        let cost = |t: &Theta| -> f64 {
            self.cost(t).unwrap_or_else(|e| {
                first_err.borrow_mut().get_or_insert(e);
                f64::NAN
            })
        };

        let central = theta.central_diff(&cost);
        if first_err.borrow().is_none() && validate_grad(&central, theta.len()).is_ok() {
            return Ok(central);
        }

        first_err.replace(None);
        let forward = theta.forward_diff(&cost);
        if let Some(err) = first_err.take() {
            return Err(err);
        }
        validate_grad(&forward, theta.len())?;
        Ok(forward)
    }
}

impl<'a, F: LogLikelihood> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let value = self.f.value(theta, self.data)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value }.into());
        }
        Ok(-value)
    }
}

impl<'a, F: LogLikelihood> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => self.numerical_gradient(theta),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptResult;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// ℓ(θ) = -Σ (θ_i - c_i)², with or without an analytic gradient.
    struct Paraboloid {
        analytic: bool,
    }

    impl LogLikelihood for Paraboloid {
        type Data = Theta;

        fn value(&self, theta: &Theta, data: &Theta) -> OptResult<f64> {
            Ok(-(theta - data).mapv(|d| d * d).sum())
        }

        fn check(&self, _theta: &Theta, _data: &Theta) -> OptResult<()> {
            Ok(())
        }

        fn grad(&self, theta: &Theta, data: &Theta) -> OptResult<Grad> {
            if self.analytic {
                Ok((theta - data).mapv(|d| -2.0 * d))
            } else {
                Err(OptError::GradientNotImplemented)
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Cost and gradient are the negated log-likelihood and its gradient.
    //
    // Expect
    // ------
    // Analytic and numerical gradients agree on the cost surface.
    fn adapter_negates_value_and_gradient() {
        let centre = array![1.0, -2.0];
        let theta = array![0.5, 0.5];
        let analytic = Paraboloid { analytic: true };
        let numeric = Paraboloid { analytic: false };

        let a = ArgMinAdapter::new(&analytic, &centre);
        let n = ArgMinAdapter::new(&numeric, &centre);

        assert_abs_diff_eq!(a.cost(&theta).unwrap(), 0.25 + 6.25, epsilon = 1e-12);
        let ga = a.gradient(&theta).unwrap();
        let gn = n.gradient(&theta).unwrap();
        assert_abs_diff_eq!(ga[0], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ga[1], 5.0, epsilon = 1e-12);
        for i in 0..2 {
            assert_abs_diff_eq!(ga[i], gn[i], epsilon = 1e-5);
        }
    }
}
