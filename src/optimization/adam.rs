//! Batched Adam optimizer.
//!
//! Many independent problems of the same dimension are advanced in lock-step:
//! parameters, gradients and both moment estimates are stored as
//! `[batch, candidates, dim]` arrays and every `(batch, candidate)` lane is
//! updated in parallel. The step counter, and therefore the bias
//! correction, is shared by all lanes.
//!
//! Each coordinate has its own learning rate. A rate of zero freezes that
//! coordinate. Lanes flagged inactive (for instance because their gradient
//! was not finite) keep both their parameters and their moments unchanged.
use crate::optimization::errors::{OptError, OptResult};
use ndarray::{Array1, Array3, ArrayView2, ArrayView3, Axis, Zip};

/// Adam hyper-parameters other than the learning rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self { beta1: 0.9, beta2: 0.999, eps: 1e-8 }
    }
}

#[derive(Debug, Clone)]
pub struct BatchAdam {
    config: AdamConfig,
    learning_rates: Array1<f64>,
    m: Array3<f64>,
    v: Array3<f64>,
    t: i32,
}

impl BatchAdam {
    /// Fresh optimizer state for a `shape = (batch, candidates, dim)` batch.
    ///
    /// # Errors
    /// - [`OptError::GradientDimMismatch`] if `learning_rates.len() != dim`.
    /// - [`OptError::InvalidLearningRate`] for a negative or non-finite rate.
    pub fn new(
        shape: (usize, usize, usize), learning_rates: Array1<f64>, config: AdamConfig,
    ) -> OptResult<Self> {
        if learning_rates.len() != shape.2 {
            return Err(OptError::GradientDimMismatch {
                expected: shape.2,
                found: learning_rates.len(),
            });
        }
        for (index, &value) in learning_rates.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(OptError::InvalidLearningRate {
                    index,
                    value,
                    reason: "Learning rates must be finite and non-negative.",
                });
            }
        }
        Ok(Self { config, learning_rates, m: Array3::zeros(shape), v: Array3::zeros(shape), t: 0 })
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> usize {
        self.t as usize
    }

    /// One descent step on the loss whose gradient is `grads`.
    ///
    /// # Errors
    /// [`OptError::StateShapeMismatch`] if `params`, `grads` or `active` do
    /// not match the shape the optimizer was built for.
    pub fn step(
        &mut self, params: &mut Array3<f64>, grads: ArrayView3<f64>, active: ArrayView2<bool>,
    ) -> OptResult<()> {
        let expected = self.m.dim();
        for found in [params.dim(), grads.dim(), (active.nrows(), active.ncols(), expected.2)] {
            if found != expected {
                return Err(OptError::StateShapeMismatch { expected, found });
            }
        }

        self.t += 1;
        let AdamConfig { beta1, beta2, eps } = self.config;
        let bc1 = 1.0 - beta1.powi(self.t);
        let bc2 = 1.0 - beta2.powi(self.t);
        let lr = &self.learning_rates;

        Zip::from(params.lanes_mut(Axis(2)))
            .and(self.m.lanes_mut(Axis(2)))
            .and(self.v.lanes_mut(Axis(2)))
            .and(grads.lanes(Axis(2)))
            .and(&active)
            .par_for_each(|mut p, mut m, mut v, g, &on| {
                if !on {
                    return;
                }
                for k in 0..p.len() {
                    if lr[k] == 0.0 {
                        continue;
                    }
                    m[k] = beta1 * m[k] + (1.0 - beta1) * g[k];
                    v[k] = beta2 * v[k] + (1.0 - beta2) * g[k] * g[k];
                    let m_hat = m[k] / bc1;
                    let v_hat = v[k] / bc2;
                    p[k] -= lr[k] * m_hat / (v_hat.sqrt() + eps);
                }
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    #[test]
    // Purpose
    // -------
    // The first Adam step moves each free coordinate by exactly its learning
    // rate against the sign of the gradient.
    //
    // Given
    // -----
    // One lane, gradient (2, -0.5, 3), learning rates (0.1, 0.2, 0).
    //
    // Expect
    // ------
    // Parameters move by (-0.1, +0.2, 0) up to the ε term.
    fn first_step_moves_by_learning_rate() {
        let mut adam = BatchAdam::new((1, 1, 3), array![0.1, 0.2, 0.0], AdamConfig::default())
            .unwrap();
        let mut params = Array3::<f64>::zeros((1, 1, 3));
        let grads = array![[[2.0, -0.5, 3.0]]];
        let active = Array2::from_elem((1, 1), true);

        adam.step(&mut params, grads.view(), active.view()).unwrap();

        assert_abs_diff_eq!(params[[0, 0, 0]], -0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(params[[0, 0, 1]], 0.2, epsilon = 1e-6);
        assert_eq!(params[[0, 0, 2]], 0.0);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    // Purpose
    // -------
    // Inactive lanes are left untouched while their neighbours advance.
    fn inactive_lanes_are_frozen() {
        let mut adam =
            BatchAdam::new((1, 2, 1), array![0.5], AdamConfig::default()).unwrap();
        let mut params = array![[[1.0], [1.0]]];
        let grads = array![[[1.0], [1.0]]];
        let active = array![[true, false]];

        adam.step(&mut params, grads.view(), active.view()).unwrap();

        assert!(params[[0, 0, 0]] < 1.0);
        assert_eq!(params[[0, 1, 0]], 1.0);
    }

    #[test]
    // Purpose
    // -------
    // Repeated steps drive a batch of quadratics to their minima.
    fn converges_on_independent_quadratics() {
        let targets = array![[[3.0, -1.0]], [[0.5, 2.0]]];
        let mut params = Array3::<f64>::zeros((2, 1, 2));
        let mut adam =
            BatchAdam::new((2, 1, 2), array![0.05, 0.05], AdamConfig::default()).unwrap();
        let active = Array2::from_elem((2, 1), true);

        for _ in 0..3000 {
            let grads = 2.0 * (&params - &targets);
            adam.step(&mut params, grads.view(), active.view()).unwrap();
        }

        for (p, t) in params.iter().zip(targets.iter()) {
            assert_abs_diff_eq!(p, t, epsilon = 1e-2);
        }
    }

    #[test]
    // Purpose
    // -------
    // Construction rejects bad learning rates and stepping rejects
    // mismatched shapes.
    fn rejects_invalid_rates_and_shapes() {
        assert!(matches!(
            BatchAdam::new((1, 1, 2), array![0.1, -1.0], AdamConfig::default()),
            Err(OptError::InvalidLearningRate { index: 1, .. })
        ));
        let mut adam = BatchAdam::new((1, 1, 2), array![0.1, 0.1], AdamConfig::default()).unwrap();
        let mut params = Array3::<f64>::zeros((1, 2, 2));
        let grads = Array3::<f64>::zeros((1, 2, 2));
        let active = Array2::from_elem((1, 2), true);
        assert!(matches!(
            adam.step(&mut params, grads.view(), active.view()),
            Err(OptError::StateShapeMismatch { .. })
        ));
    }
}
