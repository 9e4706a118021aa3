//! Convergence detector for lock-step refinement.
//!
//! The refiner pushes the `[n_traces, n_guesses]` log-likelihoods of every
//! iteration into a [`LikelihoodHistory`] of fixed capacity `W`. Once the
//! window is full, the batch is considered converged when the relative
//! improvement
//!
//! `|mean(Δ history)| / |mean(history)|`
//!
//! falls below the configured limit, where `Δ` is the step-to-step change
//! along the iteration axis and both means run over the whole batch. A `NaN`
//! ratio (for instance a history of exact zeros, or a non-finite
//! likelihood anywhere in the batch) also counts as converged, so a
//! degenerate item can never keep the loop alive.
use ndarray::Array2;
use std::collections::VecDeque;

/// Sliding window of per-iteration batch log-likelihoods.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodHistory {
    window: usize,
    entries: VecDeque<Array2<f64>>,
}

impl LikelihoodHistory {
    pub fn new(window: usize) -> Self {
        Self { window, entries: VecDeque::with_capacity(window) }
    }

    /// Append the latest batch, evicting the oldest one when full.
    pub fn push(&mut self, log_likelihoods: Array2<f64>) {
        if self.entries.len() == self.window {
            self.entries.pop_front();
        }
        self.entries.push_back(log_likelihoods);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `|mean(Δ)| / |mean|` over the current window, `None` before it is full.
    pub fn relative_improvement(&self) -> Option<f64> {
        if self.entries.len() < self.window {
            return None;
        }
        let (sum, count) = self
            .entries
            .iter()
            .fold((0.0, 0usize), |(s, c), e| (s + e.sum(), c + e.len()));
        let mean_value = (sum / count as f64).abs();

        let (delta_sum, delta_count) = self
            .entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .fold((0.0, 0usize), |(s, c), (prev, next)| (s + (next - prev).sum(), c + next.len()));
        let mean_delta = (delta_sum / delta_count as f64).abs();

        Some(mean_delta / mean_value)
    }

    /// Whether the whole batch has stopped improving.
    pub fn is_done(&self, limit: f64) -> bool {
        match self.relative_improvement() {
            None => false,
            Some(ratio) => ratio.is_nan() || ratio < limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn filled(values: &[f64]) -> LikelihoodHistory {
        let mut history = LikelihoodHistory::new(values.len());
        for &v in values {
            history.push(array![[v, v]]);
        }
        history
    }

    #[test]
    // Purpose
    // -------
    // A full window of identical values has zero change and is done.
    fn identical_values_are_done() {
        assert!(filled(&[-120.0; 5]).is_done(1e-5));
    }

    #[test]
    // Purpose
    // -------
    // Fewer than `W` entries is never done, whatever the values.
    fn short_history_is_not_done() {
        let mut history = LikelihoodHistory::new(4);
        for _ in 0..3 {
            history.push(array![[-10.0]]);
        }

        assert!(!history.is_done(1.0));
        assert_eq!(history.relative_improvement(), None);
    }

    #[test]
    // Purpose
    // -------
    // A history of exact zeros gives a NaN ratio, which stops the loop.
    fn nan_ratio_is_done() {
        let history = filled(&[0.0; 3]);

        assert!(history.relative_improvement().unwrap().is_nan());
        assert!(history.is_done(1e-5));
    }

    #[test]
    // Purpose
    // -------
    // Steady improvement is measured relative to the mean magnitude, and
    // the window slides.
    //
    // Given
    // -----
    // Values -100, -90, -80 (after evicting -110): mean -90, mean Δ 10.
    fn improving_history_is_not_done() {
        let mut history = LikelihoodHistory::new(3);
        for v in [-110.0, -100.0, -90.0, -80.0] {
            history.push(array![[v]]);
        }

        assert_eq!(history.len(), 3);
        assert_abs_diff_eq!(history.relative_improvement().unwrap(), 10.0 / 90.0, epsilon = 1e-12);
        assert!(!history.is_done(1e-2));
        assert!(history.is_done(0.2));
    }
}
