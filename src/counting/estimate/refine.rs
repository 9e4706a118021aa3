//! Batched multi-restart refinement.
//!
//! Purpose
//! -------
//! Starting from the grid guesses, run gradient ascent on the trace
//! log-likelihood for every `(trace, restart)` pair in lock-step, stop the
//! whole batch together when the convergence detector fires, and keep per
//! trace the best parameters any restart reached.
//!
//! Key behaviors
//! -------------
//! - The optimized objective is the loss `−ℓ`; everything reported is `ℓ`.
//! - Adam with two learning-rate groups: switching probabilities use
//!   `learning_rate`, intensities use `intensity_learning_rate`.
//! - After every step each parameter is projected into its range; fixed
//!   parameters (degenerate ranges) never move.
//! - Items whose value or gradient is not finite are not updated in that
//!   step; their value still enters the convergence history.
//! - Every item tracks its best-so-far `(ℓ, θ)`, so an item that wanders
//!   off never loses a better point it already visited.
//!
//! Invariants & assumptions
//! ------------------------
//! - `guesses` is `[n_traces, n_guesses, NUM_PARAMS]` and `traces` has
//!   `n_traces` rows.
//! - Configuration has been validated by the caller.
use crate::counting::{
    core::{
        options::HyperParameters,
        params::{NUM_PARAMS, Parameters},
        ranges::ParameterRanges,
    },
    errors::{CountError, CountResult},
    estimate::convergence::LikelihoodHistory,
    models::trace_model::TraceModel,
};
use crate::optimization::adam::{AdamConfig, BatchAdam};
use log::{debug, warn};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis, Zip, s};

/// Best result per trace after refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineOutcome {
    /// `[n_traces, NUM_PARAMS]`.
    pub parameters: Array2<f64>,
    /// `[n_traces]`.
    pub log_likelihoods: Array1<f64>,
    /// Iterations actually run.
    pub iterations: usize,
    /// Whether the convergence detector stopped the loop.
    pub converged: bool,
}

/// Values, loss gradients and update flags for the whole batch.
fn evaluate(
    traces: ArrayView2<f64>, model: &TraceModel, params: &Array3<f64>,
) -> (Array2<f64>, Array3<f64>, Array2<bool>) {
    let (n, g, _) = params.dim();
    let mut values = Array2::<f64>::zeros((n, g));
    let mut grads = Array3::<f64>::zeros((n, g, NUM_PARAMS));
    let mut active = Array2::from_elem((n, g), false);

    Zip::indexed(&mut values)
        .and(grads.lanes_mut(Axis(2)))
        .and(&mut active)
        .and(params.lanes(Axis(2)))
        .par_for_each(|(trace, _), value, mut grad, on, theta| {
            let point = Parameters::from_view_unchecked(theta);
            let (ll, dll) = model.log_likelihood_and_grad(traces.row(trace), &point);
            *value = ll;
            *on = ll.is_finite() && dll.iter().all(|d| d.is_finite());
            if *on {
                for (g, d) in grad.iter_mut().zip(dll) {
                    *g = -d;
                }
            }
        });
    (values, grads, active)
}

/// Fold the latest evaluation into the per-item best-so-far.
fn keep_best(
    best_ll: &mut Array2<f64>, best_params: &mut Array3<f64>, values: &Array2<f64>,
    params: &Array3<f64>,
) {
    Zip::from(best_ll)
        .and(best_params.lanes_mut(Axis(2)))
        .and(values)
        .and(params.lanes(Axis(2)))
        .for_each(|best, mut best_theta, &value, theta| {
            if value > *best {
                *best = value;
                best_theta.assign(&theta);
            }
        });
}

/// Refine `guesses` for every trace under `model` and return the best
/// restart per trace.
///
/// Errors
/// ------
/// - `CountError::ShapeMismatch` if `guesses` does not match `traces`.
/// - `CountError::OptimizationFailed` if the optimizer rejects its setup.
pub fn refine(
    traces: ArrayView2<f64>, model: &TraceModel, guesses: Array3<f64>, ranges: &ParameterRanges,
    hyper: &HyperParameters,
) -> CountResult<RefineOutcome> {
    let (n, g, k) = guesses.dim();
    if n != traces.nrows() || k != NUM_PARAMS || g == 0 {
        return Err(CountError::ShapeMismatch {
            what: "initial guesses",
            expected: vec![traces.nrows(), g.max(1), NUM_PARAMS],
            found: vec![n, g, k],
        });
    }

    let mut params = guesses;
    for mut lane in params.lanes_mut(Axis(2)) {
        ranges.project(&mut lane);
    }
    let mut adam =
        BatchAdam::new((n, g, k), hyper.learning_rates(ranges), AdamConfig::default())?;
    let mut history = LikelihoodHistory::new(hyper.is_done_window);
    let mut best_ll = Array2::from_elem((n, g), f64::NEG_INFINITY);
    let mut best_params = params.clone();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < hyper.epoch_length {
        let (values, grads, active) = evaluate(traces, model, &params);
        keep_best(&mut best_ll, &mut best_params, &values, &params);
        history.push(values);

        adam.step(&mut params, grads.view(), active.view())?;
        for mut lane in params.lanes_mut(Axis(2)) {
            ranges.project(&mut lane);
        }
        iterations += 1;

        if history.is_done(hyper.is_done_limit) {
            converged = true;
            break;
        }
    }
    let (values, _, _) = evaluate(traces, model, &params);
    keep_best(&mut best_ll, &mut best_params, &values, &params);

    if converged {
        debug!("y = {}: refinement converged after {iterations} iterations", model.y());
    } else {
        warn!(
            "y = {}: refinement did not converge within {} iterations; returning best so far",
            model.y(),
            hyper.epoch_length
        );
    }

    let mut parameters = Array2::<f64>::zeros((n, NUM_PARAMS));
    let mut log_likelihoods = Array1::<f64>::from_elem(n, f64::NEG_INFINITY);
    for trace in 0..n {
        let row = best_ll.row(trace);
        let winner = (0..g).fold(0, |w, i| if row[i] > row[w] { i } else { w });
        log_likelihoods[trace] = row[winner];
        parameters.row_mut(trace).assign(&best_params.slice(s![trace, winner, ..]));
    }

    Ok(RefineOutcome { parameters, log_likelihoods, iterations, converged })
}
