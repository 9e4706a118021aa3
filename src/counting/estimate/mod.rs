//! estimate — maximum-likelihood fitting across candidate emitter counts.
//!
//! Purpose
//! -------
//! Drive the full estimation pipeline: for each candidate `y`, seed restarts
//! from a grid search, refine them in lock-step, optionally polish the
//! winners, then pick `y` per trace from the resulting likelihood table.
//!
//! Key behaviors
//! -------------
//! - Configuration (ranges, hyper-parameters, `y` range) is validated before
//!   any likelihood is evaluated.
//! - `max_x` defaults to the largest observed intensity and caps the emitter
//!   intensity range.
//! - Every candidate `y` in `min_y..=max_y` is estimated in full; the loop
//!   over `y` is sequential, each pass is data-parallel over traces and
//!   restarts.
//! - Non-convergence is reported through [`Estimate::converged`], never as
//!   an error.
//!
//! Downstream usage
//! ----------------
//! - [`estimate_y`] is the main entry point.
//! - [`estimate_parameters`] fits a single `y`.
//! - [`selection::select_y`] re-applies a different selection rule to an
//!   existing table.

pub mod convergence;
pub mod grid;
pub mod polish;
pub mod refine;
pub mod selection;

use crate::counting::{
    core::{
        data::Traces, options::HyperParameters, params::NUM_PARAMS, ranges::ParameterRanges,
    },
    errors::{CountError, CountResult},
    models::trace_model::TraceModel,
};
use self::{
    grid::batch_initial_guesses,
    polish::polish_outcome,
    refine::{RefineOutcome, refine},
    selection::select_y,
};
use log::info;
use ndarray::{Array1, Array2, Array3, Axis};

pub use self::convergence::LikelihoodHistory;
pub use self::grid::{ParameterGrid, find_local_maxima, initial_guesses};
pub use self::selection::SelectionRule;

/// Result of [`estimate_y`].
///
/// Fields
/// ------
/// - `candidates`: the `y` values considered, `min_y..=max_y`.
/// - `max_likelihood_y`: selected `y` per trace, `[n_traces]`.
/// - `parameters`: best parameters per candidate and trace,
///   `[n_candidates, n_traces, NUM_PARAMS]`.
/// - `log_likelihoods`: best log-likelihood per candidate and trace,
///   `[n_candidates, n_traces]`.
/// - `converged`: whether refinement converged, per candidate.
/// - `iterations`: refinement iterations run, per candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub candidates: Vec<usize>,
    pub max_likelihood_y: Array1<usize>,
    pub parameters: Array3<f64>,
    pub log_likelihoods: Array2<f64>,
    pub converged: Vec<bool>,
    pub iterations: Vec<usize>,
}

/// Ranges actually searched: validated, with the emitter intensity capped by
/// `max_x` (or the data maximum).
fn effective_ranges(
    traces: &Traces, ranges: &ParameterRanges, hyper: &HyperParameters,
) -> CountResult<ParameterRanges> {
    hyper.validate()?;
    ranges.validate()?;
    let max_x = hyper.max_x.unwrap_or_else(|| traces.max_intensity());
    Ok(ranges.bounded_by(max_x))
}

fn fit_y(
    traces: &Traces, y: usize, ranges: &ParameterRanges, hyper: &HyperParameters,
) -> CountResult<RefineOutcome> {
    let model = TraceModel::new(y);
    let guesses = batch_initial_guesses(
        traces.view(),
        &model,
        ranges,
        hyper.num_guesses,
        hyper.maxima_radius,
    );
    let mut outcome = refine(traces.view(), &model, guesses, ranges, hyper)?;
    if let Some(opts) = &hyper.polish {
        polish_outcome(traces.view(), &model, &mut outcome, ranges, opts);
    }
    Ok(outcome)
}

/// Fit every trace under exactly `y` emitters.
///
/// Errors
/// ------
/// - Configuration errors from validation.
/// - `CountError::OptimizationFailed` if the refiner cannot be set up.
pub fn estimate_parameters(
    traces: &Traces, y: usize, ranges: &ParameterRanges, hyper: &HyperParameters,
) -> CountResult<RefineOutcome> {
    let ranges = effective_ranges(traces, ranges, hyper)?;
    fit_y(traces, y, &ranges, hyper)
}

/// Estimate the most likely emitter count for each trace.
///
/// Parameters
/// ----------
/// - `traces`: validated intensity traces.
/// - `max_y`: largest candidate count; candidates are `hyper.min_y..=max_y`.
/// - `ranges`: parameter search ranges.
/// - `hyper`: estimation settings.
///
/// Errors
/// ------
/// - `CountError::InvalidYRange` if `hyper.min_y > max_y`.
/// - `CountError::InvalidRange` / `InvalidHyperParameter` /
///   `InvalidConfidence` for malformed configuration.
/// - `CountError::OptimizationFailed` if the refiner cannot be set up.
pub fn estimate_y(
    traces: &Traces, max_y: usize, ranges: &ParameterRanges, hyper: &HyperParameters,
) -> CountResult<Estimate> {
    if hyper.min_y > max_y {
        return Err(CountError::InvalidYRange { min_y: hyper.min_y, max_y });
    }
    let ranges = effective_ranges(traces, ranges, hyper)?;

    let candidates: Vec<usize> = (hyper.min_y..=max_y).collect();
    let n = traces.n_traces();
    let mut parameters = Array3::<f64>::zeros((candidates.len(), n, NUM_PARAMS));
    let mut log_likelihoods = Array2::<f64>::zeros((candidates.len(), n));
    let mut converged = Vec::with_capacity(candidates.len());
    let mut iterations = Vec::with_capacity(candidates.len());

    for (row, &y) in candidates.iter().enumerate() {
        info!("estimating parameters for y = {y} on {n} traces");
        let outcome = fit_y(traces, y, &ranges, hyper)?;
        parameters.index_axis_mut(Axis(0), row).assign(&outcome.parameters);
        log_likelihoods.row_mut(row).assign(&outcome.log_likelihoods);
        converged.push(outcome.converged);
        iterations.push(outcome.iterations);
    }

    let max_likelihood_y = select_y(log_likelihoods.view(), hyper.min_y, hyper.selection)?;
    Ok(Estimate { candidates, max_likelihood_y, parameters, log_likelihoods, converged, iterations })
}
