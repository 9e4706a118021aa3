//! Integration tests for the emitter-counting pipeline.
//!
//! Purpose
//! -------
//! - Validate the end-to-end path from validated traces, through grid
//!   search, batched refinement, and optional L-BFGS polish, to the
//!   per-trace choice of `y`.
//! - Use synthetic traces simulated from the model itself so the true
//!   parameters and emitter count are known.
//!
//! Coverage
//! --------
//! - `counting::estimate`: `estimate_y`, `estimate_parameters`,
//!   `initial_guesses`, `select_y`.
//! - `counting::models`: `trace_log_likelihood` at the recovered optimum.
//! - Configuration errors surfacing before any work.
//!
//! Exclusions
//! ----------
//! - Low-level building blocks (transition weights, emission moments,
//!   Adam updates) are covered by unit tests.
//! - Python bindings.
use blink_count::{
    counting::{
        CountError, HyperParameters, ParameterRanges, Parameters, Range, SelectionRule, Traces,
        core::params::{P_OFF, P_ON, R_E},
        estimate_parameters, estimate_y, initial_guesses, select_y, trace_log_likelihood,
    },
    optimization::loglik_optimizer::{MLEOptions, Tolerances, traits::LineSearcher},
};
use ndarray::{Array2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

const TRUE_R_E: f64 = 50.0;
const R_BG: f64 = 5.0;
const MU_RO: f64 = 20.0;
const SIGMA_RO: f64 = 1.0;
const SWITCH: f64 = 0.3;

/// Purpose
/// -------
/// Simulate one trace of a single two-state emitter with symmetric
/// switching probability `SWITCH`, emitting
/// `N(gain·λ + μ_ro, gain²·λ + σ_ro²)` with `λ = r_bg + k·r_e`.
///
/// Invariants
/// ----------
/// - Deterministic for a given `seed`.
/// - Intensities are clamped at zero so `Traces` validation succeeds; with
///   `μ_ro = 20` the clamp is never active in practice.
fn simulate_single_emitter(n_steps: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut on = rng.gen::<f64>() < 0.5;
    (0..n_steps)
        .map(|_| {
            let lambda = R_BG + if on { TRUE_R_E } else { 0.0 };
            let noise = Normal::new(lambda + MU_RO, (lambda + SIGMA_RO * SIGMA_RO).sqrt())
                .expect("valid normal");
            let x = noise.sample(&mut rng).max(0.0);
            if rng.gen::<f64>() < SWITCH {
                on = !on;
            }
            x
        })
        .collect()
}

fn ranges() -> ParameterRanges {
    ParameterRanges {
        r_e: Range::new(20.0, 80.0, 7),
        r_bg: Range::fixed(R_BG),
        mu_ro: Range::fixed(MU_RO),
        sigma_ro: Range::fixed(SIGMA_RO),
        gain: Range::fixed(1.0),
        p_on: Range::new(0.05, 0.95, 5),
        p_off: Range::new(0.05, 0.95, 5),
    }
}

fn hyper() -> HyperParameters {
    HyperParameters { min_y: 0, num_guesses: 3, epoch_length: 400, ..Default::default() }
}

fn traces(rows: Vec<Vec<f64>>) -> Traces {
    Traces::from_rows(rows).expect("simulated traces are valid")
}

#[test]
// Purpose
// -------
// A single-emitter trace is counted as one emitter and its parameters are
// recovered.
//
// Given
// -----
// - 1500 steps simulated with r_e = 50, p_on = p_off = 0.3.
// - Candidates y ∈ {0, 1, 2} with the default likelihood-ratio rule.
//
// Expect
// ------
// - Selected y is 1, both by the likelihood-ratio rule and by the raw
//   maximum log-likelihood.
// - r_e within 10 % of the truth, switching probabilities within 0.1.
// - Every estimate lies inside the searched ranges.
fn single_emitter_is_counted_and_recovered() {
    let data = traces(vec![simulate_single_emitter(1500, 7)]);

    let est = estimate_y(&data, 2, &ranges(), &hyper()).unwrap();

    assert_eq!(est.candidates, vec![0, 1, 2]);
    assert_eq!(est.max_likelihood_y[0], 1);
    let raw_best = select_y(est.log_likelihoods.view(), 0, SelectionRule::ArgMax).unwrap();
    assert_eq!(raw_best[0], 1, "log-likelihoods per y: {:?}", est.log_likelihoods.column(0));

    let fit = est.parameters.index_axis(Axis(0), 1);
    let theta = fit.row(0);
    assert!((theta[R_E] - TRUE_R_E).abs() < 0.1 * TRUE_R_E, "r_e = {}", theta[R_E]);
    assert!((theta[P_ON] - SWITCH).abs() < 0.1, "p_on = {}", theta[P_ON]);
    assert!((theta[P_OFF] - SWITCH).abs() < 0.1, "p_off = {}", theta[P_OFF]);

    for (row, _) in est.candidates.iter().enumerate() {
        let theta = est.parameters.index_axis(Axis(0), row);
        for (value, range) in theta.row(0).iter().zip(ranges().as_array()) {
            assert!(*value >= range.min && *value <= range.max);
        }
    }
}

#[test]
// Purpose
// -------
// Adding a second emitter state never lowers the best log-likelihood when
// the smaller model is nested, and the reported value matches a direct
// evaluation at the reported parameters.
//
// Given
// -----
// - One simulated trace; candidates y ∈ {0, 1}.
//
// Expect
// ------
// - ℓ(y = 1) ≥ ℓ(y = 0).
// - `trace_log_likelihood` at the reported optimum reproduces the table.
fn log_likelihood_is_monotone_and_consistent() {
    let data = traces(vec![simulate_single_emitter(800, 11)]);

    let est = estimate_y(&data, 1, &ranges(), &hyper()).unwrap();

    let ll = est.log_likelihoods.column(0);
    assert!(ll[1] >= ll[0]);

    for (row, &y) in est.candidates.iter().enumerate() {
        let theta = est.parameters.index_axis(Axis(0), row);
        let params = Parameters::from_slice(theta.row(0).as_slice().unwrap()).unwrap();
        let direct = trace_log_likelihood(data.trace(0), y, &params);
        assert!((direct - ll[row]).abs() < 1e-6 * ll[row].abs().max(1.0));
    }
}

#[test]
// Purpose
// -------
// Traces are estimated independently and deterministically.
//
// Given
// -----
// - The same simulated trace twice, next to a different one.
//
// Expect
// ------
// - Replicated traces receive identical parameters and likelihoods.
// - A second run reproduces the first bit for bit.
fn replicated_traces_get_identical_estimates() {
    let a = simulate_single_emitter(600, 3);
    let b = simulate_single_emitter(600, 5);
    let data = traces(vec![a.clone(), b, a]);
    let hyper = HyperParameters { min_y: 1, ..hyper() };

    let first = estimate_y(&data, 1, &ranges(), &hyper).unwrap();
    let second = estimate_y(&data, 1, &ranges(), &hyper).unwrap();

    assert_eq!(first, second);
    let params = first.parameters.index_axis(Axis(0), 0);
    assert_eq!(params.row(0), params.row(2));
    assert_eq!(first.log_likelihoods[[0, 0]], first.log_likelihoods[[0, 2]]);
}

#[test]
// Purpose
// -------
// The optional L-BFGS polish never makes a fit worse.
//
// Given
// -----
// - One simulated trace at y = 1, with and without polish.
//
// Expect
// ------
// - Polished log-likelihood ≥ refined log-likelihood.
// - Polished parameters stay inside the ranges.
fn polish_never_lowers_the_likelihood() {
    let data = traces(vec![simulate_single_emitter(600, 13)]);
    let plain = estimate_parameters(&data, 1, &ranges(), &hyper()).unwrap();

    let tols = Tolerances::new(Some(1e-6), None, Some(100)).unwrap();
    let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, None).unwrap();
    let polished_hyper = HyperParameters { polish: Some(opts), ..hyper() };
    let polished = estimate_parameters(&data, 1, &ranges(), &polished_hyper).unwrap();

    assert!(polished.log_likelihoods[0] >= plain.log_likelihoods[0]);
    for (value, range) in polished.parameters.row(0).iter().zip(ranges().as_array()) {
        assert!(*value >= range.min && *value <= range.max);
    }
}

#[test]
// Purpose
// -------
// Grid-search starting points for a single trace respect the ranges and the
// requested count.
fn initial_guesses_lie_on_the_grid() {
    let trace = Array2::from_shape_vec((1, 400), simulate_single_emitter(400, 17)).unwrap();

    let guesses = initial_guesses(trace.row(0), 1, &ranges(), 4);

    assert_eq!(guesses.len(), 4);
    let r_e_axis = ranges().r_e.values();
    for guess in &guesses {
        assert!(r_e_axis.iter().any(|v| (v - guess.r_e).abs() < 1e-12));
        assert_eq!(guess.r_bg, R_BG);
    }
}

#[test]
// Purpose
// -------
// Malformed configuration is rejected with a descriptive error.
fn configuration_errors_are_reported() {
    let data = traces(vec![simulate_single_emitter(50, 1)]);

    let no_guesses = HyperParameters { num_guesses: 0, ..hyper() };
    assert!(matches!(
        estimate_y(&data, 2, &ranges(), &no_guesses),
        Err(CountError::InvalidHyperParameter { name: "num_guesses", .. })
    ));

    let bad_rule = HyperParameters {
        selection: SelectionRule::LikelihoodRatio { confidence: 1.5 },
        ..hyper()
    };
    assert_eq!(
        estimate_y(&data, 2, &ranges(), &bad_rule),
        Err(CountError::InvalidConfidence { value: 1.5 })
    );

    let bad_ranges = ParameterRanges { gain: Range::fixed(0.0), ..ranges() };
    assert!(matches!(
        estimate_y(&data, 2, &bad_ranges, &hyper()),
        Err(CountError::InvalidRange { name: "gain", .. })
    ));

    assert!(matches!(Traces::from_rows(vec![vec![1.0, -2.0]]), Err(CountError::NegativeIntensity { .. })));
}
