//! counting — emitter counting for blinking fluorescent traces.
//!
//! Purpose
//! -------
//! Estimate how many independently blinking emitters produced each intensity
//! trace by maximizing a hidden-Markov likelihood over the model parameters
//! for every candidate count `y`, then selecting `y` per trace.
//!
//! Key behaviors
//! -------------
//! - [`core`] holds validated inputs (traces, parameters, ranges,
//!   hyper-parameters) and the two model ingredients: the occupancy chain and
//!   the Gaussian emission model.
//! - [`models`] evaluates exact forward-algorithm log-likelihoods and their
//!   analytic gradients.
//! - [`estimate`] runs grid search, batched Adam refinement, optional L-BFGS
//!   polish, and `y` selection.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameter vectors always use the fixed order
//!   `r_e, r_bg, mu_ro, sigma_ro, gain, p_on, p_off`.
//! - Every estimate lies inside the configured parameter ranges.
//! - All computation is deterministic for a given input and configuration.
//!
//! Conventions
//! -----------
//! - Batched arrays are laid out `[trace, restart, parameter]`; tables over
//!   candidates are `[candidate, trace]`.
//! - Errors are reported as [`CountError`]; non-convergence is a flag, not an
//!   error.

pub mod core;
pub mod errors;
pub mod estimate;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    HyperParameters, NUM_PARAMS, PARAM_NAMES, ParameterRanges, Parameters, Range, Traces,
};

pub use self::errors::{CountError, CountResult};

pub use self::estimate::{
    Estimate, SelectionRule, estimate_parameters, estimate_y, initial_guesses,
    refine::RefineOutcome, selection::select_y,
};

pub use self::models::{TraceModel, trace_log_likelihood, trace_log_likelihood_and_grad};

// ---- Optional convenience prelude for downstream crates -------------------
//
//     use blink_count::counting::prelude::*;

pub mod prelude {
    pub use super::{
        CountError, CountResult, Estimate, HyperParameters, NUM_PARAMS, PARAM_NAMES,
        ParameterRanges, Parameters, Range, RefineOutcome, SelectionRule, TraceModel, Traces,
        estimate_parameters, estimate_y, initial_guesses, select_y, trace_log_likelihood,
        trace_log_likelihood_and_grad,
    };
}
