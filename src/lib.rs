//! blink_count — maximum-likelihood counting of blinking fluorescent emitters.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that exposes
//! the estimation entry points to Python via the `_blink_count` extension
//! module.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules (`counting` and `optimization`) as the
//!   public crate surface.
//! - Define the `#[pyclass]` result wrapper, the `#[pyfunction]` entry points,
//!   and the `#[pymodule]` initializer when `python-bindings` is enabled.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner Rust modules; this file performs
//!   only FFI glue, input conversion, and error mapping.
//! - Python inputs are validated through the same constructors Rust callers
//!   use ([`counting::Traces`], [`counting::ParameterRanges::validate`],
//!   [`counting::HyperParameters::validate`]).
//!
//! Conventions
//! -----------
//! - Parameter vectors are ordered `r_e, r_bg, mu_ro, sigma_ro, gain, p_on,
//!   p_off` on both sides of the boundary.
//! - Errors from core Rust code are converted to `ValueError` at the PyO3
//!   boundary.
//!
//! Downstream usage
//! ----------------
//! - Native Rust code uses [`counting::estimate_y`] and friends directly and
//!   can ignore everything guarded by the `python-bindings` feature.
//! - The Python packaging layer imports `_blink_count` and wraps it in a thin
//!   pure-Python facade.

pub mod counting;
pub mod optimization;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray1, PyArray2, PyArray3};

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::{PyAny, PyDict}};

#[cfg(feature = "python-bindings")]
use crate::{
    counting::{Estimate, HyperParameters, Parameters, estimate_y, trace_log_likelihood},
    utils::{extract_polish_opts, extract_ranges, extract_selection, extract_trace, extract_traces},
};

/// CountEstimate — Python-facing result of `estimate_y`.
///
/// Read-only view over [`Estimate`]; every accessor copies into a fresh
/// numpy array or Python list.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "blink_count")]
pub struct CountEstimate {
    inner: Estimate,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl CountEstimate {
    /// Selected emitter count per trace.
    #[getter]
    pub fn max_likelihood_y<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<usize>> {
        self.inner.max_likelihood_y.clone().into_pyarray_bound(py)
    }

    /// Best parameters, `[n_candidates, n_traces, 7]`.
    #[getter]
    pub fn parameters<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.inner.parameters.clone().into_pyarray_bound(py)
    }

    /// Best log-likelihoods, `[n_candidates, n_traces]`.
    #[getter]
    pub fn log_likelihoods<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.inner.log_likelihoods.clone().into_pyarray_bound(py)
    }

    #[getter]
    pub fn candidates(&self) -> Vec<usize> {
        self.inner.candidates.clone()
    }

    #[getter]
    pub fn converged(&self) -> Vec<bool> {
        self.inner.converged.clone()
    }

    #[getter]
    pub fn iterations(&self) -> Vec<usize> {
        self.inner.iterations.clone()
    }
}

/// Estimate the most likely number of emitters for each trace.
///
/// `ranges` maps parameter names to `(min, max, steps)` tuples and overrides
/// the defaults for the names it contains.
#[cfg(feature = "python-bindings")]
#[pyfunction(name = "estimate_y")]
#[pyo3(
    signature = (
        traces,
        max_y,
        ranges = None,
        min_y = 1,
        max_x = None,
        num_guesses = 5,
        epoch_length = 1000,
        is_done_window = 10,
        is_done_limit = 1e-5,
        learning_rate = 1e-3,
        intensity_learning_rate = 1.0,
        selection = None,
        confidence = None,
        polish = false,
        polish_max_iter = None,
        polish_line_searcher = None,
    ),
    text_signature = "(traces, max_y, /, ranges=None, min_y=1, max_x=None, num_guesses=5, \
                      epoch_length=1000, is_done_window=10, is_done_limit=1e-5, \
                      learning_rate=1e-3, intensity_learning_rate=1.0, \
                      selection='likelihood_ratio', confidence=0.95, polish=False, \
                      polish_max_iter=None, polish_line_searcher=None)"
)]
#[allow(clippy::too_many_arguments)]
fn py_estimate_y<'py>(
    py: Python<'py>, traces: &Bound<'py, PyAny>, max_y: usize, ranges: Option<&Bound<'py, PyDict>>,
    min_y: usize, max_x: Option<f64>, num_guesses: usize, epoch_length: usize,
    is_done_window: usize, is_done_limit: f64, learning_rate: f64, intensity_learning_rate: f64,
    selection: Option<&str>, confidence: Option<f64>, polish: bool, polish_max_iter: Option<usize>,
    polish_line_searcher: Option<&str>,
) -> PyResult<CountEstimate> {
    let traces = extract_traces(traces)?;
    let ranges = extract_ranges(ranges)?;
    let hyper = HyperParameters {
        min_y,
        max_x,
        num_guesses,
        epoch_length,
        is_done_window,
        is_done_limit,
        learning_rate,
        intensity_learning_rate,
        selection: extract_selection(selection, confidence)?,
        polish: extract_polish_opts(polish, None, polish_max_iter, polish_line_searcher)?,
        ..HyperParameters::default()
    };
    let inner = py.allow_threads(|| estimate_y(&traces, max_y, &ranges, &hyper))?;
    Ok(CountEstimate { inner })
}

/// Exact log-likelihood of one trace under `y` emitters and a 7-element
/// parameter vector.
#[cfg(feature = "python-bindings")]
#[pyfunction(name = "trace_log_likelihood")]
#[pyo3(signature = (trace, y, parameters), text_signature = "(trace, y, parameters, /)")]
fn py_trace_log_likelihood<'py>(
    trace: &Bound<'py, PyAny>, y: usize, parameters: Vec<f64>,
) -> PyResult<f64> {
    let traces = extract_trace(trace)?;
    let params = Parameters::from_slice(&parameters)?;
    Ok(trace_log_likelihood(traces.trace(0), y, &params))
}

/// _blink_count — PyO3 module initializer for the Python extension.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _blink_count<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_class::<CountEstimate>()?;
    m.add_function(wrap_pyfunction!(py_estimate_y, m)?)?;
    m.add_function(wrap_pyfunction!(py_trace_log_likelihood, m)?)?;
    Ok(())
}
