//! Errors for emitter counting (trace validation, configuration checks, and
//! estimation failures).
//!
//! [`CountError`] is the single error type of the counting layer. It
//! implements `Display`/`Error`, absorbs optimizer failures through
//! `From<OptError>`, and converts to a Python `ValueError` when the
//! `python-bindings` feature is enabled.
//!
//! ## Conventions
//! - **Indices are 0-based**; `trace` is the row, `step` the column of the
//!   input array.
//! - Intensities must be **finite and non-negative**.
//! - Configuration problems are reported before any likelihood is evaluated.
//! - Numerical trouble during refinement is *not* an error; it is handled by
//!   the convergence logic and reported through flags on the result.
use crate::optimization::errors::OptError;

/// Result alias for the counting layer.
pub type CountResult<T> = Result<T, CountError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CountError {
    // ---- Trace data ----
    /// No traces were supplied.
    NoTraces,

    /// Traces have zero time steps.
    EmptyTrace,

    /// Rows of a nested input have different lengths.
    RaggedTraces { trace: usize, expected: usize, found: usize },

    /// An intensity is NaN or ±inf.
    NonFiniteIntensity { trace: usize, step: usize, value: f64 },

    /// An intensity is negative.
    NegativeIntensity { trace: usize, step: usize, value: f64 },

    // ---- Parameters ----
    /// A parameter vector has the wrong number of entries.
    ParameterLength { expected: usize, found: usize },

    /// A parameter value is outside its admissible domain.
    InvalidParameter { name: &'static str, value: f64, reason: &'static str },

    // ---- Configuration ----
    /// A per-parameter grid range is malformed.
    InvalidRange { name: &'static str, min: f64, max: f64, steps: usize, reason: &'static str },

    /// A hyper-parameter is outside its admissible domain.
    InvalidHyperParameter { name: &'static str, value: f64, reason: &'static str },

    /// `min_y` exceeds `max_y`.
    InvalidYRange { min_y: usize, max_y: usize },

    /// Confidence level for the likelihood-ratio selection rule.
    InvalidConfidence { value: f64 },

    /// An array handed to a public routine does not have the expected shape.
    ShapeMismatch { what: &'static str, expected: Vec<usize>, found: Vec<usize> },

    // ---- Linear algebra ----
    /// The stationary distribution could not be solved for.
    SingularTransition { y: usize },

    // ---- Optimizer ----
    /// Optimizer construction or execution failed.
    OptimizationFailed { status: String },
}

impl std::error::Error for CountError {}

impl std::fmt::Display for CountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountError::NoTraces => write!(f, "No traces supplied"),
            CountError::EmptyTrace => write!(f, "Traces must contain at least one time step"),
            CountError::RaggedTraces { trace, expected, found } => write!(
                f,
                "Trace {trace} has length {found}, expected {expected} like the first trace"
            ),
            CountError::NonFiniteIntensity { trace, step, value } => {
                write!(f, "Non-finite intensity {value} in trace {trace} at step {step}")
            }
            CountError::NegativeIntensity { trace, step, value } => {
                write!(f, "Negative intensity {value} in trace {trace} at step {step}")
            }
            CountError::ParameterLength { expected, found } => {
                write!(f, "Parameter vector has {found} entries, expected {expected}")
            }
            CountError::InvalidParameter { name, value, reason } => {
                write!(f, "Invalid value {value} for parameter '{name}': {reason}")
            }
            CountError::InvalidRange { name, min, max, steps, reason } => write!(
                f,
                "Invalid range for '{name}' (min {min}, max {max}, steps {steps}): {reason}"
            ),
            CountError::InvalidHyperParameter { name, value, reason } => {
                write!(f, "Invalid hyper-parameter '{name}' = {value}: {reason}")
            }
            CountError::InvalidYRange { min_y, max_y } => {
                write!(f, "min_y ({min_y}) must not exceed max_y ({max_y})")
            }
            CountError::InvalidConfidence { value } => {
                write!(f, "Confidence level {value} must lie strictly between 0 and 1")
            }
            CountError::ShapeMismatch { what, expected, found } => {
                write!(f, "Shape mismatch for {what}: expected {expected:?}, found {found:?}")
            }
            CountError::SingularTransition { y } => {
                write!(f, "Stationary distribution for y = {y} could not be solved")
            }
            CountError::OptimizationFailed { status } => {
                write!(f, "Optimization failed: {status}")
            }
        }
    }
}

impl From<OptError> for CountError {
    fn from(err: OptError) -> Self {
        CountError::OptimizationFailed { status: err.to_string() }
    }
}

#[cfg(feature = "python-bindings")]
impl std::convert::From<CountError> for pyo3::PyErr {
    fn from(err: CountError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Optimizer errors keep their message when lifted into `CountError`.
    fn opt_error_is_wrapped_with_message() {
        let err: CountError = OptError::NoTolerancesProvided.into();

        assert_eq!(
            err,
            CountError::OptimizationFailed { status: "No tolerances provided".to_string() }
        );
    }

    #[test]
    // Purpose
    // -------
    // Display output names the offending location for data errors.
    fn display_names_trace_and_step() {
        let msg = CountError::NegativeIntensity { trace: 2, step: 7, value: -1.5 }.to_string();

        assert!(msg.contains("trace 2"));
        assert!(msg.contains("step 7"));
    }
}
