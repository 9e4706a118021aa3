//! Intensity trace container.
//!
//! Purpose
//! -------
//! Validate the 2-D intensity input once, at the boundary, so the likelihood
//! and estimation code can assume clean data.
//!
//! Invariants & assumptions
//! ------------------------
//! - At least one trace, each with at least one time step.
//! - Every intensity is finite and non-negative.
//! - Rows are traces, columns are time steps; all traces share one length.
//!
//! Testing notes
//! -------------
//! Unit tests cover each rejection path and the `max_intensity` summary.
use crate::counting::errors::{CountError, CountResult};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// `Traces` — validated `(n_traces, n_steps)` intensity matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Traces {
    data: Array2<f64>,
}

impl Traces {
    /// Construct validated traces from a `(n_traces, n_steps)` array.
    ///
    /// Errors
    /// ------
    /// - `CountError::NoTraces` / `CountError::EmptyTrace` for empty axes.
    /// - `CountError::NonFiniteIntensity` / `CountError::NegativeIntensity`
    ///   for the first offending entry in row-major order.
    pub fn new(data: Array2<f64>) -> CountResult<Self> {
        validate_intensities(data.view())?;
        Ok(Self { data })
    }

    /// Construct validated traces from nested rows of equal length.
    ///
    /// Errors
    /// ------
    /// - `CountError::RaggedTraces` if a row differs in length from the first.
    /// - Everything [`Traces::new`] reports.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> CountResult<Self> {
        let n_traces = rows.len();
        let n_steps = rows.first().map_or(0, Vec::len);
        for (trace, row) in rows.iter().enumerate() {
            if row.len() != n_steps {
                return Err(CountError::RaggedTraces { trace, expected: n_steps, found: row.len() });
            }
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let data = Array2::from_shape_vec((n_traces, n_steps), flat).map_err(|_| {
            CountError::ShapeMismatch {
                what: "traces",
                expected: vec![n_traces, n_steps],
                found: vec![n_traces * n_steps],
            }
        })?;
        Self::new(data)
    }

    pub fn n_traces(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_steps(&self) -> usize {
        self.data.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Row `index` as a 1-D view. Panics if out of range, like ndarray.
    pub fn trace(&self, index: usize) -> ArrayView1<'_, f64> {
        self.data.row(index)
    }

    /// Largest intensity across all traces.
    pub fn max_intensity(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Check emptiness, finiteness and sign of an intensity matrix.
pub fn validate_intensities(data: ArrayView2<f64>) -> CountResult<()> {
    if data.nrows() == 0 {
        return Err(CountError::NoTraces);
    }
    if data.ncols() == 0 {
        return Err(CountError::EmptyTrace);
    }
    for ((trace, step), &value) in data.indexed_iter() {
        if !value.is_finite() {
            return Err(CountError::NonFiniteIntensity { trace, step, value });
        }
        if value < 0.0 {
            return Err(CountError::NegativeIntensity { trace, step, value });
        }
    }
    Ok(())
}
