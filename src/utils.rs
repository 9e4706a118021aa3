//! Python-side argument extraction for the PyO3 bindings.
//!
//! Every helper converts loosely typed Python input (numpy arrays, nested
//! sequences, dicts, strings) into the validated Rust configuration types,
//! mapping failures onto `TypeError` / `ValueError`.
#[cfg(feature = "python-bindings")]
use ndarray::Array2;

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use numpy::{PyReadonlyArray1, PyReadonlyArray2};

#[cfg(feature = "python-bindings")]
use crate::{
    counting::{
        core::{data::Traces, ranges::Range},
        errors::CountError,
        estimate::SelectionRule,
        ParameterRanges,
    },
    optimization::loglik_optimizer::traits::{LineSearcher, MLEOptions, Tolerances},
};

/// Accept a 2-D float64 array or a sequence of equal-length sequences.
#[cfg(feature = "python-bindings")]
pub fn extract_traces(raw: &Bound<'_, PyAny>) -> PyResult<Traces> {
    if let Ok(arr) = raw.extract::<PyReadonlyArray2<f64>>() {
        return Ok(Traces::new(arr.as_array().to_owned())?);
    }
    if let Ok(arr) = raw.extract::<PyReadonlyArray1<f64>>() {
        let row = arr.as_array().to_owned();
        let n = row.len();
        let data = row
            .into_shape((1, n))
            .map_err(|e| PyValueError::new_err(format!("cannot reshape trace: {e}")))?;
        return Ok(Traces::new(data)?);
    }
    let rows: Vec<Vec<f64>> = raw.extract().map_err(|_| {
        PyTypeError::new_err("expected a 2-D numpy.ndarray or a sequence of float sequences")
    })?;
    Ok(Traces::from_rows(rows)?)
}

/// A single trace as a 1-D array (numpy or sequence).
#[cfg(feature = "python-bindings")]
pub fn extract_trace(raw: &Bound<'_, PyAny>) -> PyResult<Traces> {
    let values: Vec<f64> = match raw.extract::<PyReadonlyArray1<f64>>() {
        Ok(arr) => arr.as_array().to_vec(),
        Err(_) => raw
            .extract()
            .map_err(|_| PyTypeError::new_err("expected a 1-D numpy.ndarray or float sequence"))?,
    };
    let n = values.len();
    let data = Array2::from_shape_vec((1, n), values)
        .map_err(|e| PyValueError::new_err(format!("cannot reshape trace: {e}")))?;
    Ok(Traces::new(data)?)
}

/// Override default ranges from `{"r_e": (min, max, steps), ...}`.
#[cfg(feature = "python-bindings")]
pub fn extract_ranges(raw: Option<&Bound<'_, PyDict>>) -> PyResult<ParameterRanges> {
    let mut ranges = ParameterRanges::default();
    let Some(dict) = raw else {
        return Ok(ranges);
    };
    for (key, value) in dict.iter() {
        let name: String = key.extract()?;
        let (min, max, steps): (f64, f64, usize) = value.extract().map_err(|_| {
            PyTypeError::new_err(format!("range for {name:?} must be a (min, max, steps) tuple"))
        })?;
        let range = Range::new(min, max, steps);
        match name.as_str() {
            "r_e" => ranges.r_e = range,
            "r_bg" => ranges.r_bg = range,
            "mu_ro" => ranges.mu_ro = range,
            "sigma_ro" => ranges.sigma_ro = range,
            "gain" => ranges.gain = range,
            "p_on" => ranges.p_on = range,
            "p_off" => ranges.p_off = range,
            other => {
                return Err(PyValueError::new_err(format!(
                    "unknown parameter {other:?} (expected one of r_e, r_bg, mu_ro, sigma_ro, gain, p_on, p_off)"
                )));
            }
        }
    }
    ranges.validate()?;
    Ok(ranges)
}

/// `"likelihood_ratio"` (with `confidence`) or `"argmax"`.
#[cfg(feature = "python-bindings")]
pub fn extract_selection(rule: Option<&str>, confidence: Option<f64>) -> PyResult<SelectionRule> {
    let rule = match rule.unwrap_or("likelihood_ratio").to_lowercase().as_str() {
        "likelihood_ratio" | "lr" => {
            SelectionRule::LikelihoodRatio { confidence: confidence.unwrap_or(0.95) }
        }
        "argmax" | "max" => SelectionRule::ArgMax,
        other => {
            return Err(PyValueError::new_err(format!(
                "invalid selection rule {other:?} (expected 'likelihood_ratio' or 'argmax')"
            )));
        }
    };
    rule.validate()?;
    Ok(rule)
}

/// L-BFGS polish options; `None` unless `polish` is requested.
#[cfg(feature = "python-bindings")]
pub fn extract_polish_opts(
    polish: bool, tol_grad: Option<f64>, max_iter: Option<usize>, line_searcher: Option<&str>,
) -> PyResult<Option<MLEOptions>> {
    if !polish {
        return Ok(None);
    }
    let tols = Tolerances::new(tol_grad.or(Some(1e-6)), None, max_iter.or(Some(300)))
        .map_err(CountError::from)?;
    let ls = match line_searcher {
        Some(name) => name.parse::<LineSearcher>().map_err(CountError::from)?,
        None => LineSearcher::MoreThuente,
    };
    let opts = MLEOptions::new(tols, ls, None).map_err(CountError::from)?;
    Ok(Some(opts))
}
