//! Grid-search initializer.
//!
//! Purpose
//! -------
//! Turn the per-parameter ranges into a Cartesian lattice, evaluate the
//! trace log-likelihood at every lattice point for every trace, and pick a
//! fixed number of well-separated starting points per trace from the local
//! maxima of that surface.
//!
//! Key behaviors
//! -------------
//! - Lattice points are numbered row-major over the seven parameter axes
//!   (last parameter fastest), like an `ij` meshgrid.
//! - The occupancy chain depends only on `(p_on, p_off)`; it is built once
//!   per distinct pair and shared by every trace and every intensity
//!   combination.
//! - All `(trace, point)` evaluations run in parallel.
//! - Local maxima use a Chebyshev neighbourhood of configurable radius,
//!   clipped at the lattice boundary, over axes with more than one value.
//!   `NaN` counts as `−∞`.
//! - A point is a local maximum when no neighbour is strictly greater and
//!   either some neighbour is strictly smaller or the whole surface is
//!   constant. Flat interior plateaus are therefore not maxima.
//! - Fallbacks: without any local maximum the global argmax is used; fewer
//!   maxima than requested are padded by repeating the best one.
use crate::counting::{
    core::{
        emission::state_moments,
        params::{NUM_PARAMS, P_OFF, P_ON, Parameters},
        ranges::ParameterRanges,
    },
    models::trace_model::{TraceModel, forward_log_likelihood},
};
use log::debug;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, Zip};
use rayon::prelude::*;

/// Discretized parameter lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    axes: Vec<Array1<f64>>,
    shape: [usize; NUM_PARAMS],
}

impl ParameterGrid {
    pub fn new(ranges: &ParameterRanges) -> Self {
        Self {
            axes: ranges.as_array().iter().map(|r| r.values()).collect(),
            shape: ranges.grid_shape(),
        }
    }

    /// Number of lattice points.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> [usize; NUM_PARAMS] {
        self.shape
    }

    /// Multi-index of a flat lattice index.
    pub fn unravel(&self, flat: usize) -> [usize; NUM_PARAMS] {
        unravel(flat, &self.shape)
    }

    /// Parameter values at a flat lattice index.
    pub fn point(&self, flat: usize) -> [f64; NUM_PARAMS] {
        let idx = self.unravel(flat);
        std::array::from_fn(|p| self.axes[p][idx[p]])
    }
}

fn unravel<const N: usize>(mut flat: usize, shape: &[usize; N]) -> [usize; N] {
    let mut idx = [0; N];
    for d in (0..N).rev() {
        idx[d] = flat % shape[d];
        flat /= shape[d];
    }
    idx
}

/// Log-likelihood of every trace at every lattice point, `[n_traces, grid.len()]`.
pub fn grid_log_likelihoods(
    traces: ArrayView2<f64>, model: &TraceModel, grid: &ParameterGrid,
) -> Array2<f64> {
    let y = model.y();
    let n_off = grid.shape[P_OFF];
    let chains: Vec<_> = (0..grid.shape[P_ON] * n_off)
        .into_par_iter()
        .map(|c| model.chain(grid.axes[P_ON][c / n_off], grid.axes[P_OFF][c % n_off]))
        .collect();
    debug!(
        "grid y = {y}: {} points x {} traces, {} shared chains",
        grid.len(),
        traces.nrows(),
        chains.len()
    );

    let mut out = Array2::<f64>::zeros((traces.nrows(), grid.len()));
    Zip::indexed(&mut out).par_for_each(|(n, g), value| {
        let idx = grid.unravel(g);
        let values = grid.point(g);
        let params = Parameters::from_view_unchecked(ArrayView1::from(&values[..]));
        let (transition, initial) = &chains[idx[P_ON] * n_off + idx[P_OFF]];
        let states = state_moments(y, &params);
        *value = forward_log_likelihood(traces.row(n), &states, transition.view(), initial.view());
    });
    out
}

/// Flat indices of local maxima of a lattice surface.
pub fn find_local_maxima(values: &[f64], shape: &[usize; NUM_PARAMS], radius: usize) -> Vec<usize> {
    let score = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v };
    let constant = values.windows(2).all(|w| score(w[0]) == score(w[1]));

    // Offsets of the Chebyshev ball over active axes, centre excluded.
    let active: Vec<usize> = (0..NUM_PARAMS).filter(|&d| shape[d] > 1).collect();
    let r = radius as isize;
    let mut offsets: Vec<Vec<isize>> = vec![Vec::new()];
    for _ in &active {
        offsets = offsets
            .into_iter()
            .flat_map(|o| {
                (-r..=r).map(move |s| {
                    let mut o = o.clone();
                    o.push(s);
                    o
                })
            })
            .collect();
    }
    offsets.retain(|o| o.iter().any(|&s| s != 0));

    let mut strides = [1usize; NUM_PARAMS];
    for d in (0..NUM_PARAMS - 1).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }

    (0..values.len())
        .filter(|&flat| {
            let centre = score(values[flat]);
            let idx = unravel(flat, shape);
            let mut has_lower = false;
            for offset in &offsets {
                let mut neighbour = 0usize;
                let mut inside = true;
                for (&d, &s) in active.iter().zip(offset) {
                    let pos = idx[d] as isize + s;
                    if pos < 0 || pos >= shape[d] as isize {
                        inside = false;
                        break;
                    }
                    neighbour += pos as usize * strides[d];
                }
                if !inside {
                    continue;
                }
                let other = score(values[neighbour]);
                if other > centre {
                    return false;
                }
                has_lower |= other < centre;
            }
            has_lower || constant
        })
        .collect()
}

/// Pick `num_guesses` lattice indices: best local maxima first, padded with
/// the best one, falling back to the global argmax.
pub fn select_guesses(
    values: &[f64], shape: &[usize; NUM_PARAMS], radius: usize, num_guesses: usize,
) -> Vec<usize> {
    let score = |i: usize| if values[i].is_nan() { f64::NEG_INFINITY } else { values[i] };
    let mut maxima = find_local_maxima(values, shape, radius);
    // stable: ties keep lattice order
    maxima.sort_by(|&a, &b| score(b).total_cmp(&score(a)));
    maxima.truncate(num_guesses);

    if maxima.is_empty() {
        let best = (0..values.len()).fold(0, |best, i| if score(i) > score(best) { i } else { best });
        maxima.push(best);
    }
    let best = maxima[0];
    maxima.resize(num_guesses, best);
    maxima
}

/// Starting points for every trace, `[n_traces, num_guesses, NUM_PARAMS]`.
pub fn batch_initial_guesses(
    traces: ArrayView2<f64>, model: &TraceModel, ranges: &ParameterRanges, num_guesses: usize,
    radius: usize,
) -> Array3<f64> {
    let grid = ParameterGrid::new(ranges);
    let surface = grid_log_likelihoods(traces, model, &grid);
    let shape = grid.shape();

    let mut guesses = Array3::<f64>::zeros((traces.nrows(), num_guesses, NUM_PARAMS));
    Zip::from(guesses.axis_iter_mut(Axis(0)))
        .and(surface.axis_iter(Axis(0)))
        .par_for_each(|mut out, row| {
            let row = row.to_vec();
            for (g, flat) in select_guesses(&row, &shape, radius, num_guesses).into_iter().enumerate() {
                for (p, v) in grid.point(flat).into_iter().enumerate() {
                    out[[g, p]] = v;
                }
            }
        });
    guesses
}

/// Starting points for a single trace under `y` emitters.
pub fn initial_guesses(
    trace: ArrayView1<f64>, y: usize, ranges: &ParameterRanges, num_guesses: usize,
) -> Vec<Parameters> {
    let traces = trace.insert_axis(Axis(0));
    let guesses = batch_initial_guesses(traces, &TraceModel::new(y), ranges, num_guesses, 1);
    guesses
        .index_axis(Axis(0), 0)
        .rows()
        .into_iter()
        .map(Parameters::from_view_unchecked)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::core::ranges::Range;
    use ndarray::array;

    const LINE: [usize; NUM_PARAMS] = [1, 1, 1, 1, 1, 1, 6];

    #[test]
    // Purpose
    // -------
    // Flat indices unravel row-major with the last parameter fastest.
    fn lattice_is_row_major() {
        let ranges = ParameterRanges {
            r_e: Range::new(10.0, 30.0, 3),
            p_on: Range::fixed(0.5),
            p_off: Range::new(0.1, 0.2, 2),
            ..ParameterRanges::default()
        };
        let grid = ParameterGrid::new(&ranges);

        assert_eq!(grid.len(), 6);
        assert_eq!(grid.point(1)[0], 10.0);
        assert_eq!(grid.point(1)[P_OFF], 0.2);
        assert_eq!(grid.point(4)[0], 30.0);
        assert_eq!(grid.point(4)[P_OFF], 0.1);
    }

    #[test]
    // Purpose
    // -------
    // Strict peaks are maxima, plateaus are not, and constant surfaces are.
    //
    // Given
    // -----
    // 1-D surfaces of length 6 laid along the `p_off` axis.
    fn local_maxima_follow_plateau_rule() {
        assert_eq!(find_local_maxima(&[0.0, 3.0, 1.0, 1.0, 5.0, 2.0], &LINE, 1), vec![1, 4]);
        assert_eq!(find_local_maxima(&[2.0, 2.0, 2.0, 2.0, 2.0, 1.0], &LINE, 1), vec![4]);
        assert_eq!(find_local_maxima(&[7.0; 6], &LINE, 1), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(find_local_maxima(&[f64::NAN, 1.0, f64::NAN, 0.0, 1.0, 0.0], &LINE, 1), vec![1, 4]);
    }

    #[test]
    // Purpose
    // -------
    // A wider radius suppresses nearby secondary peaks.
    fn radius_widens_neighbourhood() {
        let surface = [0.0, 3.0, 1.0, 4.0, 0.0, 0.0];

        assert_eq!(find_local_maxima(&surface, &LINE, 1), vec![1, 3]);
        assert_eq!(find_local_maxima(&surface, &LINE, 2), vec![3]);
    }

    #[test]
    // Purpose
    // -------
    // Guesses come best-first and are padded with the best maximum.
    fn select_guesses_sorts_and_pads() {
        let surface = [0.0, 3.0, 1.0, 1.0, 5.0, 2.0];

        assert_eq!(select_guesses(&surface, &LINE, 1, 1), vec![4]);
        assert_eq!(select_guesses(&surface, &LINE, 1, 4), vec![4, 1, 4, 4]);
    }

    #[test]
    // Purpose
    // -------
    // Neighbourhoods span diagonals on a 2-D lattice.
    fn maxima_on_two_dimensional_lattice() {
        let shape = [1, 1, 1, 1, 1, 3, 3];
        #[rustfmt::skip]
        let surface = [
            1.0, 0.0, 0.0,
            0.0, 0.0, 0.0,
            0.0, 0.0, 2.0,
        ];

        assert_eq!(find_local_maxima(&surface, &shape, 1), vec![0, 8]);
        let peak_diag = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 3.0];
        assert_eq!(find_local_maxima(&peak_diag, &shape, 1), vec![8]);
    }

    #[test]
    // Purpose
    // -------
    // The initializer returns exactly `num_guesses` vectors inside the
    // configured bounds, and favours the emitter intensity that generated
    // the trace.
    //
    // Given
    // -----
    // A noiseless-ish on/off trace at r_e = 50 over background 5.
    fn initial_guesses_are_in_bounds() {
        let trace = array![5.0, 55.0, 56.0, 4.0, 6.0, 54.0, 55.0, 55.0, 5.0, 4.0, 56.0, 5.0];
        let ranges = ParameterRanges {
            r_e: Range::new(10.0, 100.0, 10),
            r_bg: Range::fixed(5.0),
            mu_ro: Range::fixed(0.0),
            sigma_ro: Range::fixed(1.0),
            gain: Range::fixed(1.0),
            p_on: Range::new(0.1, 0.9, 5),
            p_off: Range::new(0.1, 0.9, 5),
        };

        let guesses = initial_guesses(trace.view(), 1, &ranges, 3);

        assert_eq!(guesses.len(), 3);
        for g in &guesses {
            for (v, r) in g.to_values().iter().zip(ranges.as_array()) {
                assert!(*v >= r.min && *v <= r.max);
            }
        }
        assert_eq!(guesses[0].r_e, 50.0);
    }
}
