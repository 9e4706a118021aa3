//! Executor plumbing shared by every L-BFGS variant.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        traits::{LogLikelihood, MLEOptions, OptimOutcome},
        types::{Grad, Theta},
    },
};
use argmin::core::{CostFunction, Executor, IterState, Solver, State};
use log::debug;

/// Run `solver` on `problem` starting from `theta0` and normalize the result.
///
/// `max_iter` from `opts` is applied to the executor. With feature
/// `obs_slog` and `opts.verbose`, a terminal observer reports every
/// iteration.
///
/// # Errors
/// Any argmin failure, mapped through `From<argmin::core::Error>`, and
/// validation failures of the final state.
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, IterState<Theta, Grad, (), (), (), f64>> + Send + 'static,
{
    if opts.verbose {
        debug!("L-BFGS start: loglik = {:.6}", -problem.cost(&theta0)?);
    }

    let mut executor = Executor::new(problem, solver).configure(|state| state.param(theta0));
    if let Some(max_iter) = opts.tols.max_iter {
        executor = executor.configure(|state| state.max_iters(max_iter as u64));
    }
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        executor = executor.add_observer(
            argmin_observer_slog::SlogLogger::term_noblock(),
            argmin::core::observers::ObserverMode::Always,
        );
    }

    let mut state = executor.run()?.state().clone();
    let iterations = state.get_iter();
    let fn_evals = state.get_func_counts().clone();
    let termination = state.get_termination_status().clone();
    let grad = state.take_gradient();
    OptimOutcome::new(
        state.take_best_param(),
        -state.get_best_cost(),
        termination,
        iterations,
        fn_evals,
        grad,
    )
}
