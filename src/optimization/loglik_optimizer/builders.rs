//! L-BFGS solver construction for the two supported line searches.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        traits::MLEOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
};
use argmin::solver::quasinewton::LBFGS;

/// L-BFGS with a Hager–Zhang line search, configured from `opts`.
///
/// # Errors
/// Propagates argmin's rejection of a tolerance as an `OptError`.
pub fn build_optimizer_hager_zhang(opts: &MLEOptions) -> OptResult<LbfgsHagerZhang> {
    let solver = LBFGS::new(HagerZhangLS::new(), opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM));
    configure_lbfgs(solver, opts)
}

/// L-BFGS with a More–Thuente line search, configured from `opts`.
///
/// # Errors
/// Propagates argmin's rejection of a tolerance as an `OptError`.
pub fn build_optimizer_more_thuente(opts: &MLEOptions) -> OptResult<LbfgsMoreThuente> {
    let solver = LBFGS::new(MoreThuenteLS::new(), opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM));
    configure_lbfgs(solver, opts)
}

/// Apply the optional gradient and cost tolerances. `max_iter` is an
/// executor setting and is handled by [`run_lbfgs`](super::run::run_lbfgs).
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(tol) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(tol)?;
    }
    if let Some(tol) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(tol)?;
    }
    Ok(solver)
}
