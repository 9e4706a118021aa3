//! Log-likelihood maximization on top of argmin's L-BFGS.
//!
//! Implement [`LogLikelihood`] for a problem, pick [`MLEOptions`], and call
//! [`maximize`]. Costs handed to argmin are `-ℓ(θ)`; outcomes report `ℓ(θ̂)`.
//! Problems without an analytic gradient get a finite-difference one.
//!
//! In this crate the polishing stage of the emitter count estimator is the
//! only caller; the surface itself is problem-agnostic.
pub mod adapter;
pub mod api;
pub mod builders;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

pub use self::api::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
