//! optimization — solvers, numerical helpers, and their error surface.
//!
//! Purpose
//! -------
//! Provide the optimization machinery used to fit emitter-count models
//! without tying it to that model: a batched Adam optimizer, an
//! argmin-backed L-BFGS maximizer for log-likelihoods, and stable transforms
//! between bounded and unbounded parameter spaces.
//!
//! Key behaviors
//! -------------
//! - [`adam`]: advance many independent parameter vectors in lock-step with
//!   per-coordinate learning rates.
//! - [`loglik_optimizer`]: maximize any [`LogLikelihood`] with L-BFGS,
//!   falling back to finite differences when no gradient is supplied.
//! - [`numerical_stability`]: logistic/logit and bounded-interval maps.
//! - [`errors`]: a single [`OptError`] enum with the `OptResult<T>` alias.
//!
//! Conventions
//! -----------
//! - Solvers maximize `ℓ(θ)` by minimizing `c(θ) = -ℓ(θ)`; outcomes report
//!   `ℓ`.
//! - Nothing in this module performs I/O. The L-BFGS runner emits `log`
//!   records only when asked to be verbose.
//!
//! Testing notes
//! -------------
//! Each submodule carries unit tests on toy problems with known optima.
//!
//! [`LogLikelihood`]: loglik_optimizer::LogLikelihood
//! [`OptError`]: errors::OptError

pub mod adam;
pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::adam::{AdamConfig, BatchAdam};
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
