//! Numerically robust transforms used to hand box-constrained parameters to
//! unconstrained solvers.
//!
//! Conventions
//! -----------
//! - Inputs are assumed finite; validation happens in the calling layer.
//! - No logging, no I/O, no allocation. Safe inside inner loops.

pub mod transformations;

pub use self::transformations::{
    LOGIT_EPS, from_bounded, safe_logistic, safe_logit, to_bounded, to_bounded_deriv,
};

pub mod prelude {
    pub use super::transformations::{from_bounded, safe_logistic, safe_logit, to_bounded};
}
