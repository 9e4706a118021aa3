//! Likelihood models built on the core occupancy chain and emission model.

pub mod trace_model;

pub use self::trace_model::{
    TraceModel, forward_log_likelihood, trace_log_likelihood, trace_log_likelihood_and_grad,
};
