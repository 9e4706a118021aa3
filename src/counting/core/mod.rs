//! Building blocks of the blinking-emitter model: validated inputs and
//! configuration, the occupancy chain, and the emission model.

pub mod data;
pub mod emission;
pub mod options;
pub mod params;
pub mod ranges;
pub mod transition;

pub use self::data::Traces;
pub use self::options::HyperParameters;
pub use self::params::{NUM_PARAMS, PARAM_NAMES, Parameters};
pub use self::ranges::{ParameterRanges, Range};
