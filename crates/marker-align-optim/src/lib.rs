//! Non-linear least-squares alignment of model markers onto data markers.
//!
//! The crate separates a dense problem description ([`NllsProblem`]) from the
//! solver adapter ([`NllsSolverBackend`], implemented by [`LmBackend`]) so the
//! alignment objective can be evaluated and tested independently of the solve.

pub mod backend_lm;
pub mod problems;
pub mod traits;

pub use crate::backend_lm::LmBackend;
pub use crate::problems::marker_alignment::{
    data_scale_of, optimize_marker_alignment, AlignmentEstimate, MarkerAlignmentProblem,
    PARAM_DIM,
};
pub use crate::traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
