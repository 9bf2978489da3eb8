//! Gross alignment and scaling of the model.
//!
//! `problem` holds the persisted settings and run configuration, `state` the
//! stateful step wrapper, and `steps` the fit and apply functions.

mod problem;
mod state;
mod steps;

pub use problem::{AlignConfig, AlignSettings, ALIGN_STEP_TYPE_ID};
pub use state::AlignStep;
pub use steps::{fit_to_markers, run_align, AlignOutcome, MarkerFit};
