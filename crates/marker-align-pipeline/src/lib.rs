//! Alignment fitter step.
//!
//! The step optionally fits a similarity transform (rotation, uniform scale,
//! translation) of the model onto named data markers, then applies its stored
//! transform to the whole model geometry.
//!
//! ```no_run
//! use marker_align_pipeline::{AlignStep, InMemoryFitter};
//! # fn main() -> anyhow::Result<()> {
//! # let mut fitter: InMemoryFitter = unimplemented!();
//!
//! let mut step = AlignStep::new();
//! step.set_align_markers(true);
//! step.run(&mut fitter)?;
//!
//! let record = step.encode_settings();
//! # Ok(())
//! # }
//! ```

pub mod align_step;
pub mod context;
pub mod step_log;

pub use crate::align_step::{
    fit_to_markers, run_align, AlignConfig, AlignOutcome, AlignSettings, AlignStep, MarkerFit,
    ALIGN_STEP_TYPE_ID,
};
pub use crate::context::{FitterContext, InMemoryFitter, MarkerNode};
pub use crate::step_log::{RunOutcome, RunRecord};

// Re-export from the lower layers for convenience
pub use marker_align_core::{
    AlignError, AmbiguityPolicy, NamedPoint, NamedPointSet, Pt3, Real, TransformParams,
};
pub use marker_align_optim::{SolveOptions, SolveReport};
