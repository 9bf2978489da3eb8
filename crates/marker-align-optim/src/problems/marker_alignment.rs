//! Similarity alignment of model markers onto data markers.
//!
//! Parameter vector layout (`PARAM_DIM = 7`):
//! - `x[0..3]` euler angles (azimuth, elevation, roll) in radians,
//! - `x[3]` uniform scale,
//! - `x[4..7]` translation in units of the data scale.
//!
//! Residuals are `(data - (s * R * model + data_scale * x[4..7])) / data_scale`,
//! three rows per marker pair. Expressing translation and residuals relative to
//! the data scale keeps all seven parameters near unit magnitude.

use marker_align_core::{
    euler_rotation_derivatives, max_extent, AlignError, MarkerPair, Pt3, Real, TransformParams,
    MIN_MARKER_MATCHES,
};
use nalgebra::{DMatrix, DVector};

use crate::{LmBackend, NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};

/// Number of optimized parameters: 3 angles, 1 scale, 3 translation offsets.
pub const PARAM_DIM: usize = 7;

/// Characteristic length of a point set: its largest bounding-box extent.
///
/// Falls back to `1.0` when the set is empty or collapses to a point.
pub fn data_scale_of(points: &[Pt3]) -> Real {
    let extent = max_extent(points);
    if extent.is_finite() && extent > 0.0 {
        extent
    } else {
        1.0
    }
}

/// Least-squares objective over matched marker pairs.
///
/// The point collections are assembled once up front; evaluation only reads them.
#[derive(Debug, Clone)]
pub struct MarkerAlignmentProblem {
    model: Vec<Pt3>,
    data: Vec<Pt3>,
    data_scale: Real,
}

impl MarkerAlignmentProblem {
    /// Build the objective from matched pairs and the conditioning data scale.
    ///
    /// # Errors
    ///
    /// [`AlignError::Precondition`] when there are no pairs, a point is not
    /// finite, or `data_scale` is not a positive finite number.
    pub fn new(correspondence: &[MarkerPair], data_scale: Real) -> Result<Self, AlignError> {
        if correspondence.is_empty() {
            return Err(AlignError::Precondition(
                "no marker pairs to build the alignment objective from".to_string(),
            ));
        }
        if !data_scale.is_finite() || data_scale <= 0.0 {
            return Err(AlignError::Precondition(format!(
                "data scale must be positive and finite, got {data_scale}"
            )));
        }
        if let Some(bad) = correspondence
            .iter()
            .find(|p| !p.model.coords.iter().chain(p.data.coords.iter()).all(|v| v.is_finite()))
        {
            return Err(AlignError::Precondition(format!(
                "marker '{}' has non-finite coordinates",
                bad.name
            )));
        }

        Ok(Self {
            model: correspondence.iter().map(|p| p.model).collect(),
            data: correspondence.iter().map(|p| p.data).collect(),
            data_scale,
        })
    }

    pub fn num_markers(&self) -> usize {
        self.model.len()
    }

    pub fn data_scale(&self) -> Real {
        self.data_scale
    }

    /// Starting point of the solve: zero rotation, unit scale, zero translation.
    pub fn identity_params() -> DVector<Real> {
        Self::params_to_vector(&TransformParams::identity(), 1.0)
    }

    /// Pack parameters with absolute translation into the solver layout.
    pub fn params_to_vector(params: &TransformParams, data_scale: Real) -> DVector<Real> {
        let [r0, r1, r2] = params.rotation;
        let [t0, t1, t2] = params.translation;
        nalgebra::dvector![
            r0,
            r1,
            r2,
            params.scale,
            t0 / data_scale,
            t1 / data_scale,
            t2 / data_scale
        ]
    }

    /// Unpack a solver vector, keeping translation in data-scale units.
    fn conditioned_params(x: &DVector<Real>) -> TransformParams {
        debug_assert_eq!(x.len(), PARAM_DIM);
        TransformParams {
            rotation: [x[0], x[1], x[2]],
            scale: x[3],
            translation: [x[4], x[5], x[6]],
        }
    }

    /// Unpack a solver vector into parameters with absolute translation.
    pub fn vector_to_params(&self, x: &DVector<Real>) -> TransformParams {
        let mut params = Self::conditioned_params(x);
        for t in params.translation.iter_mut() {
            *t *= self.data_scale;
        }
        params
    }
}

impl NllsProblem for MarkerAlignmentProblem {
    fn num_params(&self) -> usize {
        PARAM_DIM
    }

    fn num_residuals(&self) -> usize {
        3 * self.model.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let params = Self::conditioned_params(x);
        let inv_scale = 1.0 / self.data_scale;
        let mut r = DVector::zeros(self.num_residuals());
        for (i, (m, d)) in self.model.iter().zip(self.data.iter()).enumerate() {
            let transformed = params.transform_point(m, self.data_scale);
            let diff = (d - transformed) * inv_scale;
            r.fixed_rows_mut::<3>(3 * i).copy_from(&diff);
        }
        r
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let params = Self::conditioned_params(x);
        let rot = params.rotation_matrix();
        let d_rot = euler_rotation_derivatives(params.rotation);
        let inv_scale = 1.0 / self.data_scale;

        let mut j = DMatrix::zeros(self.num_residuals(), PARAM_DIM);
        for (i, m) in self.model.iter().enumerate() {
            let row = 3 * i;
            for (k, dr) in d_rot.iter().enumerate() {
                let col = -(dr * m.coords) * (params.scale * inv_scale);
                j.fixed_view_mut::<3, 1>(row, k).copy_from(&col);
            }
            let col = -(rot * m.coords) * inv_scale;
            j.fixed_view_mut::<3, 1>(row, 3).copy_from(&col);
            // d(data_scale * tau) / d(tau) divided by data_scale
            for c in 0..3 {
                j[(row + c, 4 + c)] = -1.0;
            }
        }
        j
    }
}

/// Result of a marker alignment solve.
#[derive(Debug, Clone)]
pub struct AlignmentEstimate {
    /// Fitted parameters, translation in absolute units.
    pub params: TransformParams,
    pub report: SolveReport,
    /// Root-mean-square distance between transformed model and data markers.
    pub rms_error: Real,
}

/// Fit rotation, scale and translation mapping model markers onto data markers.
///
/// The solve starts from the identity transform. Euler angles can run into
/// gimbal lock for some orientations; no pre-fit is attempted.
///
/// # Errors
///
/// - [`AlignError::InsufficientCorrespondence`] with fewer than 3 pairs,
/// - [`AlignError::Precondition`] if the objective cannot be built,
/// - [`AlignError::OptimizationFailed`] if the solver does not converge or
///   ends on a degenerate transform.
pub fn optimize_marker_alignment(
    correspondence: &[MarkerPair],
    data_scale: Real,
    opts: &SolveOptions,
) -> Result<AlignmentEstimate, AlignError> {
    optimize_marker_alignment_with(&LmBackend::default(), correspondence, data_scale, opts)
}

/// [`optimize_marker_alignment`] with an explicit solver backend.
pub fn optimize_marker_alignment_with<B: NllsSolverBackend>(
    backend: &B,
    correspondence: &[MarkerPair],
    data_scale: Real,
    opts: &SolveOptions,
) -> Result<AlignmentEstimate, AlignError> {
    if correspondence.len() < MIN_MARKER_MATCHES {
        return Err(AlignError::InsufficientCorrespondence {
            found: correspondence.len(),
        });
    }

    let problem = MarkerAlignmentProblem::new(correspondence, data_scale)?;
    let (x_opt, report) = backend.solve(&problem, MarkerAlignmentProblem::identity_params(), opts);

    if !report.converged {
        return Err(AlignError::OptimizationFailed {
            report: format!("{report:?}"),
        });
    }

    let params = problem.vector_to_params(&x_opt);
    params.validate().map_err(|e| AlignError::OptimizationFailed {
        report: format!("{e}; {report:?}"),
    })?;

    let rms_error = (problem.objective(&x_opt) / problem.num_markers() as Real).sqrt()
        * problem.data_scale();

    Ok(AlignmentEstimate {
        params,
        report,
        rms_error,
    })
}
