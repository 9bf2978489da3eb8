//! Fit and apply functions behind [`super::AlignStep`].
//!
//! Both functions take the settings by reference and return new values; the
//! step decides whether to store them.

use anyhow::{ensure, Context, Result};
use log::info;
use marker_align_core::{
    apply_transform, match_markers, AlignError, NamedPoint, NamedPointSet, Real, TransformParams,
};
use marker_align_optim::{optimize_marker_alignment, SolveReport};

use crate::context::FitterContext;

use super::problem::{AlignConfig, AlignSettings};

/// Outcome of fitting the model markers onto the data markers.
#[derive(Debug, Clone)]
pub struct MarkerFit {
    /// Fitted transform, translation in absolute units.
    pub params: TransformParams,
    /// Number of matched marker pairs used in the fit.
    pub matched: usize,
    pub unmatched_model: Vec<String>,
    pub unmatched_data: Vec<String>,
    /// RMS distance between transformed model markers and data markers.
    pub rms_error: Real,
    pub report: SolveReport,
}

/// Outcome of a full align run.
#[derive(Debug, Clone)]
pub struct AlignOutcome {
    /// Settings after the run; parameters replaced when a marker fit ran.
    pub settings: AlignSettings,
    pub marker_fit: Option<MarkerFit>,
    /// Number of model coordinates transformed.
    pub transformed: usize,
}

/// Fit the similarity transform taking model markers onto data markers.
///
/// Raw samples with repeated names are centroided before matching.
///
/// # Errors
///
/// - [`AlignError::Precondition`] on ambiguous names (reject policy) or an
///   unusable objective,
/// - [`AlignError::InsufficientCorrespondence`] when fewer than 3 markers match,
/// - [`AlignError::OptimizationFailed`] when the solve does not converge.
pub fn fit_to_markers(
    model_markers: &[NamedPoint],
    data_markers: &[NamedPoint],
    data_scale: Real,
    config: &AlignConfig,
) -> Result<MarkerFit> {
    let model = NamedPointSet::from_samples(model_markers);
    let data = NamedPointSet::from_samples(data_markers);

    let matched = match_markers(&model, &data, &config.match_options())?;
    let estimate = optimize_marker_alignment(&matched.correspondence, data_scale, &config.solve)
        .inspect_err(|e| {
            if config.report_solver() {
                info!("Align: marker fit failed: {e}");
            }
        })?;

    if config.report_solver() {
        info!(
            "Align: solver {} after {} evaluations, cost {:.6e}, rms error {:.6e}",
            estimate.report.termination,
            estimate.report.iterations,
            estimate.report.final_cost,
            estimate.rms_error
        );
    }

    Ok(MarkerFit {
        params: estimate.params,
        matched: matched.len(),
        unmatched_model: matched.unmatched_model,
        unmatched_data: matched.unmatched_data,
        rms_error: estimate.rms_error,
        report: estimate.report,
    })
}

/// Run the align step against a fitter.
///
/// With `align_markers` set, the transform is first fitted to the markers.
/// The resulting (or stored) transform is then applied to all model
/// coordinates, reference coordinates are updated and data projections
/// recomputed.
pub fn run_align<C: FitterContext + ?Sized>(
    settings: &AlignSettings,
    config: &AlignConfig,
    ctx: &mut C,
) -> Result<AlignOutcome> {
    ensure!(
        ctx.model_coordinates().is_some(),
        AlignError::Precondition("Align: missing model coordinates".to_string())
    );

    let mut settings = *settings;
    let marker_fit = if settings.align_markers {
        let model_markers = ctx.model_marker_points().ok_or_else(|| {
            AlignError::Precondition("Align: no marker group to align with".to_string())
        })?;
        let data_markers = ctx.data_marker_points().ok_or_else(|| {
            AlignError::Precondition("Align: no marker data to align with".to_string())
        })?;
        let fit = fit_to_markers(&model_markers, &data_markers, ctx.data_scale(), config)
            .context("Align: alignment to markers failed")?;
        settings.params = fit.params;
        Some(fit)
    } else {
        None
    };

    settings.params.validate()?;
    let transformed = {
        let coordinates = ctx
            .model_coordinates()
            .context("Align: model coordinates disappeared during the fit")?;
        apply_transform(coordinates, &settings.params, 1.0)
    };
    let count = transformed.len();
    ctx.set_model_coordinates(transformed)
        .context("Align: failed to transform model")?;
    ctx.update_model_reference_coordinates();
    ctx.calculate_data_projections();

    Ok(AlignOutcome {
        settings,
        marker_fit,
        transformed: count,
    })
}
