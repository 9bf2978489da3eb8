//! Per-run history of the align step.

use std::time::SystemTime;

use marker_align_core::{AlignError, Real, TransformParams};
use serde::{Deserialize, Serialize};

use crate::align_step::AlignOutcome;

/// What an align run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Parameters were fitted to markers and applied.
    Fitted {
        matched: usize,
        unmatched_model: Vec<String>,
        unmatched_data: Vec<String>,
        rms_error: Real,
        termination: String,
        transformed: usize,
    },
    /// Stored parameters were applied without a fit.
    Applied { transformed: usize },
    /// The run failed; stored parameters were kept.
    Failed {
        /// Error kind when the root cause is an [`AlignError`].
        kind: Option<String>,
        message: String,
    },
}

/// One align run: when it happened, the transform it ended with, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Stored parameters after the run.
    pub params: TransformParams,
    pub outcome: RunOutcome,
}

impl RunRecord {
    pub fn completed(outcome: &AlignOutcome) -> Self {
        let run = match &outcome.marker_fit {
            Some(fit) => RunOutcome::Fitted {
                matched: fit.matched,
                unmatched_model: fit.unmatched_model.clone(),
                unmatched_data: fit.unmatched_data.clone(),
                rms_error: fit.rms_error,
                termination: fit.report.termination.clone(),
                transformed: outcome.transformed,
            },
            None => RunOutcome::Applied {
                transformed: outcome.transformed,
            },
        };
        Self {
            timestamp: unix_seconds(),
            params: outcome.settings.params,
            outcome: run,
        }
    }

    pub fn failed(kept: TransformParams, error: &anyhow::Error) -> Self {
        let kind = error.downcast_ref::<AlignError>().map(error_kind);
        Self {
            timestamp: unix_seconds(),
            params: kept,
            outcome: RunOutcome::Failed {
                kind: kind.map(str::to_string),
                message: format!("{error:#}"),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Failed { .. })
    }

    /// RMS marker error of a fitted run.
    pub fn rms_error(&self) -> Option<Real> {
        match self.outcome {
            RunOutcome::Fitted { rms_error, .. } => Some(rms_error),
            _ => None,
        }
    }
}

fn error_kind(error: &AlignError) -> &'static str {
    match error {
        AlignError::Precondition(_) => "precondition",
        AlignError::InsufficientCorrespondence { .. } => "insufficient_correspondence",
        AlignError::OptimizationFailed { .. } => "optimization_failed",
        AlignError::ApplyFailed(_) => "apply_failed",
        AlignError::InvalidSettings(_) => "invalid_settings",
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align_step::{AlignSettings, MarkerFit};
    use anyhow::Context;
    use marker_align_optim::SolveReport;

    fn fitted_outcome() -> AlignOutcome {
        let params = TransformParams {
            scale: 2.0,
            ..TransformParams::identity()
        };
        AlignOutcome {
            settings: AlignSettings {
                align_markers: true,
                params,
            },
            marker_fit: Some(MarkerFit {
                params,
                matched: 4,
                unmatched_model: vec![],
                unmatched_data: vec!["extra".to_string()],
                rms_error: 1e-3,
                report: SolveReport {
                    iterations: 12,
                    final_cost: 1e-9,
                    converged: true,
                    termination: "ResidualsZero".to_string(),
                },
            }),
            transformed: 6,
        }
    }

    #[test]
    fn fitted_run_keeps_fit_details() {
        let record = RunRecord::completed(&fitted_outcome());
        assert!(record.is_success());
        assert_eq!(record.params.scale, 2.0);
        assert_eq!(record.rms_error(), Some(1e-3));
        match &record.outcome {
            RunOutcome::Fitted {
                matched,
                unmatched_data,
                termination,
                transformed,
                ..
            } => {
                assert_eq!(*matched, 4);
                assert_eq!(unmatched_data, &["extra".to_string()]);
                assert_eq!(termination, "ResidualsZero");
                assert_eq!(*transformed, 6);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(record.timestamp > 0);
    }

    #[test]
    fn applied_run_has_no_rms() {
        let mut outcome = fitted_outcome();
        outcome.marker_fit = None;
        let record = RunRecord::completed(&outcome);
        assert_eq!(record.outcome, RunOutcome::Applied { transformed: 6 });
        assert_eq!(record.rms_error(), None);
    }

    #[test]
    fn failed_run_names_error_kind_through_context() {
        let err = Err::<(), _>(AlignError::InsufficientCorrespondence { found: 2 })
            .context("Align: alignment to markers failed")
            .unwrap_err();
        let record = RunRecord::failed(TransformParams::identity(), &err);
        assert!(!record.is_success());
        match &record.outcome {
            RunOutcome::Failed { kind, message } => {
                assert_eq!(kind.as_deref(), Some("insufficient_correspondence"));
                assert!(message.contains("only 2 markers"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let plain = RunRecord::failed(TransformParams::identity(), &anyhow::anyhow!("io"));
        assert!(matches!(plain.outcome, RunOutcome::Failed { kind: None, .. }));
    }

    #[test]
    fn record_serializes_with_status_tag() {
        let record = RunRecord::completed(&fitted_outcome());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["outcome"]["status"], "fitted");
        let restored: RunRecord = serde_json::from_value(value).unwrap();
        assert_eq!(restored, record);
    }
}
