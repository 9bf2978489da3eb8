//! Stateful align step as owned by a fitter pipeline.

use anyhow::Result;
use marker_align_core::{AlignError, Real, TransformParams};
use serde_json::Value;

use crate::context::FitterContext;
use crate::step_log::RunRecord;

use super::problem::{AlignConfig, AlignSettings};
use super::steps::{run_align, MarkerFit};

/// Align step: stored settings plus run bookkeeping.
///
/// Setters report whether the stored value changed so callers can skip
/// redundant re-runs; they never trigger recomputation themselves.
#[derive(Debug, Clone, Default)]
pub struct AlignStep {
    settings: AlignSettings,
    /// Run-time configuration (diagnostics, solver options).
    pub config: AlignConfig,
    has_run: bool,
    last_fit: Option<MarkerFit>,
    /// One record per run, oldest first.
    pub log: Vec<RunRecord>,
}

impl AlignStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AlignConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Restore a step from a persisted settings record.
    pub fn from_record(value: &Value) -> Result<Self, AlignError> {
        Ok(Self {
            settings: AlignSettings::from_record(value)?,
            ..Self::default()
        })
    }

    pub fn encode_settings(&self) -> Value {
        self.settings.to_record()
    }

    /// Replace the stored settings with a decoded record.
    pub fn decode_settings(&mut self, value: &Value) -> Result<(), AlignError> {
        self.settings = AlignSettings::from_record(value)?;
        Ok(())
    }

    pub fn settings(&self) -> &AlignSettings {
        &self.settings
    }

    pub fn params(&self) -> &TransformParams {
        &self.settings.params
    }

    pub fn is_align_markers(&self) -> bool {
        self.settings.align_markers
    }

    pub fn rotation(&self) -> [Real; 3] {
        self.settings.params.rotation
    }

    pub fn scale(&self) -> Real {
        self.settings.params.scale
    }

    pub fn translation(&self) -> [Real; 3] {
        self.settings.params.translation
    }

    pub fn has_run(&self) -> bool {
        self.has_run
    }

    /// Details of the marker fit performed by the last successful run, if any.
    pub fn last_marker_fit(&self) -> Option<&MarkerFit> {
        self.last_fit.as_ref()
    }

    /// Returns `true` if the flag changed.
    pub fn set_align_markers(&mut self, align_markers: bool) -> bool {
        replace_if_changed(&mut self.settings.align_markers, align_markers)
    }

    /// Set euler angles in radians: azimuth (z), elevation (rotated y), roll (rotated x).
    ///
    /// Returns `true` if any angle changed.
    pub fn set_rotation(&mut self, rotation: [Real; 3]) -> bool {
        replace_if_changed(&mut self.settings.params.rotation, rotation)
    }

    /// Returns `true` if the scale changed.
    pub fn set_scale(&mut self, scale: Real) -> bool {
        replace_if_changed(&mut self.settings.params.scale, scale)
    }

    /// Returns `true` if any component changed.
    pub fn set_translation(&mut self, translation: [Real; 3]) -> bool {
        replace_if_changed(&mut self.settings.params.translation, translation)
    }

    /// Fit to markers if enabled, then transform the model with the stored parameters.
    ///
    /// On failure the stored parameters are left as they were before the call.
    pub fn run<C: FitterContext + ?Sized>(&mut self, ctx: &mut C) -> Result<()> {
        match run_align(&self.settings, &self.config, ctx) {
            Ok(outcome) => {
                self.log.push(RunRecord::completed(&outcome));
                self.settings = outcome.settings;
                self.has_run = true;
                self.last_fit = outcome.marker_fit;
                Ok(())
            }
            Err(e) => {
                self.log.push(RunRecord::failed(self.settings.params, &e));
                Err(e)
            }
        }
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
