//! Settings and configuration types for the align step.

use marker_align_core::{AlignError, AmbiguityPolicy, MatchOptions, Real, TransformParams};
use marker_align_optim::SolveOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag identifying an align step record in a serialized fitter.
pub const ALIGN_STEP_TYPE_ID: &str = "_FitterStepAlign";

/// Persisted settings of one align step.
///
/// These are the inputs of a run: whether to fit to markers first, and the
/// transform applied to the model. A marker fit replaces `params`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlignSettings {
    /// Fit the transform to markers before applying it.
    pub align_markers: bool,
    pub params: TransformParams,
}

/// On-disk layout of [`AlignSettings`].
///
/// Rotation and translation are kept loose so wrong lengths are reported as
/// invalid settings rather than as a generic parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AlignSettingsRecord {
    #[serde(rename = "_FitterStepAlign")]
    type_tag: bool,
    #[serde(rename = "alignMarkers")]
    align_markers: bool,
    rotation: Vec<Real>,
    scale: Real,
    translation: Vec<Real>,
}

impl AlignSettings {
    /// Encode as a record value ready for embedding in a fitter document.
    pub fn to_record(&self) -> Value {
        let record = AlignSettingsRecord {
            type_tag: true,
            align_markers: self.align_markers,
            rotation: self.params.rotation.to_vec(),
            scale: self.params.scale,
            translation: self.params.translation.to_vec(),
        };
        // Plain bools and floats; serialization cannot fail.
        serde_json::to_value(record).unwrap_or(Value::Null)
    }

    /// Decode a record produced by [`AlignSettings::to_record`].
    ///
    /// # Errors
    ///
    /// [`AlignError::InvalidSettings`] when the type tag or a field is missing,
    /// or the transform values are malformed.
    pub fn from_record(value: &Value) -> Result<Self, AlignError> {
        if value.get(ALIGN_STEP_TYPE_ID).is_none() {
            return Err(AlignError::InvalidSettings(format!(
                "missing type tag '{ALIGN_STEP_TYPE_ID}'"
            )));
        }
        let record: AlignSettingsRecord = serde_json::from_value(value.clone())
            .map_err(|e| AlignError::InvalidSettings(e.to_string()))?;
        let params =
            TransformParams::from_slices(&record.rotation, record.scale, &record.translation)
                .map_err(|e| AlignError::InvalidSettings(e.to_string()))?;
        Ok(Self {
            align_markers: record.align_markers,
            params,
        })
    }

    pub fn encode_json(&self) -> String {
        self.to_record().to_string()
    }

    pub fn decode_json(json: &str) -> Result<Self, AlignError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| AlignError::InvalidSettings(e.to_string()))?;
        Self::from_record(&value)
    }
}

/// Run-time configuration of the align step. Not persisted with the settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// 0: silent, 1: marker match messages, 2: also the solver report.
    pub diagnostic_level: u32,
    /// Handling of data markers that fold to the same name.
    pub ambiguity: AmbiguityPolicy,
    pub solve: SolveOptions,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            diagnostic_level: 0,
            ambiguity: AmbiguityPolicy::PreferExact,
            solve: SolveOptions::default(),
        }
    }
}

impl AlignConfig {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            diagnostics: self.diagnostic_level > 0,
            ambiguity: self.ambiguity,
        }
    }

    pub fn report_solver(&self) -> bool {
        self.diagnostic_level > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn non_default() -> AlignSettings {
        AlignSettings {
            align_markers: true,
            params: TransformParams {
                rotation: [0.1, -2.345678901234567, 3.0e-7],
                scale: 1.0 / 3.0,
                translation: [123.456, -0.000001, 7.0e12],
            },
        }
    }

    #[test]
    fn record_has_type_tag_and_fields() {
        let value = non_default().to_record();
        assert_eq!(value[ALIGN_STEP_TYPE_ID], json!(true));
        assert_eq!(value["alignMarkers"], json!(true));
        assert_eq!(value["rotation"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["translation"].as_array().map(Vec::len), Some(3));
        assert!(value["scale"].is_number());
    }

    #[test]
    fn json_roundtrip_is_exact() {
        for settings in [AlignSettings::default(), non_default()] {
            let first = settings.encode_json();
            let decoded = AlignSettings::decode_json(&first).unwrap();
            assert_eq!(decoded, settings);
            assert_eq!(decoded.encode_json(), first);
        }
    }

    #[test]
    fn missing_type_tag_is_rejected() {
        let value = json!({
            "alignMarkers": false,
            "rotation": [0.0, 0.0, 0.0],
            "scale": 1.0,
            "translation": [0.0, 0.0, 0.0]
        });
        assert!(matches!(
            AlignSettings::from_record(&value),
            Err(AlignError::InvalidSettings(_))
        ));
    }

    #[test]
    fn missing_field_is_rejected() {
        let value = json!({
            "_FitterStepAlign": true,
            "alignMarkers": false,
            "rotation": [0.0, 0.0, 0.0],
            "translation": [0.0, 0.0, 0.0]
        });
        assert!(AlignSettings::from_record(&value).is_err());
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        let value = json!({
            "_FitterStepAlign": true,
            "alignMarkers": false,
            "rotation": [0.0, 0.0],
            "scale": 1.0,
            "translation": [0.0, 0.0, 0.0]
        });
        let err = AlignSettings::from_record(&value).unwrap_err();
        assert!(err.to_string().contains("rotation"), "{err}");
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: AlignConfig = serde_json::from_str(r#"{ "diagnostic_level": 2 }"#).unwrap();
        assert_eq!(config.diagnostic_level, 2);
        assert_eq!(config.solve, SolveOptions::default());
        assert!(config.match_options().diagnostics);
        assert!(config.report_solver());
        assert!(!AlignConfig::default().match_options().diagnostics);
        assert_eq!(config.ambiguity, AmbiguityPolicy::PreferExact);

        let first: AlignConfig = serde_json::from_str(r#"{ "ambiguity": "First" }"#).unwrap();
        assert_eq!(first.match_options().ambiguity, AmbiguityPolicy::First);
    }
}
