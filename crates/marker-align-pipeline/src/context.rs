//! Fitter collaborators consumed by the align step.
//!
//! The align step does not own geometry. It reads model coordinates and marker
//! positions through [`FitterContext`] and writes the transformed coordinates
//! back through it. [`InMemoryFitter`] is a plain point-cloud implementation.

use log::warn;
use marker_align_core::{AlignError, NamedPoint, Pt3, Real};
use marker_align_optim::data_scale_of;
use serde::{Deserialize, Serialize};

/// Geometry and marker access needed by the align step.
pub trait FitterContext {
    /// Current model coordinates, `None` when the model has no coordinate field.
    fn model_coordinates(&self) -> Option<&[Pt3]>;

    /// Replace the model coordinates with transformed ones.
    ///
    /// # Errors
    ///
    /// [`AlignError::ApplyFailed`] if not every coordinate could be assigned.
    fn set_model_coordinates(&mut self, coordinates: Vec<Pt3>) -> Result<(), AlignError>;

    /// Re-derive reference coordinates after the model moved.
    fn update_model_reference_coordinates(&mut self);

    /// Raw model marker samples, `None` without a marker group.
    ///
    /// Repeated names are centroided by the caller.
    fn model_marker_points(&self) -> Option<Vec<NamedPoint>>;

    /// Raw data marker samples, `None` without data markers.
    fn data_marker_points(&self) -> Option<Vec<NamedPoint>>;

    /// Characteristic length of the data.
    fn data_scale(&self) -> Real;

    /// Recompute projections of data points onto the model.
    fn calculate_data_projections(&mut self);
}

/// A named marker attached to a model node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerNode {
    pub name: String,
    /// Index into the model coordinates.
    pub node: usize,
}

/// Point-cloud fitter holding model nodes, model markers and data.
///
/// Model markers live on model nodes, so they move with the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryFitter {
    pub model_coordinates: Option<Vec<Pt3>>,
    pub model_markers: Option<Vec<MarkerNode>>,
    pub data_markers: Option<Vec<NamedPoint>>,
    /// Unnamed data points.
    pub data_points: Vec<Pt3>,
    /// Overrides the data scale computed from the data extent.
    pub data_scale: Option<Real>,

    /// Model coordinates captured by the last reference update.
    #[serde(skip)]
    pub reference_coordinates: Vec<Pt3>,
    /// Nearest model node for each data point, then each data marker.
    #[serde(skip)]
    pub data_projections: Vec<usize>,
}

impl InMemoryFitter {
    pub fn new(model_coordinates: Vec<Pt3>) -> Self {
        Self {
            reference_coordinates: model_coordinates.clone(),
            model_coordinates: Some(model_coordinates),
            ..Default::default()
        }
    }

    pub fn with_model_markers(mut self, markers: Vec<MarkerNode>) -> Self {
        self.model_markers = Some(markers);
        self
    }

    pub fn with_data_markers(mut self, markers: Vec<NamedPoint>) -> Self {
        self.data_markers = Some(markers);
        self
    }

    pub fn with_data_points(mut self, points: Vec<Pt3>) -> Self {
        self.data_points = points;
        self
    }

    fn all_data_points(&self) -> Vec<Pt3> {
        let markers = self.data_markers.iter().flatten().map(|m| m.point);
        self.data_points.iter().copied().chain(markers).collect()
    }
}

impl FitterContext for InMemoryFitter {
    fn model_coordinates(&self) -> Option<&[Pt3]> {
        self.model_coordinates.as_deref()
    }

    fn set_model_coordinates(&mut self, coordinates: Vec<Pt3>) -> Result<(), AlignError> {
        let current = self
            .model_coordinates
            .as_mut()
            .ok_or_else(|| AlignError::ApplyFailed("model has no coordinates".to_string()))?;
        if current.len() != coordinates.len() {
            return Err(AlignError::ApplyFailed(format!(
                "assigned {} coordinates to a model with {} nodes",
                coordinates.len(),
                current.len()
            )));
        }
        *current = coordinates;
        Ok(())
    }

    fn update_model_reference_coordinates(&mut self) {
        self.reference_coordinates = self.model_coordinates.clone().unwrap_or_default();
    }

    fn model_marker_points(&self) -> Option<Vec<NamedPoint>> {
        let coordinates = self.model_coordinates.as_ref()?;
        let markers = self.model_markers.as_ref()?;
        let points = markers
            .iter()
            .filter_map(|m| match coordinates.get(m.node) {
                Some(p) => Some(NamedPoint::new(m.name.clone(), *p)),
                None => {
                    warn!("model marker '{}' refers to missing node {}", m.name, m.node);
                    None
                }
            })
            .collect();
        Some(points)
    }

    fn data_marker_points(&self) -> Option<Vec<NamedPoint>> {
        self.data_markers.clone()
    }

    fn data_scale(&self) -> Real {
        match self.data_scale {
            Some(scale) => scale,
            None => data_scale_of(&self.all_data_points()),
        }
    }

    fn calculate_data_projections(&mut self) {
        let model = self.model_coordinates.as_deref().unwrap_or_default();
        self.data_projections = self
            .all_data_points()
            .iter()
            .filter_map(|d| {
                model
                    .iter()
                    .enumerate()
                    .map(|(idx, m)| (idx, (m - d).norm_squared()))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(idx, _)| idx)
            })
            .collect();
    }
}
