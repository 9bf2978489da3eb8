//! Name-keyed marker point sets and model/data marker matching.
//!
//! Markers are landmark points carrying a name. Model markers are defined on
//! the reference geometry, data markers come from captured data; pairs are
//! formed by comparing names after trimming whitespace and case folding.

use std::collections::HashMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{centroid, AlignError, Pt3};

/// Minimum number of matched markers for a well-posed similarity fit.
pub const MIN_MARKER_MATCHES: usize = 3;

/// Normalized form of a marker name used for matching.
pub fn normalize_marker_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A single named sample, e.g. one marker node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPoint {
    pub name: String,
    pub point: Pt3,
}

impl NamedPoint {
    pub fn new(name: impl Into<String>, point: Pt3) -> Self {
        Self {
            name: name.into(),
            point,
        }
    }
}

/// Ordered set of named points, one per distinct name.
///
/// Enumeration order is the order in which names were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedPointSet {
    entries: Vec<NamedPoint>,
}

impl NamedPointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw samples, replacing repeated names by their centroid.
    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a NamedPoint>,
    {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Pt3>> = HashMap::new();
        for sample in samples {
            let group = groups.entry(sample.name.clone()).or_insert_with(|| {
                order.push(sample.name.clone());
                Vec::new()
            });
            group.push(sample.point);
        }
        let entries = order
            .into_iter()
            .filter_map(|name| {
                let point = centroid(groups.get(&name)?)?;
                Some(NamedPoint { name, point })
            })
            .collect();
        Self { entries }
    }

    /// Insert or replace the point stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, point: Pt3) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.point = point,
            None => self.entries.push(NamedPoint { name, point }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Pt3> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.point)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedPoint> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn points(&self) -> Vec<Pt3> {
        self.entries.iter().map(|e| e.point).collect()
    }
}

impl FromIterator<(String, Pt3)> for NamedPointSet {
    fn from_iter<T: IntoIterator<Item = (String, Pt3)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (name, point) in iter {
            set.insert(name, point);
        }
        set
    }
}

/// One matched model/data marker pair, keyed by the model marker name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPair {
    pub name: String,
    pub model: Pt3,
    pub data: Pt3,
}

/// Matched marker pairs in model enumeration order.
pub type MarkerCorrespondence = Vec<MarkerPair>;

/// How to treat several unconsumed data markers folding to the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmbiguityPolicy {
    /// Prefer a candidate with the exact model name, else the first in data order.
    #[default]
    PreferExact,
    /// Take the first candidate in data order.
    First,
    /// Fail the match with a precondition error.
    Reject,
}

/// Options for [`match_markers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Log matched and unmatched markers.
    pub diagnostics: bool,
    pub ambiguity: AmbiguityPolicy,
}

/// Result of matching model markers against data markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerMatch {
    pub correspondence: MarkerCorrespondence,
    /// Model marker names without a data counterpart.
    pub unmatched_model: Vec<String>,
    /// Data marker names left over after matching.
    pub unmatched_data: Vec<String>,
}

impl MarkerMatch {
    pub fn len(&self) -> usize {
        self.correspondence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correspondence.is_empty()
    }

    /// True when enough pairs exist for a similarity fit.
    pub fn is_sufficient(&self) -> bool {
        self.correspondence.len() >= MIN_MARKER_MATCHES
    }
}

/// Pair model markers with data markers by normalized name.
///
/// Model markers are visited in enumeration order. Each data marker is
/// consumed by at most one model marker. When several unconsumed data markers
/// share the normalized name, [`MatchOptions::ambiguity`] picks one or fails.
/// The ambiguity warning, like every other message, is only logged with
/// diagnostics enabled.
///
/// Returning fewer than [`MIN_MARKER_MATCHES`] pairs is not an error here.
pub fn match_markers(
    model: &NamedPointSet,
    data: &NamedPointSet,
    opts: &MatchOptions,
) -> Result<MarkerMatch, AlignError> {
    let data_keys: Vec<String> = data.names().map(normalize_marker_name).collect();
    let mut consumed = vec![false; data.len()];
    let mut result = MarkerMatch::default();

    for model_marker in model.iter() {
        let key = normalize_marker_name(&model_marker.name);
        let candidates: Vec<usize> = data_keys
            .iter()
            .enumerate()
            .filter(|(idx, k)| !consumed[*idx] && **k == key)
            .map(|(idx, _)| idx)
            .collect();

        let Some(&first) = candidates.first() else {
            if opts.diagnostics {
                info!("Align: model marker '{}' not found in data", model_marker.name);
            }
            result.unmatched_model.push(model_marker.name.clone());
            continue;
        };

        let chosen = match opts.ambiguity {
            AmbiguityPolicy::PreferExact => candidates
                .iter()
                .copied()
                .find(|&idx| data.entries[idx].name == model_marker.name)
                .unwrap_or(first),
            AmbiguityPolicy::First | AmbiguityPolicy::Reject => first,
        };

        if candidates.len() > 1 {
            let names: Vec<&str> = candidates
                .iter()
                .map(|&idx| data.entries[idx].name.as_str())
                .collect();
            match opts.ambiguity {
                AmbiguityPolicy::Reject => {
                    return Err(AlignError::Precondition(format!(
                        "model marker '{}' matches several data markers {:?}",
                        model_marker.name, names
                    )));
                }
                _ if opts.diagnostics => warn!(
                    "Align: model marker '{}' matches several data markers {:?}, using '{}'",
                    model_marker.name, names, data.entries[chosen].name
                ),
                _ => {}
            }
        }

        consumed[chosen] = true;
        let data_marker = &data.entries[chosen];
        if opts.diagnostics {
            if data_marker.name == model_marker.name {
                info!("Align: model marker '{}' found in data", model_marker.name);
            } else {
                info!(
                    "Align: model marker '{}' found in data as '{}'",
                    model_marker.name, data_marker.name
                );
            }
        }
        result.correspondence.push(MarkerPair {
            name: model_marker.name.clone(),
            model: model_marker.point,
            data: data_marker.point,
        });
    }

    for (idx, data_marker) in data.entries.iter().enumerate() {
        if consumed[idx] {
            continue;
        }
        if opts.diagnostics {
            info!("Align: data marker '{}' not found in model", data_marker.name);
        }
        result.unmatched_data.push(data_marker.name.clone());
    }

    Ok(result)
}
