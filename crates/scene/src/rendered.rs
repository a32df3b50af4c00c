use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use foundation::GeoPoint;

use crate::components::{Appearance, FeatureGeometry};

/// Scene-level identity of a visual object.
///
/// Clusters live in their own namespace so a synthetic marker can never
/// collide with a feature id coming from the source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderKey {
    Feature(String),
    /// Keyed by the id of the seed feature that formed the cluster.
    Cluster(String),
}

impl fmt::Display for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderKey::Feature(id) => write!(f, "feature:{id}"),
            RenderKey::Cluster(id) => write!(f, "cluster:{id}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum StyleState {
    #[default]
    Unstyled,
    /// Styled from matched rules.
    Styled,
    /// Styled with the built-in per-geometry default.
    Fallback,
}

impl StyleState {
    pub fn is_styled(&self) -> bool {
        !matches!(self, StyleState::Unstyled)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub key: RenderKey,
    pub geometry: FeatureGeometry,
    pub appearance: Appearance,
    pub style_state: StyleState,
}

impl RenderedFeature {
    pub fn new(key: RenderKey, geometry: FeatureGeometry) -> Self {
        Self {
            key,
            geometry,
            appearance: Appearance::default(),
            style_state: StyleState::Unstyled,
        }
    }

    pub fn id(&self) -> &str {
        match &self.key {
            RenderKey::Feature(id) | RenderKey::Cluster(id) => id,
        }
    }

    pub fn position(&self) -> Option<GeoPoint> {
        self.geometry.anchor()
    }
}

/// Individually rendered features of one layer, keyed by feature id.
///
/// Iteration is in ascending id order.
#[derive(Debug, Default, Clone)]
pub struct RenderedFeatureIndex {
    features: BTreeMap<String, RenderedFeature>,
}

impl RenderedFeatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.features.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&RenderedFeature> {
        self.features.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut RenderedFeature> {
        self.features.get_mut(id)
    }

    /// Inserts `feature` under its id, returning any previous entry.
    pub fn insert(&mut self, feature: RenderedFeature) -> Option<RenderedFeature> {
        self.features.insert(feature.id().to_string(), feature)
    }

    pub fn remove(&mut self, id: &str) -> Option<RenderedFeature> {
        self.features.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.features.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderedFeature> + '_ {
        self.features.values()
    }

    /// Removes every entry whose id is not in `expected`; returns the removed
    /// entries in id order.
    pub fn remove_absent(&mut self, expected: &BTreeSet<String>) -> Vec<RenderedFeature> {
        let stale: Vec<String> = self
            .features
            .keys()
            .filter(|id| !expected.contains(*id))
            .cloned()
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.features.remove(&id))
            .collect()
    }

    /// Empties the index, returning the previous entries in id order.
    pub fn drain(&mut self) -> Vec<RenderedFeature> {
        std::mem::take(&mut self.features).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderKey, RenderedFeature, RenderedFeatureIndex, StyleState};
    use crate::components::FeatureGeometry;
    use std::collections::BTreeSet;

    fn feature(id: &str) -> RenderedFeature {
        RenderedFeature::new(
            RenderKey::Feature(id.to_string()),
            FeatureGeometry::point(0.0, 0.0),
        )
    }

    #[test]
    fn keys_are_unique() {
        let mut index = RenderedFeatureIndex::new();
        assert!(index.insert(feature("a")).is_none());
        assert!(index.insert(feature("a")).is_some());
        assert_eq!(index.len(), 1);
        assert!(index.contains("a"));
    }

    #[test]
    fn remove_absent_keeps_expected_ids() {
        let mut index = RenderedFeatureIndex::new();
        for id in ["c", "a", "b"] {
            index.insert(feature(id));
        }
        let expected: BTreeSet<String> = ["b".to_string()].into_iter().collect();
        let removed: Vec<String> = index
            .remove_absent(&expected)
            .iter()
            .map(|f| f.id().to_string())
            .collect();
        assert_eq!(removed, vec!["a", "c"]);
        assert_eq!(index.ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn new_features_start_unstyled() {
        let f = feature("x");
        assert_eq!(f.style_state, StyleState::Unstyled);
        assert!(!f.style_state.is_styled());
        assert!(StyleState::Fallback.is_styled());
        assert_eq!(f.key.to_string(), "feature:x");
        assert_eq!(RenderKey::Cluster("x".into()).to_string(), "cluster:x");
    }
}
