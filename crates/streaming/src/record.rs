use std::collections::{BTreeMap, BTreeSet};

use scene::components::FeatureGeometry;
use serde_json::Value;

pub type Properties = BTreeMap<String, Value>;

/// One feature as delivered by a feature service.
///
/// The `is_clustered`, `screen_position` and `number_in_cluster` fields are
/// transient: they are rewritten by every clustering pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: String,
    pub geometry: FeatureGeometry,
    pub properties: Properties,
    pub is_clustered: bool,
    pub screen_position: Option<[f64; 2]>,
    /// Set on the seed of a cluster only.
    pub number_in_cluster: Option<usize>,
}

impl FeatureRecord {
    pub fn new(id: impl Into<String>, geometry: FeatureGeometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties: Properties::new(),
            is_clustered: false,
            screen_position: None,
            number_in_cluster: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn clear_cluster_state(&mut self) {
        self.is_clustered = false;
        self.screen_position = None;
        self.number_in_cluster = None;
    }
}

/// Merges `delta` onto `retained` by id.
///
/// A record whose id is already retained replaces the old one in place; new
/// ids are appended in delta order. Returns the number of replaced records.
pub fn merge_by_id(retained: &mut Vec<FeatureRecord>, delta: Vec<FeatureRecord>) -> usize {
    let mut positions: BTreeMap<String, usize> = retained
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), i))
        .collect();

    let mut replaced = 0;
    for record in delta {
        match positions.get(&record.id) {
            Some(&i) => {
                retained[i] = record;
                replaced += 1;
            }
            None => {
                positions.insert(record.id.clone(), retained.len());
                retained.push(record);
            }
        }
    }
    replaced
}

/// Drops later records whose id was already seen; the first occurrence wins.
pub fn dedupe_by_id(records: Vec<FeatureRecord>) -> Vec<FeatureRecord> {
    let mut seen = BTreeSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}
