//! Screen-space clustering of dense feature neighbourhoods.
//!
//! The pass is greedy and order-dependent: features are visited in input
//! order and each unclaimed feature claims every unclaimed neighbour inside
//! its pixel window. Different input orders can yield different clusters.

use foundation::{Aabb2, GeoPoint};
use scene::spatial::{IndexedPoint, PointIndex};
use streaming::FeatureRecord;

use crate::viewport::{CameraPose, Viewport};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClusterParams {
    /// Side of the square neighbour window, in pixels.
    pub minimum_distance_px: f64,
    pub minimum_cluster_size: usize,
}

impl ClusterParams {
    /// `minimum_cluster_size` is clamped to at least 2.
    pub fn new(minimum_distance_px: f64, minimum_cluster_size: usize) -> Self {
        Self {
            minimum_distance_px,
            minimum_cluster_size: minimum_cluster_size.max(2),
        }
    }
}

/// When clustering is worth doing at all.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DensityRule {
    pub altitude_m: f64,
    pub feature_threshold: usize,
}

impl DensityRule {
    pub fn holds(&self, camera: &CameraPose, feature_count: usize) -> bool {
        camera.height_m() > self.altitude_m || feature_count > self.feature_threshold
    }
}

/// Synthetic marker standing in for several features.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Id of the feature whose window formed the cluster.
    pub seed_id: String,
    pub location: GeoPoint,
    pub screen_position: [f64; 2],
    /// Member ids in input order; includes the seed.
    pub member_ids: Vec<String>,
}

impl Cluster {
    pub fn count(&self) -> usize {
        self.member_ids.len()
    }
}

/// Result of one pass, as indices into the input slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterPass {
    pub clusters: Vec<Cluster>,
    pub individual: Vec<usize>,
    /// Features that could not be projected; neither rendered nor clustered.
    pub unprojected: Vec<usize>,
}

impl ClusterPass {
    /// Every feature rendered on its own; transient cluster state cleared.
    pub fn all_individual(records: &mut [FeatureRecord]) -> Self {
        for record in records.iter_mut() {
            record.clear_cluster_state();
        }
        Self {
            clusters: Vec::new(),
            individual: (0..records.len()).collect(),
            unprojected: Vec::new(),
        }
    }

    pub fn clustered_count(&self) -> usize {
        self.clusters.iter().map(Cluster::count).sum()
    }
}

pub fn cluster_features(
    records: &mut [FeatureRecord],
    viewport: &dyn Viewport,
    params: &ClusterParams,
) -> ClusterPass {
    let mut anchors: Vec<Option<GeoPoint>> = Vec::with_capacity(records.len());
    let mut points = Vec::with_capacity(records.len());
    for (slot, record) in records.iter_mut().enumerate() {
        record.clear_cluster_state();
        let anchor = record.geometry.anchor();
        record.screen_position = anchor.and_then(|p| viewport.project(p));
        if let Some(position) = record.screen_position {
            points.push(IndexedPoint { slot, position });
        }
        anchors.push(anchor);
    }
    let index = PointIndex::build(points);

    let min_size = params.minimum_cluster_size.max(2);
    let mut claimed = vec![false; records.len()];
    let mut clusters = Vec::new();

    for seed in 0..records.len() {
        if claimed[seed] {
            continue;
        }
        let (Some(position), Some(location)) = (records[seed].screen_position, anchors[seed])
        else {
            continue;
        };

        let window = Aabb2::square(position, params.minimum_distance_px);
        let neighbours: Vec<usize> = index
            .query_window(&window)
            .into_iter()
            .filter(|&slot| !claimed[slot])
            .collect();
        if neighbours.len() < min_size {
            continue;
        }

        for &slot in &neighbours {
            claimed[slot] = true;
            records[slot].is_clustered = true;
        }
        records[seed].number_in_cluster = Some(neighbours.len());
        clusters.push(Cluster {
            seed_id: records[seed].id.clone(),
            location,
            screen_position: position,
            member_ids: neighbours.iter().map(|&s| records[s].id.clone()).collect(),
        });
    }

    let mut individual = Vec::new();
    let mut unprojected = Vec::new();
    for (slot, record) in records.iter().enumerate() {
        if record.screen_position.is_none() {
            unprojected.push(slot);
        } else if !claimed[slot] {
            individual.push(slot);
        }
    }

    ClusterPass {
        clusters,
        individual,
        unprojected,
    }
}

#[cfg(test)]
mod tests {
    use super::{ClusterParams, ClusterPass, DensityRule, cluster_features};
    use crate::viewport::{CameraPose, Viewport};
    use foundation::GeoPoint;
    use scene::components::FeatureGeometry;
    use std::collections::BTreeSet;
    use streaming::FeatureRecord;

    /// 1000 px per degree; anything west of -90° is "off-screen".
    struct Linear;

    impl Viewport for Linear {
        fn project(&self, p: GeoPoint) -> Option<[f64; 2]> {
            (p.lon >= -90.0).then_some([p.lon * 1000.0, p.lat * 1000.0])
        }

        fn camera(&self) -> CameraPose {
            CameraPose::new(GeoPoint::with_height(0.0, 0.0, 5_000_000.0))
        }
    }

    fn rec(id: &str, lon: f64, lat: f64) -> FeatureRecord {
        FeatureRecord::new(id, FeatureGeometry::point(lon, lat))
    }

    fn ids(records: &[FeatureRecord], slots: &[usize]) -> Vec<String> {
        slots.iter().map(|&s| records[s].id.clone()).collect()
    }

    #[test]
    fn two_close_points_cluster_and_the_far_one_stays_alone() {
        let mut records = vec![rec("a", 0.0, 0.0), rec("b", 0.0001, 0.0001), rec("c", 50.0, 50.0)];
        let pass = cluster_features(&mut records, &Linear, &ClusterParams::new(40.0, 2));

        assert_eq!(pass.clusters.len(), 1);
        let cluster = &pass.clusters[0];
        assert_eq!(cluster.member_ids, vec!["a", "b"]);
        assert_eq!(cluster.count(), 2);
        assert_eq!(cluster.seed_id, "a");
        assert_eq!(cluster.location, GeoPoint::new(0.0, 0.0));
        assert_eq!(ids(&records, &pass.individual), vec!["c"]);

        assert!(records[0].is_clustered && records[1].is_clustered);
        assert!(!records[2].is_clustered);
        assert_eq!(records[0].number_in_cluster, Some(2));
        assert_eq!(records[1].number_in_cluster, None);
    }

    #[test]
    fn individual_and_members_partition_projected_ids() {
        let mut records: Vec<FeatureRecord> = (0..60)
            .map(|i| rec(&format!("f{i}"), (i % 7) as f64 * 0.01, (i / 7) as f64 * 0.013))
            .collect();
        records.push(rec("hidden", -120.0, 0.0));
        let params = ClusterParams::new(25.0, 3);
        let pass = cluster_features(&mut records, &Linear, &params);

        let mut seen = BTreeSet::new();
        for id in ids(&records, &pass.individual) {
            assert!(seen.insert(id));
        }
        for cluster in &pass.clusters {
            assert!(cluster.count() >= params.minimum_cluster_size);
            for id in &cluster.member_ids {
                assert!(seen.insert(id.clone()), "{id} appears twice");
            }
        }
        assert_eq!(seen.len(), 60);
        assert!(!seen.contains("hidden"));
        assert_eq!(ids(&records, &pass.unprojected), vec!["hidden"]);
        assert_eq!(pass.clustered_count() + pass.individual.len(), 60);
    }

    #[test]
    fn minimum_cluster_size_is_clamped() {
        assert_eq!(ClusterParams::new(10.0, 0).minimum_cluster_size, 2);
        assert_eq!(ClusterParams::new(10.0, 1).minimum_cluster_size, 2);

        let mut records = vec![rec("solo", 0.0, 0.0)];
        let pass = cluster_features(&mut records, &Linear, &ClusterParams::new(10.0, 1));
        assert!(pass.clusters.is_empty());
        assert_eq!(pass.individual, vec![0]);
    }

    #[test]
    fn later_seed_claims_an_earlier_individual() {
        // x positions 0, 15, 30 px with a 40 px window (half-side 20):
        // "a" only reaches "b", which is below size 3; "b" reaches both.
        let mut records = vec![rec("a", 0.0, 0.0), rec("b", 0.015, 0.0), rec("c", 0.030, 0.0)];
        let pass = cluster_features(&mut records, &Linear, &ClusterParams::new(40.0, 3));
        assert_eq!(pass.clusters.len(), 1);
        assert_eq!(pass.clusters[0].seed_id, "b");
        assert_eq!(pass.clusters[0].member_ids, vec!["a", "b", "c"]);
        assert!(pass.individual.is_empty());
    }

    #[test]
    fn stale_cluster_state_is_cleared() {
        let mut records = vec![rec("a", 0.0, 0.0)];
        records[0].is_clustered = true;
        records[0].number_in_cluster = Some(9);
        let pass = ClusterPass::all_individual(&mut records);
        assert_eq!(pass.individual, vec![0]);
        assert!(!records[0].is_clustered);
        assert_eq!(records[0].number_in_cluster, None);
    }

    #[test]
    fn density_rule_uses_height_or_count() {
        let rule = DensityRule {
            altitude_m: 1_000_000.0,
            feature_threshold: 2000,
        };
        let low = CameraPose::new(GeoPoint::with_height(0.0, 0.0, 10.0));
        let high = CameraPose::new(GeoPoint::with_height(0.0, 0.0, 2_000_000.0));
        assert!(!rule.holds(&low, 100));
        assert!(rule.holds(&low, 2001));
        assert!(rule.holds(&high, 1));
    }
}
