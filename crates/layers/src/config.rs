use serde::Deserialize;

use crate::cluster::{ClusterParams, DensityRule};

#[derive(Debug)]
pub enum ConfigError {
    Parse(String),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "invalid layer config: {msg}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Tuning of one feature layer. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerConfig {
    /// Every Nth refresh cycle is a full re-fetch.
    pub keyframe_interval: u64,
    pub minimum_distance_px: f64,
    pub minimum_cluster_size: usize,
    /// Cluster when the camera is higher than this...
    pub cluster_altitude_m: f64,
    /// ...or when more features than this are retained.
    pub cluster_feature_threshold: usize,
    /// Camera movement, relative to its height, that triggers re-clustering.
    pub viewpoint_change_ratio: f64,
    pub page_size: usize,
    pub max_pages: usize,
    pub clustering_enabled: bool,
    pub style_index: usize,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            keyframe_interval: 10,
            minimum_distance_px: 40.0,
            minimum_cluster_size: 2,
            cluster_altitude_m: 1_000_000.0,
            cluster_feature_threshold: 2000,
            viewpoint_change_ratio: 0.2,
            page_size: 500,
            max_pages: 1000,
            clustering_enabled: true,
            style_index: 0,
        }
    }
}

impl LayerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: LayerConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        }
        if !(self.minimum_distance_px.is_finite() && self.minimum_distance_px > 0.0) {
            return invalid("minimumDistancePx", "must be a positive number");
        }
        if !(self.viewpoint_change_ratio.is_finite() && self.viewpoint_change_ratio >= 0.0) {
            return invalid("viewpointChangeRatio", "must be zero or positive");
        }
        if self.cluster_altitude_m.is_nan() {
            return invalid("clusterAltitudeM", "must be a number");
        }
        if self.page_size == 0 {
            return invalid("pageSize", "must be at least 1");
        }
        if self.max_pages == 0 {
            return invalid("maxPages", "must be at least 1");
        }
        Ok(())
    }

    pub fn cluster_params(&self) -> ClusterParams {
        ClusterParams::new(self.minimum_distance_px, self.minimum_cluster_size)
    }

    pub fn density_rule(&self) -> DensityRule {
        DensityRule {
            altitude_m: self.cluster_altitude_m,
            feature_threshold: self.cluster_feature_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, LayerConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_gives_defaults() {
        let config = LayerConfig::from_json_str("{}").expect("config");
        assert_eq!(config, LayerConfig::default());
        assert_eq!(config.keyframe_interval, 10);
        assert_eq!(config.minimum_distance_px, 40.0);
        assert_eq!(config.cluster_feature_threshold, 2000);
    }

    #[test]
    fn camel_case_overrides() {
        let config = LayerConfig::from_json_str(
            r#"{ "keyframeInterval": 3, "minimumClusterSize": 1, "pageSize": 50 }"#,
        )
        .expect("config");
        assert_eq!(config.keyframe_interval, 3);
        assert_eq!(config.page_size, 50);
        // Clamped when used, not rejected.
        assert_eq!(config.cluster_params().minimum_cluster_size, 2);
    }

    #[test]
    fn rejects_nonsense() {
        let err = LayerConfig::from_json_str(r#"{ "minimumDistancePx": -1 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "minimumDistancePx", .. }));
        assert!(matches!(
            LayerConfig::from_json_str(r#"{ "pageSize": "big" }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
