pub mod cluster;
pub mod config;
pub mod feature_layer;
pub mod filter;
pub mod layer;
pub mod options;
pub mod style;
pub mod symbology;
pub mod viewport;

pub use cluster::{Cluster, ClusterParams, ClusterPass, DensityRule, cluster_features};
pub use config::{ConfigError, LayerConfig};
pub use feature_layer::*;
pub use layer::*;
pub use options::{LayerOptions, OptionsStore};
pub use style::{MatchedStyleCache, Style, StyleError, StyleSet};
pub use viewport::{CameraPose, PerspectiveCamera, Viewport};
