use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use foundation::{GeoBounds, GeoPoint, Time};
use layers::{FeatureLayer, LayerConfig, LayerEvent, OptionsStore, PerspectiveCamera, StyleSet};
use scene::MemoryScene;
use serde::Deserialize;
use streaming::{FeatureService, ServiceConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Polls a feature service and reports what a live layer renders")]
struct Args {
    /// Watch config file (default: $FEATURE_WATCH_CONFIG, then feature_watch.json)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the service and reconcile a layer against an in-memory scene
    Watch {
        /// Stop after this many refresh cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Style index to render with, overriding the config
        #[arg(long)]
        style: Option<usize>,

        /// Render every feature individually
        #[arg(long)]
        no_clustering: bool,
    },

    /// List the styles the service publishes
    Styles,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchConfig {
    service: ServiceConfig,
    #[serde(default)]
    layer: LayerConfig,
    #[serde(default = "default_key")]
    key: String,
    #[serde(default)]
    camera: CameraConfig,
    /// west, south, east, north
    #[serde(default = "default_bbox")]
    bbox: [f64; 4],
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CameraConfig {
    lon: f64,
    lat: f64,
    height_m: f64,
    width_px: f64,
    height_px: f64,
    fov_deg: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            lon: 0.0,
            lat: 0.0,
            height_m: 10_000_000.0,
            width_px: 1280.0,
            height_px: 720.0,
            fov_deg: 60.0,
        }
    }
}

impl CameraConfig {
    fn viewport(&self) -> PerspectiveCamera {
        PerspectiveCamera::new(
            GeoPoint::with_height(self.lon, self.lat, self.height_m),
            [self.width_px, self.height_px],
            self.fov_deg,
        )
    }
}

fn default_key() -> String {
    "features".to_string()
}

fn default_bbox() -> [f64; 4] {
    [-180.0, -90.0, 180.0, 90.0]
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn parse_config(text: &str) -> Result<WatchConfig, Box<dyn std::error::Error>> {
    let config: WatchConfig = serde_json::from_str(text)?;
    config.layer.validate()?;
    if config.poll_interval_ms == 0 {
        return Err("pollIntervalMs must be at least 1".into());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let path = args.config.unwrap_or_else(|| {
        PathBuf::from(
            env::var("FEATURE_WATCH_CONFIG").unwrap_or_else(|_| "feature_watch.json".to_string()),
        )
    });
    let text = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let config = parse_config(&text)?;

    match args.command {
        Command::Watch {
            cycles,
            style,
            no_clustering,
        } => watch(config, cycles, style, no_clustering).await?,
        Command::Styles => list_styles(&config).await?,
    }

    Ok(())
}

async fn watch(
    mut config: WatchConfig,
    cycles: Option<u64>,
    style: Option<usize>,
    no_clustering: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(style) = style {
        config.layer.style_index = style;
    }
    if no_clustering {
        config.layer.clustering_enabled = false;
    }

    let service = config.service.build()?;
    info!(service = %service.describe(), key = %config.key, "watching");

    let viewport = config.camera.viewport();
    let [west, south, east, north] = config.bbox;
    let bounds = GeoBounds::new(west, south, east, north);
    let interval = Duration::from_millis(config.poll_interval_ms);

    let mut layer = FeatureLayer::new(1, config.key, config.layer, service, OptionsStore::new());
    layer.activate().await?;
    let events = layer.subscribe();
    let mut scene = MemoryScene::new();

    let mut cycle = 0u64;
    loop {
        layer.refresh(bounds, Time::now(), &viewport, &mut scene).await?;
        for event in layer.drain_events(events) {
            log_event(&event);
        }
        info!(objects = scene.len(), retained = layer.retained().len(), "scene");

        cycle += 1;
        if cycles.is_some_and(|n| cycle >= n) {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    let removed = layer.teardown(&mut scene);
    info!(cycles = cycle, removed, "stopped");
    Ok(())
}

fn log_event(event: &LayerEvent) {
    match event {
        LayerEvent::Loaded { request, stats } => info!(
            request = request.0,
            added = stats.added,
            clusters = stats.clusters,
            clustered = stats.clustered,
            "loaded"
        ),
        LayerEvent::Refreshed {
            request,
            keyframe,
            stats,
        } => info!(
            request = request.0,
            keyframe,
            added = stats.added,
            updated = stats.updated,
            unchanged = stats.unchanged,
            removed = stats.removed,
            clusters = stats.clusters,
            "refreshed"
        ),
        LayerEvent::Reclustered { stats } => info!(clusters = stats.clusters, "reclustered"),
        LayerEvent::Restyled { style_index, stats } => {
            info!(style_index, features = stats.added, "restyled")
        }
        LayerEvent::RefreshFailed { request, message } => {
            warn!(request = request.0, "refresh failed: {message}")
        }
        LayerEvent::Superseded { request } => info!(request = request.0, "superseded"),
    }
}

async fn list_styles(config: &WatchConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = config.service.build()?;
    let Some(text) = service.load_style().await? else {
        println!("{} publishes no styles", service.describe());
        return Ok(());
    };
    let styles = StyleSet::parse(&text)?;
    for (index, style) in styles.iter().enumerate() {
        println!("{index}: {} ({} rules)", style.name, style.rules.len());
    }
    Ok(())
}
