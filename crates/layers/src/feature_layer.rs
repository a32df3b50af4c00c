//! Live feature layer: fetch, cluster, style and reconcile against a scene.
//!
//! A refresh cycle runs in three steps so the fetch never borrows the layer:
//!
//! 1. [`FeatureLayer::begin_refresh`] advances the refresh clock and issues a
//!    request ticket, returning a [`RefreshPlan`].
//! 2. [`RefreshPlan::fetch`] pages through the feature service.
//! 3. [`FeatureLayer::complete_refresh`] applies the result, unless a newer
//!    cycle has been started in the meantime.
//!
//! [`FeatureLayer::refresh`] runs all three back to back.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use foundation::{GeoBounds, Time};
use runtime::{EventChannel, RefreshClock, RefreshFrame, SubscriptionId};
use scene::components::FeatureGeometry;
use scene::{
    FeatureScene, RenderKey, RenderedFeature, RenderedFeatureIndex, SceneBatch, StyleState,
};
use streaming::{
    FeatureRecord, FeatureService, FetchMode, FetchOutcome, FetchRequest, RequestId,
    RequestTicket, RequestTracker, ServiceError, fetch_features, merge_by_id,
};

use crate::cluster::{ClusterPass, cluster_features};
use crate::config::LayerConfig;
use crate::layer::{Layer, LayerId, LayerState};
use crate::options::{LayerOptions, OptionsStore};
use crate::style::{MatchedStyleCache, Style, StyleSet};
use crate::symbology::{cluster_appearance, refresh_orientation, style_feature};
use crate::viewport::{CameraPose, Viewport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    StyleIndexOutOfRange { index: usize, len: usize },
    InvalidState {
        operation: &'static str,
        state: LayerState,
    },
}

impl fmt::Display for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerError::StyleIndexOutOfRange { index, len } => {
                write!(f, "style index {index} out of range (layer has {len} styles)")
            }
            LayerError::InvalidState { operation, state } => {
                write!(f, "cannot {operation} while {state}")
            }
        }
    }
}

impl std::error::Error for LayerError {}

/// What one reconciliation did to the scene.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub clusters: usize,
    /// Features represented by a cluster marker.
    pub clustered: usize,
    pub unprojected: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    Loaded {
        request: RequestId,
        stats: ReconcileStats,
    },
    Refreshed {
        request: RequestId,
        keyframe: bool,
        stats: ReconcileStats,
    },
    Reclustered {
        stats: ReconcileStats,
    },
    Restyled {
        style_index: usize,
        stats: ReconcileStats,
    },
    RefreshFailed {
        request: RequestId,
        message: String,
    },
    Superseded {
        request: RequestId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied(ReconcileStats),
    /// A newer cycle started first; nothing was changed.
    Superseded,
    /// The fetch failed; rendered features were left as they were.
    Failed(String),
}

/// One refresh cycle's fetch, detached from the layer.
pub struct RefreshPlan {
    ticket: RequestTicket,
    frame: RefreshFrame,
    keyframe: bool,
    request: FetchRequest,
    started_at: Time,
    service: Arc<dyn FeatureService>,
}

impl fmt::Debug for RefreshPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshPlan")
            .field("request_id", &self.ticket.id())
            .field("frame", &self.frame)
            .field("keyframe", &self.keyframe)
            .field("request", &self.request)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl RefreshPlan {
    pub fn id(&self) -> RequestId {
        self.ticket.id()
    }

    pub fn frame(&self) -> RefreshFrame {
        self.frame
    }

    /// `true` for full fetches, including a first cycle that the clock
    /// scheduled as a delta.
    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    pub fn is_current(&self) -> bool {
        self.ticket.is_current()
    }

    pub async fn fetch(&self) -> Result<FetchOutcome, ServiceError> {
        fetch_features(self.service.as_ref(), &self.ticket, &self.request).await
    }
}

/// Controller for one active data layer.
pub struct FeatureLayer {
    id: LayerId,
    key: String,
    config: LayerConfig,
    service: Arc<dyn FeatureService>,
    options: OptionsStore,
    styles: Option<StyleSet>,
    state: LayerState,
    has_loaded: bool,
    clock: RefreshClock,
    tracker: RequestTracker,
    retained: Vec<FeatureRecord>,
    rendered: RenderedFeatureIndex,
    cluster_keys: Vec<RenderKey>,
    matches: MatchedStyleCache,
    last_poll: Option<Time>,
    last_camera: Option<CameraPose>,
    /// Retained count at the last clustering pass.
    last_count: usize,
    /// A keyframe was started but not applied yet.
    keyframe_pending: bool,
    events: EventChannel<LayerEvent>,
}

impl FeatureLayer {
    /// Creates an idle layer. Options for `key` are seeded from `config`
    /// unless the store already has some.
    pub fn new(
        id: u64,
        key: impl Into<String>,
        config: LayerConfig,
        service: Arc<dyn FeatureService>,
        options: OptionsStore,
    ) -> Self {
        let key = key.into();
        options.insert_default(
            key.clone(),
            LayerOptions {
                style_index: config.style_index,
                clustering_enabled: config.clustering_enabled,
            },
        );
        Self {
            id: LayerId(id),
            key,
            clock: RefreshClock::new(config.keyframe_interval),
            config,
            service,
            options,
            styles: None,
            state: LayerState::Idle,
            has_loaded: false,
            tracker: RequestTracker::new(),
            retained: Vec::new(),
            rendered: RenderedFeatureIndex::new(),
            cluster_keys: Vec::new(),
            matches: MatchedStyleCache::new(),
            last_poll: None,
            last_camera: None,
            last_count: 0,
            keyframe_pending: false,
            events: EventChannel::new(),
        }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn options(&self) -> LayerOptions {
        self.options.get(&self.key)
    }

    pub fn styles(&self) -> Option<&StyleSet> {
        self.styles.as_ref()
    }

    pub fn rendered(&self) -> &RenderedFeatureIndex {
        &self.rendered
    }

    pub fn retained(&self) -> &[FeatureRecord] {
        &self.retained
    }

    pub fn cluster_keys(&self) -> &[RenderKey] {
        &self.cluster_keys
    }

    pub fn matched_cache(&self) -> &MatchedStyleCache {
        &self.matches
    }

    pub fn subscribe(&mut self) -> SubscriptionId {
        self.events.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    pub fn drain_events(&mut self, id: SubscriptionId) -> Vec<LayerEvent> {
        self.events.drain(id)
    }

    /// Loads and compiles the style document. A missing or malformed
    /// document leaves the layer on default appearances.
    pub async fn activate(&mut self) -> Result<(), LayerError> {
        if self.state != LayerState::Idle {
            return Err(LayerError::InvalidState {
                operation: "activate",
                state: self.state,
            });
        }

        self.styles = match self.service.load_style().await {
            Ok(Some(text)) => match StyleSet::parse(&text) {
                Ok(set) => {
                    tracing::info!(layer = %self.key, styles = set.len(), "style document loaded");
                    Some(set)
                }
                Err(e) => {
                    tracing::warn!(layer = %self.key, error = %e, "using default appearance");
                    None
                }
            },
            Ok(None) => {
                tracing::info!(layer = %self.key, "no style document; using default appearance");
                None
            }
            Err(e) => {
                tracing::warn!(layer = %self.key, error = %e, "style fetch failed; using default appearance");
                None
            }
        };
        self.state = LayerState::Loading;
        Ok(())
    }

    pub fn begin_refresh(&mut self, bounds: GeoBounds, now: Time) -> Result<RefreshPlan, LayerError> {
        match self.state {
            LayerState::Loading | LayerState::Loaded | LayerState::Refreshing => {}
            state => {
                return Err(LayerError::InvalidState {
                    operation: "refresh",
                    state,
                });
            }
        }

        if self.keyframe_pending {
            self.clock.force_keyframe();
        }
        let frame = self.clock.advance();
        let mode = match self.last_poll {
            Some(since) if !frame.is_keyframe() => FetchMode::Delta { since },
            _ => FetchMode::Keyframe,
        };
        if mode == FetchMode::Keyframe {
            self.keyframe_pending = true;
        }
        let ticket = self.tracker.issue();
        if self.state == LayerState::Loaded {
            self.state = LayerState::Refreshing;
        }

        let keyframe = mode == FetchMode::Keyframe;
        tracing::debug!(
            layer = %self.key,
            request = ticket.id().0,
            cycle = frame.index,
            keyframe,
            "refresh started"
        );
        Ok(RefreshPlan {
            ticket,
            frame,
            keyframe,
            request: FetchRequest {
                bounds,
                mode,
                page_size: self.config.page_size,
                max_pages: self.config.max_pages,
            },
            started_at: now,
            service: Arc::clone(&self.service),
        })
    }

    /// Applies a finished fetch. Results of superseded cycles are dropped.
    pub fn complete_refresh(
        &mut self,
        plan: RefreshPlan,
        result: Result<FetchOutcome, ServiceError>,
        viewport: &dyn Viewport,
        scene: &mut dyn FeatureScene,
    ) -> RefreshOutcome {
        let request = plan.id();
        if self.state == LayerState::TornDown || !plan.is_current() {
            return self.superseded(request);
        }
        let records = match result {
            Ok(FetchOutcome::Complete(records)) => records,
            Ok(FetchOutcome::Superseded) => return self.superseded(request),
            Err(e) => return self.failed(&plan, e),
        };

        let fetched = records.len();
        if plan.keyframe {
            self.keyframe_pending = false;
            self.retained = records;
            let keep: BTreeSet<String> = self.retained.iter().map(|r| r.id.clone()).collect();
            let pruned = self.matches.retain(&keep);
            if pruned > 0 {
                tracing::debug!(layer = %self.key, pruned, "pruned matched styles");
            }
        } else {
            merge_by_id(&mut self.retained, records);
        }
        self.last_poll = Some(plan.started_at);

        let stats = self.reconcile(viewport, scene);
        self.last_camera = Some(viewport.camera());
        self.state = LayerState::Loaded;

        tracing::debug!(
            layer = %self.key,
            request = request.0,
            keyframe = plan.keyframe,
            fetched,
            retained = self.retained.len(),
            added = stats.added,
            updated = stats.updated,
            removed = stats.removed,
            clusters = stats.clusters,
            "refresh applied"
        );
        let event = if self.has_loaded {
            LayerEvent::Refreshed {
                request,
                keyframe: plan.keyframe,
                stats,
            }
        } else {
            LayerEvent::Loaded { request, stats }
        };
        self.has_loaded = true;
        self.events.publish(event);
        RefreshOutcome::Applied(stats)
    }

    /// Runs one full cycle.
    pub async fn refresh(
        &mut self,
        bounds: GeoBounds,
        now: Time,
        viewport: &dyn Viewport,
        scene: &mut dyn FeatureScene,
    ) -> Result<RefreshOutcome, LayerError> {
        let plan = self.begin_refresh(bounds, now)?;
        let result = plan.fetch().await;
        Ok(self.complete_refresh(plan, result, viewport, scene))
    }

    /// Re-clusters the retained set without fetching when the camera moved
    /// or the feature count changed since the last clustering pass while the
    /// view is dense, or when clusters are shown but the view no longer is.
    pub fn on_viewpoint_changed(
        &mut self,
        viewport: &dyn Viewport,
        scene: &mut dyn FeatureScene,
    ) -> Option<ReconcileStats> {
        if !matches!(self.state, LayerState::Loaded | LayerState::Refreshing) {
            return None;
        }

        let camera = viewport.camera();
        let options = self.options.get(&self.key);
        let dense = self.config.density_rule().holds(&camera, self.retained.len());
        let moved = self
            .last_camera
            .is_none_or(|prev| camera.moved_beyond(&prev, self.config.viewpoint_change_ratio));
        let count_changed = self.retained.len() != self.last_count;

        let cluster_now = options.clustering_enabled && dense && (moved || count_changed);
        let uncluster = !self.cluster_keys.is_empty() && !(options.clustering_enabled && dense);
        if !(cluster_now || uncluster) {
            return None;
        }

        let stats = self.reconcile(viewport, scene);
        self.last_camera = Some(camera);
        tracing::debug!(layer = %self.key, clusters = stats.clusters, "reclustered");
        self.events.publish(LayerEvent::Reclustered { stats });
        Some(stats)
    }

    /// Rebuilds every rendered feature with another style, reusing cached
    /// rule matches.
    pub fn restyle(
        &mut self,
        style_index: usize,
        viewport: &dyn Viewport,
        scene: &mut dyn FeatureScene,
    ) -> Result<ReconcileStats, LayerError> {
        let resume = match self.state {
            LayerState::Loaded | LayerState::Refreshing => self.state,
            state => {
                return Err(LayerError::InvalidState {
                    operation: "restyle",
                    state,
                });
            }
        };
        if let Some(set) = self.styles.as_ref().filter(|s| !s.is_empty()) {
            if style_index >= set.len() {
                return Err(LayerError::StyleIndexOutOfRange {
                    index: style_index,
                    len: set.len(),
                });
            }
        }

        self.options.set_style_index(&self.key, style_index);
        self.state = LayerState::Restyling;
        let stats = {
            let mut batch = SceneBatch::begin(scene);
            self.clear_scene(&mut *batch);
            self.reconcile(viewport, &mut *batch)
        };
        self.state = resume;

        tracing::info!(layer = %self.key, style_index, features = stats.added, "restyled");
        self.events.publish(LayerEvent::Restyled { style_index, stats });
        Ok(stats)
    }

    /// Removes everything this layer rendered and detaches all subscribers.
    /// Returns the number of scene objects removed.
    pub fn teardown(&mut self, scene: &mut dyn FeatureScene) -> usize {
        if self.state == LayerState::TornDown {
            return 0;
        }
        self.tracker.cancel_all();
        let removed = {
            let mut batch = SceneBatch::begin(scene);
            self.clear_scene(&mut *batch)
        };
        self.retained.clear();
        self.matches.clear();
        let subscribers = self.events.unsubscribe_all();
        self.state = LayerState::TornDown;
        tracing::info!(layer = %self.key, removed, subscribers, "layer torn down");
        removed
    }

    fn clear_scene(&mut self, scene: &mut dyn FeatureScene) -> usize {
        let mut removed = 0;
        for key in std::mem::take(&mut self.cluster_keys) {
            scene.remove(&key);
            removed += 1;
        }
        for feature in self.rendered.drain() {
            scene.remove(&feature.key);
            removed += 1;
        }
        removed
    }

    fn superseded(&mut self, request: RequestId) -> RefreshOutcome {
        tracing::debug!(layer = %self.key, request = request.0, "discarding superseded result");
        self.events.publish(LayerEvent::Superseded { request });
        RefreshOutcome::Superseded
    }

    fn failed(&mut self, plan: &RefreshPlan, error: ServiceError) -> RefreshOutcome {
        let message = error.to_string();
        tracing::warn!(
            layer = %self.key,
            request = plan.id().0,
            service = %self.service.describe(),
            error = %message,
            "refresh failed"
        );
        self.state = if self.has_loaded {
            LayerState::Loaded
        } else {
            LayerState::Loading
        };
        self.events.publish(LayerEvent::RefreshFailed {
            request: plan.id(),
            message: message.clone(),
        });
        RefreshOutcome::Failed(message)
    }

    /// Brings the scene in line with the retained set.
    fn reconcile(&mut self, viewport: &dyn Viewport, scene: &mut dyn FeatureScene) -> ReconcileStats {
        let options = self.options.get(&self.key);
        let camera = viewport.camera();
        let dense = self.config.density_rule().holds(&camera, self.retained.len());
        let pass = if options.clustering_enabled && dense {
            self.last_count = self.retained.len();
            cluster_features(&mut self.retained, viewport, &self.config.cluster_params())
        } else {
            ClusterPass::all_individual(&mut self.retained)
        };

        let mut stats = ReconcileStats {
            clusters: pass.clusters.len(),
            clustered: pass.clustered_count(),
            unprojected: pass.unprojected.len(),
            ..Default::default()
        };
        let mut batch = SceneBatch::begin(scene);

        for key in std::mem::take(&mut self.cluster_keys) {
            batch.remove(&key);
        }
        for cluster in &pass.clusters {
            let mut marker = RenderedFeature::new(
                RenderKey::Cluster(cluster.seed_id.clone()),
                FeatureGeometry::Point {
                    position: cluster.location,
                },
            );
            marker.appearance = cluster_appearance(cluster.count());
            marker.style_state = StyleState::Styled;
            batch.add(&marker);
            self.cluster_keys.push(marker.key);
        }

        let styles = self.styles.as_ref();
        let style = styles.and_then(|s| s.get(options.style_index));
        let mut expected = BTreeSet::new();

        for &slot in &pass.individual {
            let record = &self.retained[slot];
            expected.insert(record.id.clone());

            if let Some(existing) = self.rendered.get_mut(&record.id) {
                let restyle = !existing.style_state.is_styled()
                    || existing.geometry.kind() != record.geometry.kind();
                let next = if restyle {
                    let matched =
                        matched_rules(styles, &mut self.matches, record, options.style_index);
                    render(record, style, matched)
                } else {
                    let mut next = existing.clone();
                    next.geometry = record.geometry.clone();
                    if let (StyleState::Styled, Some(style)) = (next.style_state, style) {
                        let matched =
                            matched_rules(styles, &mut self.matches, record, options.style_index);
                        refresh_orientation(&mut next.appearance, style, matched, &record.properties);
                    }
                    next
                };

                if next == *existing {
                    stats.unchanged += 1;
                } else {
                    *existing = next;
                    batch.update(existing);
                    stats.updated += 1;
                }
                continue;
            }

            let matched = matched_rules(styles, &mut self.matches, record, options.style_index);
            let feature = render(record, style, matched);
            batch.add(&feature);
            self.rendered.insert(feature);
            stats.added += 1;
        }

        for feature in self.rendered.remove_absent(&expected) {
            batch.remove(&feature.key);
            stats.removed += 1;
        }
        stats
    }
}

impl Layer for FeatureLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn state(&self) -> LayerState {
        self.state
    }
}

fn matched_rules<'c>(
    styles: Option<&StyleSet>,
    cache: &'c mut MatchedStyleCache,
    record: &FeatureRecord,
    style_index: usize,
) -> &'c [usize] {
    match styles {
        Some(set) if !set.is_empty() => cache
            .get_or_match(&record.id, &record.properties, set)
            .get(style_index)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn render(record: &FeatureRecord, style: Option<&Style>, matched: &[usize]) -> RenderedFeature {
    let mut feature = RenderedFeature::new(
        RenderKey::Feature(record.id.clone()),
        record.geometry.clone(),
    );
    let (appearance, state) =
        style_feature(record.geometry.kind(), style, matched, &record.properties);
    feature.appearance = appearance;
    feature.style_state = state;
    feature
}
