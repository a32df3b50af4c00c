use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::rendered::{RenderKey, RenderedFeature};

/// The visual collection a layer renders into.
///
/// Only id-keyed create/update/delete is required. `suspend_events` and
/// `resume_events` bracket a batch of mutations so observers of the
/// collection are notified once per batch instead of once per mutation.
pub trait FeatureScene {
    fn add(&mut self, feature: &RenderedFeature);
    fn update(&mut self, feature: &RenderedFeature);
    fn remove(&mut self, key: &RenderKey);

    fn suspend_events(&mut self) {}
    fn resume_events(&mut self) {}
}

/// Suspends scene events for as long as it lives.
///
/// Dereferences to the scene, so mutations go through the batch.
pub struct SceneBatch<'a, S: FeatureScene + ?Sized> {
    scene: &'a mut S,
}

impl<'a, S: FeatureScene + ?Sized> SceneBatch<'a, S> {
    pub fn begin(scene: &'a mut S) -> Self {
        scene.suspend_events();
        Self { scene }
    }
}

impl<S: FeatureScene + ?Sized> Deref for SceneBatch<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.scene
    }
}

impl<S: FeatureScene + ?Sized> DerefMut for SceneBatch<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.scene
    }
}

impl<S: FeatureScene + ?Sized> Drop for SceneBatch<'_, S> {
    fn drop(&mut self) {
        self.scene.resume_events();
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SceneOpCounts {
    pub adds: usize,
    pub updates: usize,
    pub removes: usize,
}

impl SceneOpCounts {
    pub fn total(&self) -> usize {
        self.adds + self.updates + self.removes
    }
}

/// In-memory scene that records what it was asked to do.
///
/// `notifications` counts change notifications observers would have seen:
/// one per mutation outside a batch, one per non-empty batch.
#[derive(Debug, Default)]
pub struct MemoryScene {
    items: BTreeMap<RenderKey, RenderedFeature>,
    counts: SceneOpCounts,
    suspend_depth: u32,
    dirty: bool,
    notifications: u64,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &RenderKey) -> Option<&RenderedFeature> {
        self.items.get(key)
    }

    pub fn contains(&self, key: &RenderKey) -> bool {
        self.items.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &RenderKey> + '_ {
        self.items.keys()
    }

    pub fn features(&self) -> impl Iterator<Item = &RenderedFeature> + '_ {
        self.items.values()
    }

    pub fn counts(&self) -> SceneOpCounts {
        self.counts
    }

    pub fn reset_counts(&mut self) {
        self.counts = SceneOpCounts::default();
    }

    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend_depth > 0
    }

    fn changed(&mut self) {
        if self.suspend_depth > 0 {
            self.dirty = true;
        } else {
            self.notifications += 1;
        }
    }
}

impl FeatureScene for MemoryScene {
    fn add(&mut self, feature: &RenderedFeature) {
        self.counts.adds += 1;
        self.items.insert(feature.key.clone(), feature.clone());
        self.changed();
    }

    fn update(&mut self, feature: &RenderedFeature) {
        self.counts.updates += 1;
        self.items.insert(feature.key.clone(), feature.clone());
        self.changed();
    }

    fn remove(&mut self, key: &RenderKey) {
        self.counts.removes += 1;
        self.items.remove(key);
        self.changed();
    }

    fn suspend_events(&mut self) {
        self.suspend_depth += 1;
    }

    fn resume_events(&mut self) {
        self.suspend_depth = self.suspend_depth.saturating_sub(1);
        if self.suspend_depth == 0 && self.dirty {
            self.dirty = false;
            self.notifications += 1;
        }
    }
}
