use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// User-selectable settings of one layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LayerOptions {
    pub style_index: usize,
    pub clustering_enabled: bool,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            style_index: 0,
            clustering_enabled: true,
        }
    }
}

/// Shared store of [`LayerOptions`] keyed by layer key.
///
/// Clones share the same underlying map, so a UI and the layers it controls
/// can each hold one.
#[derive(Debug, Clone, Default)]
pub struct OptionsStore {
    inner: Arc<RwLock<BTreeMap<String, LayerOptions>>>,
}

impl OptionsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for `key`, or the defaults if none were stored.
    pub fn get(&self, key: &str) -> LayerOptions {
        self.inner.read().get(key).copied().unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, options: LayerOptions) {
        self.inner.write().insert(key.into(), options);
    }

    /// Stores `options` for `key` unless something is already stored.
    pub fn insert_default(&self, key: impl Into<String>, options: LayerOptions) {
        self.inner.write().entry(key.into()).or_insert(options);
    }

    pub fn set_style_index(&self, key: &str, style_index: usize) {
        self.inner
            .write()
            .entry(key.to_string())
            .or_default()
            .style_index = style_index;
    }

    pub fn set_clustering(&self, key: &str, enabled: bool) {
        self.inner
            .write()
            .entry(key.to_string())
            .or_default()
            .clustering_enabled = enabled;
    }

    pub fn remove(&self, key: &str) -> Option<LayerOptions> {
        self.inner.write().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerOptions, OptionsStore};

    #[test]
    fn unknown_keys_get_defaults() {
        let store = OptionsStore::new();
        assert_eq!(store.get("vessels"), LayerOptions::default());
        assert!(!store.contains("vessels"));
    }

    #[test]
    fn clones_share_state() {
        let store = OptionsStore::new();
        let ui = store.clone();
        ui.set_style_index("vessels", 2);
        ui.set_clustering("vessels", false);
        assert_eq!(
            store.get("vessels"),
            LayerOptions {
                style_index: 2,
                clustering_enabled: false
            }
        );
        assert_eq!(store.keys(), vec!["vessels".to_string()]);
    }

    #[test]
    fn insert_default_keeps_existing() {
        let store = OptionsStore::new();
        store.set_style_index("a", 3);
        store.insert_default("a", LayerOptions::default());
        store.insert_default("b", LayerOptions::default());
        assert_eq!(store.get("a").style_index, 3);
        assert!(store.contains("b"));
        assert_eq!(store.remove("b"), Some(LayerOptions::default()));
    }
}
