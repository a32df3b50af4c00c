use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;
use streaming::Properties;

use crate::filter::FilterExpr;

/// Attribute name → literal or property name.
pub type Symbolizer = BTreeMap<String, Value>;

/// Style document as served by a feature service.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StyleDocument {
    #[serde(default)]
    pub styles: Vec<StyleDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StyleDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RuleDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub point: Option<Symbolizer>,
    #[serde(default)]
    pub label: Option<Symbolizer>,
    #[serde(default)]
    pub line: Option<Symbolizer>,
    #[serde(default)]
    pub polygon: Option<Symbolizer>,
    #[serde(default)]
    pub model: Option<Symbolizer>,
}

#[derive(Debug)]
pub enum StyleError {
    Parse(String),
}

impl std::fmt::Display for StyleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StyleError::Parse(msg) => write!(f, "invalid style document: {msg}"),
        }
    }
}

impl std::error::Error for StyleError {}

/// A rule with its filter compiled.
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub name: String,
    /// `None` matches every feature.
    pub filter: Option<FilterExpr>,
    pub point: Option<Symbolizer>,
    pub label: Option<Symbolizer>,
    pub line: Option<Symbolizer>,
    pub polygon: Option<Symbolizer>,
    pub model: Option<Symbolizer>,
}

impl StyleRule {
    pub fn compile(def: RuleDefinition) -> Self {
        let filter = def.filter.as_ref().filter(|f| !f.is_null()).map(|f| {
            let expr = FilterExpr::compile(f);
            if expr.has_unsupported() {
                tracing::warn!(rule = %def.name, "filter has unsupported nodes");
            }
            expr
        });
        Self {
            name: def.name,
            filter,
            point: def.point,
            label: def.label,
            line: def.line,
            polygon: def.polygon,
            model: def.model,
        }
    }

    pub fn matches(&self, properties: &Properties) -> bool {
        self.filter.as_ref().is_none_or(|f| f.evaluate(properties))
    }
}

#[derive(Debug, Clone)]
pub struct Style {
    pub name: String,
    pub rules: Vec<StyleRule>,
}

/// Every style of one layer, compiled once at activation.
#[derive(Debug, Clone, Default)]
pub struct StyleSet {
    styles: Vec<Style>,
}

impl StyleSet {
    pub fn parse(text: &str) -> Result<Self, StyleError> {
        let doc: StyleDocument =
            serde_json::from_str(text).map_err(|e| StyleError::Parse(e.to_string()))?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: StyleDocument) -> Self {
        let styles = doc
            .styles
            .into_iter()
            .map(|s| Style {
                name: s.name,
                rules: s.rules.into_iter().map(StyleRule::compile).collect(),
            })
            .collect();
        Self { styles }
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Style> {
        self.styles.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Style> + '_ {
        self.styles.iter()
    }
}

/// Indices of the rules whose filter accepts `properties`, in rule order.
pub fn match_rules(rules: &[StyleRule], properties: &Properties) -> Vec<usize> {
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.matches(properties))
        .map(|(i, _)| i)
        .collect()
}

/// Matched rule indices per feature id, for every style index.
///
/// Matching happens once per feature; switching styles reuses the entry.
#[derive(Debug, Clone, Default)]
pub struct MatchedStyleCache {
    entries: BTreeMap<String, Vec<Vec<usize>>>,
}

impl MatchedStyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Cached matches for `id`, computing them for every style on a miss.
    pub fn get_or_match(
        &mut self,
        id: &str,
        properties: &Properties,
        styles: &StyleSet,
    ) -> &[Vec<usize>] {
        self.entries.entry(id.to_string()).or_insert_with(|| {
            styles
                .iter()
                .map(|style| match_rules(&style.rules, properties))
                .collect()
        })
    }

    pub fn matched(&self, id: &str, style_index: usize) -> Option<&[usize]> {
        self.entries
            .get(id)
            .and_then(|per_style| per_style.get(style_index))
            .map(Vec::as_slice)
    }

    /// Drops entries for ids not in `keep`; returns how many were dropped.
    pub fn retain(&mut self, keep: &BTreeSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| keep.contains(id));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
