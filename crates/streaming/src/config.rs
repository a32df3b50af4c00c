use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::memory::MemoryService;
use crate::protocol::decode_collection;
use crate::service::{FeatureService, ServiceError};

/// Declarative description of a feature service, tagged by `"kind"`.
///
/// ```json
/// { "kind": "geojson", "url": "https://example.org/features", "timeParameter": "since" }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ServiceConfig {
    /// Inline FeatureCollection and optional inline style document.
    #[serde(rename_all = "camelCase")]
    Memory {
        #[serde(default = "default_name")]
        name: String,
        #[serde(default)]
        features: Value,
        #[serde(default)]
        style: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    GeoJson {
        url: String,
        #[serde(default)]
        style_url: Option<String>,
        #[serde(default = "default_time_parameter")]
        time_parameter: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

fn default_name() -> String {
    "inline".to_string()
}

fn default_time_parameter() -> String {
    "since".to_string()
}

impl ServiceConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(text).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Instantiates the configured service.
    pub fn build(&self) -> Result<Arc<dyn FeatureService>, ServiceError> {
        match self {
            ServiceConfig::Memory {
                name,
                features,
                style,
            } => {
                let records = match features {
                    Value::Null => Vec::new(),
                    other => decode_collection(other)?.records,
                };
                let service = MemoryService::with_records(name.clone(), records);
                service.set_style(style.as_ref().map(|s| match s {
                    Value::String(text) => text.clone(),
                    doc => doc.to_string(),
                }));
                Ok(Arc::new(service))
            }
            ServiceConfig::GeoJson {
                url,
                style_url,
                time_parameter,
                headers,
            } => build_geojson(url, style_url.as_deref(), time_parameter, headers),
        }
    }
}

#[cfg(feature = "http")]
fn build_geojson(
    url: &str,
    style_url: Option<&str>,
    time_parameter: &str,
    headers: &BTreeMap<String, String>,
) -> Result<Arc<dyn FeatureService>, ServiceError> {
    if url.is_empty() {
        return Err(ServiceError::Config("geojson service needs a url".into()));
    }
    let mut service = crate::http::GeoJsonService::new(url).with_time_parameter(time_parameter);
    if let Some(style_url) = style_url {
        service = service.with_style_url(style_url);
    }
    for (k, v) in headers {
        service = service.with_header(k, v);
    }
    Ok(Arc::new(service))
}

#[cfg(not(feature = "http"))]
fn build_geojson(
    _url: &str,
    _style_url: Option<&str>,
    _time_parameter: &str,
    _headers: &BTreeMap<String, String>,
) -> Result<Arc<dyn FeatureService>, ServiceError> {
    Err(ServiceError::Config(
        "built without the `http` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::ServiceConfig;
    use crate::service::{FeatureQuery, FeatureService, ServiceError};
    use foundation::GeoBounds;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn parses_geojson_kind_with_defaults() {
        let cfg = ServiceConfig::from_json_str(
            r#"{ "kind": "geojson", "url": "http://localhost/f", "styleUrl": "http://localhost/s" }"#,
        )
        .expect("config");
        assert_eq!(
            cfg,
            ServiceConfig::GeoJson {
                url: "http://localhost/f".into(),
                style_url: Some("http://localhost/s".into()),
                time_parameter: "since".into(),
                headers: BTreeMap::new(),
            }
        );
    }

    #[test]
    fn unknown_kind_is_a_config_error() {
        let err = ServiceConfig::from_json_str(r#"{ "kind": "wfs" }"#).unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[tokio::test]
    async fn memory_kind_builds_a_working_service() {
        let cfg = ServiceConfig::from_json_str(
            r#"{
                "kind": "memory",
                "features": { "type": "FeatureCollection", "features": [
                    { "type": "Feature", "id": "a",
                      "geometry": { "type": "Point", "coordinates": [1, 1] },
                      "properties": {} }
                ] },
                "style": { "styles": [] }
            }"#,
        )
        .expect("config");
        let service = cfg.build().expect("service");
        assert_eq!(service.describe(), "memory:inline");

        let page = service
            .load_page(FeatureQuery::new(GeoBounds::WORLD, 10))
            .await
            .expect("page");
        assert_eq!(page.features.len(), 1);

        let style = service.load_style().await.expect("style").expect("present");
        assert_eq!(style, r#"{"styles":[]}"#);
    }
}
