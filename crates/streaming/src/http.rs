//! GeoJSON-over-HTTP feature service.
//!
//! Queries are plain GET requests:
//! `{url}?bbox=west,south,east,north&limit=N&offset=M[&{time_parameter}=millis]`
//! answered with a FeatureCollection. Paging stops at the first short page.

use std::collections::BTreeMap;

use crate::protocol::decode_collection_str;
use crate::service::{BoxFuture, FeaturePage, FeatureQuery, FeatureService, ServiceError};

pub const DEFAULT_TIME_PARAMETER: &str = "since";

pub struct GeoJsonService {
    url: String,
    style_url: Option<String>,
    time_parameter: String,
    headers: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl GeoJsonService {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            style_url: None,
            time_parameter: DEFAULT_TIME_PARAMETER.to_string(),
            headers: BTreeMap::new(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_style_url(mut self, style_url: impl Into<String>) -> Self {
        self.style_url = Some(style_url.into());
        self
    }

    pub fn with_time_parameter(mut self, name: impl Into<String>) -> Self {
        self.time_parameter = name.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Query string pairs for one page request, in a fixed order.
    pub fn query_pairs(&self, query: &FeatureQuery) -> Vec<(String, String)> {
        let b = query.bbox;
        let mut pairs = vec![
            (
                "bbox".to_string(),
                format!("{},{},{},{}", b.west, b.south, b.east, b.north),
            ),
            ("limit".to_string(), query.limit.to_string()),
            ("offset".to_string(), query.offset.to_string()),
        ];
        if let Some(since) = query.since {
            pairs.push((self.time_parameter.clone(), since.as_unix_millis().to_string()));
        }
        pairs
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.headers
            .iter()
            .fold(self.client.get(url), |req, (k, v)| req.header(k, v))
    }

    async fn fetch_text(&self, req: reqwest::RequestBuilder, url: &str) -> Result<String, ServiceError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ServiceError::Status {
                code: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        resp.text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))
    }

    async fn page(&self, query: FeatureQuery) -> Result<FeaturePage, ServiceError> {
        let req = self.get(&self.url).query(&self.query_pairs(&query));
        let body = self.fetch_text(req, &self.url).await?;
        let decoded = decode_collection_str(&body)?;

        tracing::debug!(
            url = %self.url,
            offset = query.offset,
            received = decoded.raw_count,
            skipped = decoded.skipped,
            "geojson page"
        );

        let next = (query.limit > 0 && decoded.raw_count >= query.limit)
            .then_some(query.offset + decoded.raw_count);
        Ok(FeaturePage {
            features: decoded.records,
            next,
        })
    }
}

impl FeatureService for GeoJsonService {
    fn describe(&self) -> String {
        format!("geojson:{}", self.url)
    }

    fn load_page(&self, query: FeatureQuery) -> BoxFuture<'_, Result<FeaturePage, ServiceError>> {
        Box::pin(self.page(FeatureQuery {
            since: None,
            ..query
        }))
    }

    fn update_page(&self, query: FeatureQuery) -> BoxFuture<'_, Result<FeaturePage, ServiceError>> {
        Box::pin(self.page(query))
    }

    fn load_style(&self) -> BoxFuture<'_, Result<Option<String>, ServiceError>> {
        Box::pin(async move {
            match &self.style_url {
                Some(url) => {
                    let text = self.fetch_text(self.get(url), url).await?;
                    Ok(Some(text))
                }
                None => Ok(None),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::GeoJsonService;
    use crate::service::FeatureQuery;
    use foundation::{GeoBounds, Time};

    #[test]
    fn query_pairs_include_time_only_for_deltas() {
        let service = GeoJsonService::new("http://localhost/features").with_time_parameter("after");
        let q = FeatureQuery::new(GeoBounds::new(-10.0, -5.0, 10.0, 5.0), 500).at_offset(1000);
        let pairs = service.query_pairs(&q);
        assert_eq!(pairs[0], ("bbox".into(), "-10,-5,10,5".into()));
        assert_eq!(pairs[1], ("limit".into(), "500".into()));
        assert_eq!(pairs[2], ("offset".into(), "1000".into()));
        assert_eq!(pairs.len(), 3);

        let delta = service.query_pairs(&q.since(Time(12.5)));
        assert_eq!(delta[3], ("after".into(), "12500".into()));
    }
}
