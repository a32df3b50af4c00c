//! Feature service abstraction.
//!
//! A feature service answers paged bounding-box queries with feature records
//! and may supply a style document. Implementations are selected at runtime
//! through [`crate::ServiceConfig`].

use std::future::Future;
use std::pin::Pin;

use foundation::{GeoBounds, Time};

use crate::protocol::ProtocolError;
use crate::record::FeatureRecord;

/// Boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug)]
pub enum ServiceError {
    /// The request never produced a response.
    Transport(String),
    Status { code: u16, url: String },
    Decode(String),
    Config(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Transport(msg) => write!(f, "transport error: {msg}"),
            ServiceError::Status { code, url } => write!(f, "HTTP {code} from {url}"),
            ServiceError::Decode(msg) => write!(f, "decode error: {msg}"),
            ServiceError::Config(msg) => write!(f, "invalid service config: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ProtocolError> for ServiceError {
    fn from(e: ProtocolError) -> Self {
        ServiceError::Decode(e.to_string())
    }
}

/// One page request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    pub bbox: GeoBounds,
    /// Only features changed after this instant (delta fetches).
    pub since: Option<Time>,
    pub offset: usize,
    pub limit: usize,
}

impl FeatureQuery {
    pub fn new(bbox: GeoBounds, limit: usize) -> Self {
        Self {
            bbox,
            since: None,
            offset: 0,
            limit,
        }
    }

    pub fn since(mut self, since: Time) -> Self {
        self.since = Some(since);
        self
    }

    pub fn at_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeaturePage {
    pub features: Vec<FeatureRecord>,
    /// Offset of the following page, `None` when this page was the last.
    pub next: Option<usize>,
}

/// Source of features for one layer.
///
/// Implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures for dyn-compatibility.
pub trait FeatureService: Send + Sync {
    /// Short human-readable description used in logs.
    fn describe(&self) -> String;

    /// Full (keyframe) page: every feature inside `query.bbox`.
    fn load_page(&self, query: FeatureQuery) -> BoxFuture<'_, Result<FeaturePage, ServiceError>>;

    /// Delta page: features changed since `query.since`.
    ///
    /// Services without change tracking answer with a full page.
    fn update_page(&self, query: FeatureQuery) -> BoxFuture<'_, Result<FeaturePage, ServiceError>> {
        self.load_page(query)
    }

    /// Raw style document, or `None` if the service has none.
    fn load_style(&self) -> BoxFuture<'_, Result<Option<String>, ServiceError>>;
}
