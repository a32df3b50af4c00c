use std::sync::atomic::{AtomicU64, Ordering};

use foundation::Time;
use parking_lot::RwLock;

use crate::record::FeatureRecord;
use crate::service::{BoxFuture, FeaturePage, FeatureQuery, FeatureService, ServiceError};

#[derive(Debug, Clone)]
struct Entry {
    record: FeatureRecord,
    updated: Time,
}

/// In-process feature service.
///
/// Records are kept in insertion order and paged in that order. Each record
/// remembers when it was last written so delta queries can filter on it.
#[derive(Debug, Default)]
pub struct MemoryService {
    name: String,
    entries: RwLock<Vec<Entry>>,
    style: RwLock<Option<String>>,
    page_requests: AtomicU64,
}

impl MemoryService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Service pre-filled with `records`, all stamped at `Time(0.0)`.
    pub fn with_records(name: impl Into<String>, records: Vec<FeatureRecord>) -> Self {
        let service = Self::new(name);
        for record in records {
            service.upsert(record, Time::default());
        }
        service
    }

    pub fn with_style(self, style: impl Into<String>) -> Self {
        *self.style.write() = Some(style.into());
        self
    }

    pub fn set_style(&self, style: Option<String>) {
        *self.style.write() = style;
    }

    /// Inserts or replaces a record, stamping it with `at`.
    pub fn upsert(&self, record: FeatureRecord, at: Time) {
        let mut entries = self.entries.write();
        let entry = Entry {
            record,
            updated: at,
        };
        match entries.iter_mut().find(|e| e.record.id == entry.record.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.record.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of page requests answered so far.
    pub fn page_requests(&self) -> u64 {
        self.page_requests.load(Ordering::SeqCst)
    }

    fn page(&self, query: &FeatureQuery) -> FeaturePage {
        self.page_requests.fetch_add(1, Ordering::SeqCst);

        let entries = self.entries.read();
        let matching: Vec<&Entry> = entries
            .iter()
            .filter(|e| match query.since {
                Some(since) => e.updated > since,
                None => true,
            })
            .filter(|e| {
                e.record
                    .geometry
                    .anchor()
                    .is_some_and(|p| query.bbox.contains(p.lon, p.lat))
            })
            .collect();

        let limit = query.limit.max(1);
        let end = (query.offset + limit).min(matching.len());
        let features = matching
            .get(query.offset..end)
            .unwrap_or_default()
            .iter()
            .map(|e| e.record.clone())
            .collect();
        FeaturePage {
            features,
            next: (end < matching.len()).then_some(end),
        }
    }
}

impl FeatureService for MemoryService {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn load_page(&self, query: FeatureQuery) -> BoxFuture<'_, Result<FeaturePage, ServiceError>> {
        let page = self.page(&FeatureQuery {
            since: None,
            ..query
        });
        Box::pin(async move { Ok(page) })
    }

    fn update_page(&self, query: FeatureQuery) -> BoxFuture<'_, Result<FeaturePage, ServiceError>> {
        let page = self.page(&query);
        Box::pin(async move { Ok(page) })
    }

    fn load_style(&self) -> BoxFuture<'_, Result<Option<String>, ServiceError>> {
        let style = self.style.read().clone();
        Box::pin(async move { Ok(style) })
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryService;
    use crate::record::FeatureRecord;
    use crate::service::{FeatureQuery, FeatureService};
    use foundation::{GeoBounds, Time};
    use scene::components::FeatureGeometry;

    fn rec(id: &str, lon: f64) -> FeatureRecord {
        FeatureRecord::new(id, FeatureGeometry::point(lon, 0.0))
    }

    #[tokio::test]
    async fn pages_in_insertion_order() {
        let service = MemoryService::with_records(
            "t",
            vec![rec("a", 1.0), rec("b", 2.0), rec("c", 3.0)],
        );
        let first = service
            .load_page(FeatureQuery::new(GeoBounds::WORLD, 2))
            .await
            .expect("page");
        assert_eq!(first.features.len(), 2);
        assert_eq!(first.next, Some(2));

        let second = service
            .load_page(FeatureQuery::new(GeoBounds::WORLD, 2).at_offset(2))
            .await
            .expect("page");
        assert_eq!(second.features[0].id, "c");
        assert_eq!(second.next, None);
        assert_eq!(service.page_requests(), 2);
    }

    #[tokio::test]
    async fn filters_by_bbox_and_since() {
        let service = MemoryService::new("t");
        service.upsert(rec("old", 1.0), Time(10.0));
        service.upsert(rec("new", 2.0), Time(20.0));
        service.upsert(rec("far", 100.0), Time(20.0));

        let bbox = GeoBounds::new(0.0, -1.0, 10.0, 1.0);
        let full = service
            .load_page(FeatureQuery::new(bbox, 10).since(Time(15.0)))
            .await
            .expect("page");
        assert_eq!(full.features.len(), 2);

        let delta = service
            .update_page(FeatureQuery::new(bbox, 10).since(Time(15.0)))
            .await
            .expect("page");
        let ids: Vec<&str> = delta.features.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
        assert_eq!(service.page_requests(), 2);
    }

    #[tokio::test]
    async fn offset_past_end_is_an_empty_last_page() {
        let service = MemoryService::with_records("t", vec![rec("a", 0.0)]);
        let page = service
            .load_page(FeatureQuery::new(GeoBounds::WORLD, 5).at_offset(9))
            .await
            .expect("page");
        assert!(page.features.is_empty());
        assert_eq!(page.next, None);
        assert!(service.load_style().await.expect("style").is_none());
    }
}
