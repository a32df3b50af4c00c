//! Chunked, cancellable fetch of one refresh cycle's features.

use foundation::{GeoBounds, Time};

use crate::record::{FeatureRecord, dedupe_by_id};
use crate::request::RequestTicket;
use crate::service::{FeatureQuery, FeatureService, ServiceError};

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FetchMode {
    /// Every feature in the query box.
    Keyframe,
    /// Features changed after `since`.
    Delta { since: Time },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub bounds: GeoBounds,
    pub mode: FetchMode,
    pub page_size: usize,
    /// Upper bound on pages per query box.
    pub max_pages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Complete(Vec<FeatureRecord>),
    /// A newer request was issued while this one was running.
    Superseded,
}

/// Fetches every page for `request`, checking `ticket` before and after
/// each page.
///
/// Boxes wider than 180° are queried as two sub-boxes and the results merged
/// without duplicate ids (first occurrence wins).
pub async fn fetch_features(
    service: &dyn FeatureService,
    ticket: &RequestTicket,
    request: &FetchRequest,
) -> Result<FetchOutcome, ServiceError> {
    let boxes = request.bounds.split_for_query();
    let mut records = Vec::new();

    for bbox in boxes {
        let mut query = FeatureQuery::new(bbox, request.page_size.max(1));
        if let FetchMode::Delta { since } = request.mode {
            query = query.since(since);
        }

        let mut pages = 0;
        loop {
            if !ticket.is_current() {
                return Ok(FetchOutcome::Superseded);
            }
            let page = match request.mode {
                FetchMode::Keyframe => service.load_page(query.clone()).await?,
                FetchMode::Delta { .. } => service.update_page(query.clone()).await?,
            };
            if !ticket.is_current() {
                return Ok(FetchOutcome::Superseded);
            }

            pages += 1;
            records.extend(page.features);
            match page.next {
                Some(next) if pages < request.max_pages.max(1) => {
                    query = query.at_offset(next);
                }
                Some(_) => {
                    tracing::warn!(
                        request = ticket.id().0,
                        pages,
                        "page limit reached; remaining features ignored"
                    );
                    break;
                }
                None => break,
            }
        }
    }

    Ok(FetchOutcome::Complete(dedupe_by_id(records)))
}

#[cfg(test)]
mod tests {
    use super::{FetchMode, FetchOutcome, FetchRequest, fetch_features};
    use crate::memory::MemoryService;
    use crate::record::FeatureRecord;
    use crate::request::RequestTracker;
    use crate::service::{BoxFuture, FeaturePage, FeatureQuery, FeatureService, ServiceError};
    use foundation::{GeoBounds, Time};
    use scene::components::FeatureGeometry;

    fn rec(id: &str, lon: f64) -> FeatureRecord {
        FeatureRecord::new(id, FeatureGeometry::point(lon, 0.0))
    }

    fn request(bounds: GeoBounds, page_size: usize) -> FetchRequest {
        FetchRequest {
            bounds,
            mode: FetchMode::Keyframe,
            page_size,
            max_pages: 100,
        }
    }

    fn ids(outcome: FetchOutcome) -> Vec<String> {
        match outcome {
            FetchOutcome::Complete(records) => records.into_iter().map(|r| r.id).collect(),
            FetchOutcome::Superseded => panic!("unexpected supersede"),
        }
    }

    #[tokio::test]
    async fn collects_all_pages() {
        let service = MemoryService::with_records(
            "t",
            (0..7).map(|i| rec(&format!("f{i}"), i as f64)).collect(),
        );
        let tracker = RequestTracker::new();
        let bounds = GeoBounds::new(-1.0, -1.0, 10.0, 1.0);
        let out = fetch_features(&service, &tracker.issue(), &request(bounds, 3))
            .await
            .expect("fetch");
        assert_eq!(ids(out).len(), 7);
        assert_eq!(service.page_requests(), 3);
    }

    #[tokio::test]
    async fn world_box_returns_shared_edge_record_once() {
        let service = MemoryService::with_records(
            "t",
            vec![rec("meridian", 0.0), rec("west", -90.0), rec("east", 90.0)],
        );
        let tracker = RequestTracker::new();
        let out = fetch_features(&service, &tracker.issue(), &request(GeoBounds::WORLD, 10))
            .await
            .expect("fetch");
        // [-180, 0] and [0, 180] both contain lon 0.
        assert_eq!(ids(out), vec!["meridian", "west", "east"]);
        assert_eq!(service.page_requests(), 2);
    }

    #[tokio::test]
    async fn antimeridian_split_queries_both_halves() {
        let service = MemoryService::with_records(
            "t",
            vec![rec("east", 170.0), rec("middle", 0.0), rec("west", -170.0)],
        );
        let tracker = RequestTracker::new();
        let bounds = GeoBounds::new(80.0, -30.0, -80.0, 30.0);
        let out = fetch_features(&service, &tracker.issue(), &request(bounds, 10))
            .await
            .expect("fetch");
        assert_eq!(ids(out), vec!["east", "west"]);
        assert_eq!(service.page_requests(), 2);
    }

    /// Answers every query with the same records, ignoring the box.
    struct Everywhere(Vec<FeatureRecord>);

    impl FeatureService for Everywhere {
        fn describe(&self) -> String {
            "everywhere".into()
        }

        fn load_page(&self, _query: FeatureQuery) -> BoxFuture<'_, Result<FeaturePage, ServiceError>> {
            let features = self.0.clone();
            Box::pin(async move {
                Ok(FeaturePage {
                    features,
                    next: None,
                })
            })
        }

        fn load_style(&self) -> BoxFuture<'_, Result<Option<String>, ServiceError>> {
            Box::pin(async { Ok(None) })
        }
    }

    #[tokio::test]
    async fn split_results_merge_without_duplicate_ids() {
        let service = Everywhere(vec![rec("a", 179.0), rec("b", -179.0)]);
        let tracker = RequestTracker::new();
        let bounds = GeoBounds::new(80.0, -30.0, -80.0, 30.0);
        let out = fetch_features(&service, &tracker.issue(), &request(bounds, 10))
            .await
            .expect("fetch");
        assert_eq!(ids(out), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn stale_ticket_returns_superseded() {
        let service = MemoryService::with_records("t", vec![rec("a", 0.0)]);
        let tracker = RequestTracker::new();
        let stale = tracker.issue();
        let _newer = tracker.issue();
        let out = fetch_features(&service, &stale, &request(GeoBounds::WORLD, 10))
            .await
            .expect("fetch");
        assert_eq!(out, FetchOutcome::Superseded);
        assert_eq!(service.page_requests(), 0);
    }

    /// Issues a newer request while answering the first page.
    struct Interrupting {
        inner: MemoryService,
        tracker: RequestTracker,
    }

    impl FeatureService for Interrupting {
        fn describe(&self) -> String {
            "interrupting".into()
        }

        fn load_page(&self, query: FeatureQuery) -> BoxFuture<'_, Result<FeaturePage, ServiceError>> {
            self.tracker.issue();
            self.inner.load_page(query)
        }

        fn load_style(&self) -> BoxFuture<'_, Result<Option<String>, ServiceError>> {
            self.inner.load_style()
        }
    }

    #[tokio::test]
    async fn supersede_during_a_page_discards_the_result() {
        let tracker = RequestTracker::new();
        let service = Interrupting {
            inner: MemoryService::with_records("t", vec![rec("a", 0.0)]),
            tracker: tracker.clone(),
        };
        let ticket = tracker.issue();
        let out = fetch_features(&service, &ticket, &request(GeoBounds::WORLD, 10))
            .await
            .expect("fetch");
        assert_eq!(out, FetchOutcome::Superseded);
    }

    #[tokio::test]
    async fn delta_mode_uses_update_pages() {
        let service = MemoryService::new("t");
        service.upsert(rec("old", 0.0), Time(1.0));
        service.upsert(rec("new", 1.0), Time(5.0));
        let tracker = RequestTracker::new();
        let req = FetchRequest {
            mode: FetchMode::Delta { since: Time(2.0) },
            ..request(GeoBounds::WORLD, 10)
        };
        let out = fetch_features(&service, &tracker.issue(), &req)
            .await
            .expect("fetch");
        assert_eq!(ids(out), vec!["new"]);
    }

    #[tokio::test]
    async fn page_limit_stops_early() {
        let service = MemoryService::with_records(
            "t",
            (0..10).map(|i| rec(&format!("f{i}"), 0.0)).collect(),
        );
        let tracker = RequestTracker::new();
        let req = FetchRequest {
            max_pages: 2,
            ..request(GeoBounds::new(-1.0, -1.0, 1.0, 1.0), 3)
        };
        let out = fetch_features(&service, &tracker.issue(), &req)
            .await
            .expect("fetch");
        assert_eq!(ids(out).len(), 6);
        assert_eq!(service.page_requests(), 2);
    }
}
