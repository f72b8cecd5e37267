use crate::error::{PipelineError, Result};
use crate::metrics::IngestMetrics;
use crate::storage::{DocumentStore, InsertReport};
use crate::types::{PageSource, RawRecord};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Why the paging loop stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StopReason {
    TargetReached,
    ShortPage,
    EmptyPage,
    RequestFailed(String),
}

/// Records gathered by one paging run
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub pages: usize,
    /// Records received before truncation to the target count
    pub fetched: usize,
    pub stop_reason: StopReason,
}

impl FetchOutcome {
    pub fn is_partial(&self) -> bool {
        matches!(self.stop_reason, StopReason::RequestFailed(_))
    }
}

/// Page through `source` until `target_count` records are gathered or the source runs dry.
///
/// A failed page request ends the loop and whatever was gathered so far is returned;
/// the only error is a zero `page_size`.
pub async fn fetch(source: &dyn PageSource, page_size: usize, target_count: usize) -> Result<FetchOutcome> {
    if page_size == 0 {
        return Err(PipelineError::Config("page_size must be positive".to_string()));
    }

    let mut records: Vec<RawRecord> = Vec::new();
    let mut offset = 0;
    let mut pages = 0;

    let stop_reason = loop {
        if records.len() >= target_count {
            break StopReason::TargetReached;
        }

        let started = Instant::now();
        match source.fetch_page(page_size, offset).await {
            Ok(page) => {
                if page.is_empty() {
                    info!("No more data to fetch.");
                    break StopReason::EmptyPage;
                }
                let page_len = page.len();
                pages += 1;
                records.extend(page);
                IngestMetrics::page_fetched(page_len, started.elapsed().as_secs_f64());
                info!("Fetched {} records, total: {}", page_len, records.len());

                offset += page_size;
                if page_len < page_size {
                    info!("Reached end of dataset.");
                    break StopReason::ShortPage;
                }
            }
            Err(e) => {
                error!("Error fetching page at offset {} from {}: {}", offset, source.source_name(), e);
                IngestMetrics::page_failed();
                break StopReason::RequestFailed(e.to_string());
            }
        }
    };

    let fetched = records.len();
    if fetched > target_count {
        debug!("Discarding {} records past target {}", fetched - target_count, target_count);
        records.truncate(target_count);
    }

    Ok(FetchOutcome {
        records,
        pages,
        fetched,
        stop_reason,
    })
}

/// Replace `collection` with the fetched records, best effort per record
pub async fn persist(records: Vec<RawRecord>, store: &dyn DocumentStore, collection: &str) -> Result<InsertReport> {
    let documents: Vec<Value> = records.into_iter().map(Value::Object).collect();
    let report = store.replace_collection(collection, documents).await?;

    IngestMetrics::records_persisted(report.inserted, report.failed);
    if report.failed > 0 {
        warn!(
            "Inserted {} of {} records into {} ({} rejected)",
            report.inserted, report.attempted, collection, report.failed
        );
    } else {
        info!("Inserted {} records into {}", report.inserted, collection);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves `total` synthetic records, failing every request from `fail_at_page` on
    struct MockSource {
        total: usize,
        fail_at_page: Option<usize>,
        calls: Mutex<Vec<(usize, usize)>>,
    }

    impl MockSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                fail_at_page: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_at(total: usize, page: usize) -> Self {
            Self {
                fail_at_page: Some(page),
                ..Self::new(total)
            }
        }

        fn calls(&self) -> Vec<(usize, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for MockSource {
        fn source_name(&self) -> &str {
            "mock"
        }

        async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<RawRecord>> {
            let page_index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((limit, offset));
                calls.len() - 1
            };
            if self.fail_at_page.map_or(false, |p| page_index >= p) {
                return Err(PipelineError::Config("simulated timeout".to_string()));
            }
            let end = (offset + limit).min(self.total);
            Ok((offset.min(end)..end)
                .map(|n| {
                    let mut record = RawRecord::new();
                    record.insert("permit_".to_string(), json!(format!("{:06}", n)));
                    record
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_failure_after_two_pages_keeps_partial_result() {
        let source = MockSource::failing_at(10_000, 2);
        let outcome = fetch(&source, 1000, 100_000).await.unwrap();

        assert_eq!(outcome.records.len(), 2000);
        assert_eq!(outcome.pages, 2);
        assert!(outcome.is_partial());
        assert!(matches!(outcome.stop_reason, StopReason::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_offsets_advance_by_page_size() {
        let source = MockSource::new(25);
        let outcome = fetch(&source, 10, 100).await.unwrap();

        assert_eq!(source.calls(), vec![(10, 0), (10, 10), (10, 20)]);
        assert_eq!(outcome.records.len(), 25);
        assert_eq!(outcome.stop_reason, StopReason::ShortPage);
    }

    #[tokio::test]
    async fn test_empty_page_stops_loop() {
        let source = MockSource::new(20);
        let outcome = fetch(&source, 10, 100).await.unwrap();

        assert_eq!(outcome.records.len(), 20);
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.stop_reason, StopReason::EmptyPage);
    }

    #[tokio::test]
    async fn test_truncates_to_target_count() {
        let source = MockSource::new(1000);
        let outcome = fetch(&source, 300, 500).await.unwrap();

        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.fetched, 600);
        assert_eq!(outcome.records.len(), 500);
        assert_eq!(outcome.stop_reason, StopReason::TargetReached);
        assert_eq!(outcome.records[499]["permit_"], json!("000499"));
    }

    #[tokio::test]
    async fn test_count_matches_pages_fetched() {
        let source = MockSource::new(47);
        let outcome = fetch(&source, 5, 1000).await.unwrap();
        assert_eq!(outcome.fetched, 47);
        assert_eq!(outcome.pages, 10);
        assert!(outcome.records.len() <= 1000);
    }

    #[tokio::test]
    async fn test_zero_target_makes_no_requests() {
        let source = MockSource::new(10);
        let outcome = fetch(&source, 5, 0).await.unwrap();
        assert!(outcome.records.is_empty());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_page_size_is_config_error() {
        let source = MockSource::new(10);
        let err = fetch(&source, 0, 10).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[tokio::test]
    async fn test_persist_replaces_collection() {
        let store = InMemoryStore::new();
        store
            .replace_collection("bronze_permits", vec![json!({"permit_": "stale"})])
            .await
            .unwrap();

        let source = MockSource::new(3);
        let outcome = fetch(&source, 10, 100).await.unwrap();
        let report = persist(outcome.records, &store, "bronze_permits").await.unwrap();

        assert_eq!(report.inserted, 3);
        let docs = store.read_all("bronze_permits").await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["permit_"], json!("000000"));
    }
}
