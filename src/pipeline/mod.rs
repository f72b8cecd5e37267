// Medallion pipeline: bronze ingest, silver clean, gold aggregate, charts

pub mod aggregate;
pub mod clean;
pub mod ingestion;
pub mod inspect;
pub mod report;

pub use aggregate::{AggregateReport, ViewOutcome};
pub use clean::CleanReport;
pub use ingestion::{FetchOutcome, StopReason};
pub use inspect::CollectionSummary;
pub use report::{ChartOutcome, ReportSummary};

use crate::constants::{BRONZE_COLLECTION, SILVER_COLLECTION};
use crate::error::Result;
use crate::metrics::stages::stage_duration;
use crate::storage::{DocumentStore, InsertReport};
use crate::types::PageSource;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Result of one ingest run
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub pages: usize,
    pub fetched: usize,
    pub stop_reason: StopReason,
    /// `None` when nothing was fetched and the bronze collection was left alone
    pub insert: Option<InsertReport>,
}

impl IngestSummary {
    pub fn stored(&self) -> usize {
        self.insert.as_ref().map(|r| r.inserted).unwrap_or(0)
    }
}

/// Runs the pipeline stages against one store
pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch from `source` and replace the bronze collection with the result
    pub async fn ingest(&self, source: &dyn PageSource, page_size: usize, target_count: usize) -> Result<IngestSummary> {
        let span = tracing::info_span!("stage", stage = "ingest", run_id = %Uuid::new_v4(), source = %source.source_name());
        async {
            let started = Instant::now();
            let outcome = ingestion::fetch(source, page_size, target_count).await?;
            if outcome.is_partial() {
                warn!("Ingest stopped early after {} pages; keeping {} records", outcome.pages, outcome.records.len());
            }

            let insert = if outcome.records.is_empty() {
                warn!("No records fetched; leaving {} unchanged", BRONZE_COLLECTION);
                None
            } else {
                Some(ingestion::persist(outcome.records, self.store.as_ref(), BRONZE_COLLECTION).await?)
            };

            self.log_sample(BRONZE_COLLECTION).await?;
            stage_duration("ingest", started.elapsed().as_secs_f64());
            Ok(IngestSummary {
                pages: outcome.pages,
                fetched: outcome.fetched,
                stop_reason: outcome.stop_reason,
                insert,
            })
        }
        .instrument(span)
        .await
    }

    pub async fn clean(&self) -> Result<CleanReport> {
        let span = tracing::info_span!("stage", stage = "clean", run_id = %Uuid::new_v4());
        async {
            let started = Instant::now();
            let report = clean::run_clean(self.store.as_ref()).await?;
            self.log_sample(SILVER_COLLECTION).await?;
            stage_duration("clean", started.elapsed().as_secs_f64());
            Ok(report)
        }
        .instrument(span)
        .await
    }

    pub async fn aggregate(&self) -> AggregateReport {
        let span = tracing::info_span!("stage", stage = "aggregate", run_id = %Uuid::new_v4());
        async {
            let started = Instant::now();
            let report = aggregate::run_aggregate(self.store.as_ref()).await;
            stage_duration("aggregate", started.elapsed().as_secs_f64());
            report
        }
        .instrument(span)
        .await
    }

    pub async fn report(&self, output_dir: &Path, top_n: usize) -> Result<ReportSummary> {
        let span = tracing::info_span!("stage", stage = "report", run_id = %Uuid::new_v4());
        async {
            let started = Instant::now();
            let summary = report::run_report(self.store.as_ref(), output_dir, top_n).await?;
            stage_duration("report", started.elapsed().as_secs_f64());
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    pub async fn inspect(&self, collection: &str) -> Result<CollectionSummary> {
        inspect::inspect(self.store.as_ref(), collection).await
    }

    async fn log_sample(&self, collection: &str) -> Result<()> {
        let count = self.store.count(collection).await?;
        info!("Total rows in {}: {}", collection, count);
        if let Some(sample) = self.store.find_one(collection).await? {
            info!("Sample record: {}", sample);
        }
        Ok(())
    }
}
