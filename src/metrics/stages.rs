//! Per-stage metric helpers

use super::stage_metric;

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn page_fetched(records: usize, duration_secs: f64) {
        ::metrics::counter!(stage_metric!(counter, "ingest", "pages_fetched")).increment(1);
        ::metrics::counter!(stage_metric!(counter, "ingest", "records_fetched")).increment(records as u64);
        ::metrics::histogram!(stage_metric!(histogram, "ingest", "page_duration_seconds")).record(duration_secs);
    }

    pub fn page_failed() {
        ::metrics::counter!(stage_metric!(counter, "ingest", "page_errors")).increment(1);
    }

    pub fn records_persisted(inserted: usize, failed: usize) {
        ::metrics::counter!(stage_metric!(counter, "ingest", "records_inserted")).increment(inserted as u64);
        ::metrics::counter!(stage_metric!(counter, "ingest", "insert_errors")).increment(failed as u64);
    }
}

pub struct CleanMetrics;

impl CleanMetrics {
    pub fn records_cleaned(read: usize, dropped: usize, duplicates: usize, written: usize) {
        ::metrics::counter!(stage_metric!(counter, "clean", "records_read")).increment(read as u64);
        ::metrics::counter!(stage_metric!(counter, "clean", "records_dropped")).increment(dropped as u64);
        ::metrics::counter!(stage_metric!(counter, "clean", "duplicates_removed")).increment(duplicates as u64);
        ::metrics::counter!(stage_metric!(counter, "clean", "records_written")).increment(written as u64);
    }

    pub fn failed() {
        ::metrics::counter!(stage_metric!(counter, "clean", "failures")).increment(1);
    }
}

pub struct AggregateMetrics;

impl AggregateMetrics {
    pub fn view_written(rows: usize) {
        ::metrics::counter!(stage_metric!(counter, "aggregate", "views_written")).increment(1);
        ::metrics::histogram!(stage_metric!(histogram, "aggregate", "view_rows")).record(rows as f64);
    }

    pub fn view_failed() {
        ::metrics::counter!(stage_metric!(counter, "aggregate", "view_failures")).increment(1);
    }
}

pub struct ReportMetrics;

impl ReportMetrics {
    pub fn chart_rendered() {
        ::metrics::counter!(stage_metric!(counter, "report", "charts_rendered")).increment(1);
    }

    pub fn chart_failed() {
        ::metrics::counter!(stage_metric!(counter, "report", "chart_failures")).increment(1);
    }
}

/// Record how long a stage ran
pub fn stage_duration(stage: &'static str, duration_secs: f64) {
    ::metrics::histogram!("permits_stage_duration_seconds", "stage" => stage).record(duration_secs);
}

/// Pre-register every metric so a snapshot lists them even before first use
pub(super) fn register_all() {
    use metrics::{counter, histogram};

    let _ = counter!(stage_metric!(counter, "ingest", "pages_fetched"));
    let _ = counter!(stage_metric!(counter, "ingest", "records_fetched"));
    let _ = counter!(stage_metric!(counter, "ingest", "page_errors"));
    let _ = counter!(stage_metric!(counter, "ingest", "records_inserted"));
    let _ = counter!(stage_metric!(counter, "ingest", "insert_errors"));
    let _ = histogram!(stage_metric!(histogram, "ingest", "page_duration_seconds"));

    let _ = counter!(stage_metric!(counter, "clean", "records_read"));
    let _ = counter!(stage_metric!(counter, "clean", "records_dropped"));
    let _ = counter!(stage_metric!(counter, "clean", "duplicates_removed"));
    let _ = counter!(stage_metric!(counter, "clean", "records_written"));
    let _ = counter!(stage_metric!(counter, "clean", "failures"));

    let _ = counter!(stage_metric!(counter, "aggregate", "views_written"));
    let _ = counter!(stage_metric!(counter, "aggregate", "view_failures"));
    let _ = histogram!(stage_metric!(histogram, "aggregate", "view_rows"));

    let _ = counter!(stage_metric!(counter, "report", "charts_rendered"));
    let _ = counter!(stage_metric!(counter, "report", "chart_failures"));
}
