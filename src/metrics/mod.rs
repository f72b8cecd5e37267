//! Metrics infrastructure for the permit pipeline
//!
//! Each stage records its counters through a dedicated struct in `stages`, so
//! every metric name is defined in exactly one place.

pub mod stages;

pub use stages::{AggregateMetrics, CleanMetrics, IngestMetrics, ReportMetrics};

use once_cell::sync::OnceCell;
use tracing::{info, warn};

static HANDLE: OnceCell<metrics_exporter_prometheus::PrometheusHandle> = OnceCell::new();

/// Macro to build stage metric names with a consistent shape:
/// permits_{stage}_{name}[_total]
macro_rules! stage_metric {
    (counter, $stage:literal, $name:literal) => {
        concat!("permits_", $stage, "_", $name, "_total")
    };
    (histogram, $stage:literal, $name:literal) => {
        concat!("permits_", $stage, "_", $name)
    };
}

pub(crate) use stage_metric;

/// Install the Prometheus recorder. Idempotent.
///
/// No HTTP listener is started: runs are short-lived, so the snapshot is rendered
/// in-process and pushed to a Pushgateway when one is configured.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_ok() {
                stages::register_all();
                info!("Prometheus recorder installed");
            }
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

pub fn get_handle() -> Option<&'static metrics_exporter_prometheus::PrometheusHandle> {
    HANDLE.get()
}

/// Render the current snapshot in Prometheus text format
pub fn render() -> Option<String> {
    get_handle().map(|h| h.render())
}
