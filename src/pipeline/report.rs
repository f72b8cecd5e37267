use crate::charts::{render_chart, ChartKind, ChartSpec};
use crate::error::Result;
use crate::metrics::ReportMetrics;
use crate::storage::DocumentStore;
use crate::types::{GoldView, ViewRow};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

#[derive(Debug)]
pub struct ChartOutcome {
    pub view: GoldView,
    pub path: PathBuf,
    /// Points plotted on success, the failure cause otherwise
    pub result: std::result::Result<usize, String>,
}

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub charts: Vec<ChartOutcome>,
}

impl ReportSummary {
    pub fn all_succeeded(&self) -> bool {
        self.charts.iter().all(|c| c.result.is_ok())
    }
}

fn chart_spec(view: GoldView, top_n: usize) -> ChartSpec {
    match view {
        GoldView::PermitDistribution => ChartSpec {
            kind: ChartKind::HorizontalBar,
            title: format!("Top {} Permit Types Distribution", top_n),
            x_label: "Number of Permits".to_string(),
            y_label: "Permit Type".to_string(),
            color: "skyblue",
        },
        GoldView::CommunityDistribution => ChartSpec {
            kind: ChartKind::VerticalBar,
            title: "Permits by Community Area".to_string(),
            x_label: "Community Area".to_string(),
            y_label: "Number of Permits".to_string(),
            color: "lightgreen",
        },
        GoldView::IssueTrend => ChartSpec {
            kind: ChartKind::Line,
            title: "Permit Issue Trend Over Time".to_string(),
            x_label: "Year".to_string(),
            y_label: "Number of Permits Issued".to_string(),
            color: "coral",
        },
    }
}

fn point_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a gold view as (label, count) pairs in stored order
async fn load_points(store: &dyn DocumentStore, view: GoldView, limit: Option<usize>) -> Result<Vec<(String, u64)>> {
    let documents = store.read_all(view.collection()).await?;
    let take = limit.unwrap_or(documents.len());
    documents
        .into_iter()
        .take(take)
        .map(|doc| {
            let row: ViewRow<Value> = serde_json::from_value(doc)?;
            Ok((point_label(&row.key), row.count))
        })
        .collect()
}

async fn render_view(
    store: &dyn DocumentStore,
    view: GoldView,
    path: &Path,
    top_n: usize,
) -> Result<usize> {
    let limit = (view == GoldView::PermitDistribution).then_some(top_n);
    let points = load_points(store, view, limit).await?;
    let svg = render_chart(&chart_spec(view, top_n), &points);
    fs::write(path, svg)?;
    Ok(points.len())
}

/// Render one chart per gold view into `output_dir`.
///
/// Charts are independent; a failed chart is recorded and the others are still drawn.
#[instrument(skip(store))]
pub async fn run_report(store: &dyn DocumentStore, output_dir: &Path, top_n: usize) -> Result<ReportSummary> {
    fs::create_dir_all(output_dir)?;
    let mut summary = ReportSummary::default();

    for view in GoldView::ALL {
        let path = output_dir.join(view.chart_file());
        let result = match render_view(store, view, &path, top_n).await {
            Ok(points) => {
                ReportMetrics::chart_rendered();
                info!("Saved {} plot to {}", view, path.display());
                Ok(points)
            }
            Err(e) => {
                ReportMetrics::chart_failed();
                error!("Error rendering {} plot: {}", view, e);
                Err(e.to_string())
            }
        };
        summary.charts.push(ChartOutcome { view, path, result });
    }

    Ok(summary)
}
