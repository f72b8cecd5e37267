use crate::constants::{
    COMMUNITY_AREA_FIELD, ISSUE_DATE_FIELD, PERMIT_ID_FIELD, PERMIT_TYPE_FIELD, SILVER_COLLECTION,
};
use crate::error::{PipelineError, Result};
use crate::metrics::AggregateMetrics;
use crate::storage::DocumentStore;
use crate::types::{GoldView, ViewRow};
use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info, instrument};

/// Result of computing and committing one gold view
#[derive(Debug)]
pub struct ViewOutcome {
    pub view: GoldView,
    /// Rows written on success, the failure cause otherwise
    pub result: std::result::Result<usize, String>,
}

#[derive(Debug, Default)]
pub struct AggregateReport {
    pub outcomes: Vec<ViewOutcome>,
}

impl AggregateReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failed_views(&self) -> Vec<GoldView> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.view)
            .collect()
    }
}

fn malformed(field: &str, record: &Value, value: &Value) -> PipelineError {
    let permit_id = match record.get(PERMIT_ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => "<unknown>".to_string(),
    };
    PipelineError::InvalidField {
        field: field.to_string(),
        permit_id,
        message: format!("cannot group by {}", value),
    }
}

/// Count silver records per permit type, most common first (ties by name)
pub fn permit_type_distribution(records: &[Value]) -> Result<Vec<ViewRow<String>>> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        match record.get(PERMIT_TYPE_FIELD) {
            Some(Value::String(permit_type)) => *counts.entry(permit_type.clone()).or_default() += 1,
            other => return Err(malformed(PERMIT_TYPE_FIELD, record, other.unwrap_or(&Value::Null))),
        }
    }

    let mut rows: Vec<ViewRow<String>> = counts
        .into_iter()
        .map(|(key, count)| ViewRow { key, count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    Ok(rows)
}

/// Count silver records per community area, ascending by area. Records without an area are skipped.
pub fn community_area_distribution(records: &[Value]) -> Result<Vec<ViewRow<i64>>> {
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for record in records {
        match record.get(COMMUNITY_AREA_FIELD) {
            None | Some(Value::Null) => continue,
            Some(value) => {
                let area = value
                    .as_i64()
                    .ok_or_else(|| malformed(COMMUNITY_AREA_FIELD, record, value))?;
                *counts.entry(area).or_default() += 1;
            }
        }
    }
    Ok(counts.into_iter().map(|(key, count)| ViewRow { key, count }).collect())
}

/// Count silver records per calendar year of issue, ascending. Records without a date are skipped.
pub fn issue_year_trend(records: &[Value]) -> Result<Vec<ViewRow<i32>>> {
    let mut counts: BTreeMap<i32, u64> = BTreeMap::new();
    for record in records {
        match record.get(ISSUE_DATE_FIELD) {
            None | Some(Value::Null) => continue,
            Some(value) => {
                let issued: NaiveDateTime = serde_json::from_value(value.clone())
                    .map_err(|_| malformed(ISSUE_DATE_FIELD, record, value))?;
                *counts.entry(issued.year()).or_default() += 1;
            }
        }
    }
    Ok(counts.into_iter().map(|(key, count)| ViewRow { key, count }).collect())
}

fn to_documents<K: Serialize>(rows: Vec<ViewRow<K>>) -> Result<Vec<Value>> {
    rows.into_iter()
        .map(|row| serde_json::to_value(row).map_err(PipelineError::from))
        .collect()
}

/// Compute one view's rows as documents ready to store
pub fn compute_view(view: GoldView, records: &[Value]) -> Result<Vec<Value>> {
    match view {
        GoldView::PermitDistribution => to_documents(permit_type_distribution(records)?),
        GoldView::CommunityDistribution => to_documents(community_area_distribution(records)?),
        GoldView::IssueTrend => to_documents(issue_year_trend(records)?),
    }
}

async fn build_view(store: &dyn DocumentStore, view: GoldView, records: &[Value]) -> Result<usize> {
    let documents = compute_view(view, records)?;
    let report = store.replace_collection(view.collection(), documents).await?;
    Ok(report.inserted)
}

/// Rebuild every gold view from the silver collection.
///
/// Views are independent: each is computed and committed on its own, and a
/// failure is recorded in its outcome without stopping the remaining views.
#[instrument(skip(store))]
pub async fn run_aggregate(store: &dyn DocumentStore) -> AggregateReport {
    let mut report = AggregateReport::default();

    let records = match store.read_all(SILVER_COLLECTION).await {
        Ok(records) => records,
        Err(e) => {
            error!("Error reading {}: {}", SILVER_COLLECTION, e);
            for view in GoldView::ALL {
                AggregateMetrics::view_failed();
                report.outcomes.push(ViewOutcome {
                    view,
                    result: Err(e.to_string()),
                });
            }
            return report;
        }
    };
    info!("Aggregating {} silver records", records.len());

    for view in GoldView::ALL {
        let result = match build_view(store, view, &records).await {
            Ok(rows) => {
                AggregateMetrics::view_written(rows);
                info!("Wrote {} rows to {}", rows, view.collection());
                Ok(rows)
            }
            Err(e) => {
                AggregateMetrics::view_failed();
                error!("Error creating gold view {}: {}", view, e);
                Err(e.to_string())
            }
        };
        report.outcomes.push(ViewOutcome { view, result });
    }

    report
}
