use crate::constants::{
    BRONZE_COLLECTION, COMMUNITY_AREA_FIELD, ISSUE_DATE_FIELD, PERMIT_ID_FIELD, PERMIT_TYPE_FIELD,
    REQUIRED_FIELDS, SILVER_COLLECTION, WORK_DESCRIPTION_FIELD,
};
use crate::error::{PipelineError, Result};
use crate::metrics::CleanMetrics;
use crate::storage::DocumentStore;
use crate::types::{CleanedRecord, RawRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Accepted `issue_date` layouts, tried in order after RFC 3339
const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Counts from one clean run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub read: usize,
    pub dropped_missing_fields: usize,
    pub duplicates_removed: usize,
    pub written: usize,
    pub rejected: usize,
}

/// Filter, normalize and deduplicate raw documents.
///
/// Documents are handled in the order given; the first document seen for a permit id wins.
/// Any unparseable `issue_date` or `community_area` fails the whole batch.
pub fn clean_records(raw: Vec<Value>) -> Result<(Vec<CleanedRecord>, CleanReport)> {
    let mut report = CleanReport {
        read: raw.len(),
        ..CleanReport::default()
    };

    let mut normalized = Vec::with_capacity(raw.len());
    for document in raw {
        let record = match document {
            Value::Object(map) if has_required_fields(&map) => map,
            _ => {
                report.dropped_missing_fields += 1;
                continue;
            }
        };
        normalized.push(normalize_record(record)?);
    }

    let mut seen = HashSet::with_capacity(normalized.len());
    let mut cleaned = Vec::with_capacity(normalized.len());
    for record in normalized {
        if seen.insert(record.permit_id.clone()) {
            cleaned.push(record);
        } else {
            report.duplicates_removed += 1;
        }
    }

    Ok((cleaned, report))
}

/// Every required field is present and not null
pub fn has_required_fields(record: &RawRecord) -> bool {
    REQUIRED_FIELDS
        .iter()
        .all(|field| record.get(*field).map_or(false, |v| !v.is_null()))
}

/// Normalize one raw record that already passed the presence check
pub fn normalize_record(mut record: RawRecord) -> Result<CleanedRecord> {
    let permit_id = match record.remove(PERMIT_ID_FIELD) {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(PipelineError::InvalidField {
                field: PERMIT_ID_FIELD.to_string(),
                permit_id: other.to_string(),
                message: "expected a string or number".to_string(),
            })
        }
        None => return Err(PipelineError::MissingField(PERMIT_ID_FIELD.to_string())),
    };

    let invalid = |field: &str, message: String| PipelineError::InvalidField {
        field: field.to_string(),
        permit_id: permit_id.clone(),
        message,
    };

    let permit_type = match record.remove(PERMIT_TYPE_FIELD) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => return Err(invalid(PERMIT_TYPE_FIELD, format!("expected a string, got {}", other))),
        None => return Err(PipelineError::MissingField(PERMIT_TYPE_FIELD.to_string())),
    };

    let work_description = match record.remove(WORK_DESCRIPTION_FIELD) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    };

    let issue_date = match record.remove(ISSUE_DATE_FIELD) {
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(
            parse_issue_date(&s).ok_or_else(|| invalid(ISSUE_DATE_FIELD, format!("unparseable date '{}'", s)))?,
        ),
        Some(Value::Null) | None => None,
        Some(other) => return Err(invalid(ISSUE_DATE_FIELD, format!("expected a date string, got {}", other))),
    };

    let community_area = match record.remove(COMMUNITY_AREA_FIELD) {
        Some(value) => coerce_community_area(&value).map_err(|message| invalid(COMMUNITY_AREA_FIELD, message))?,
        None => None,
    };

    Ok(CleanedRecord {
        permit_id,
        permit_type,
        work_description,
        issue_date,
        community_area,
        extra: record,
    })
}

/// Parse the dataset's floating timestamps (`2006-01-05T00:00:00.000`), RFC 3339 or a bare date
pub fn parse_issue_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in &DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `""` and null become `None`; integers, integer strings and in-range finite numbers (truncated) are accepted
fn coerce_community_area(value: &Value) -> std::result::Result<Option<i64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("'{}' is not an integer", s)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .map(f64::trunc)
                    .filter(|f| (i64::MIN as f64..i64::MAX as f64).contains(f))
                    .map(|f| f as i64)
            })
            .map(Some)
            .ok_or_else(|| format!("{} is out of range", n)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

/// Rebuild the silver collection from the bronze collection.
///
/// Nothing is written unless every record cleans successfully, so a failed run
/// leaves the previous silver collection in place.
#[instrument(skip(store))]
pub async fn run_clean(store: &dyn DocumentStore) -> Result<CleanReport> {
    let raw = store.read_all(BRONZE_COLLECTION).await?;
    info!("Read {} records from {}", raw.len(), BRONZE_COLLECTION);

    let (cleaned, mut report) = match clean_records(raw) {
        Ok(result) => result,
        Err(e) => {
            CleanMetrics::failed();
            return Err(e);
        }
    };
    debug!(
        "Dropped {} records missing required fields, removed {} duplicates",
        report.dropped_missing_fields, report.duplicates_removed
    );

    let documents = cleaned
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let insert = store.replace_collection(SILVER_COLLECTION, documents).await?;
    report.written = insert.inserted;
    report.rejected = insert.failed;

    CleanMetrics::records_cleaned(
        report.read,
        report.dropped_missing_fields,
        report.duplicates_removed,
        report.written,
    );
    info!("Total rows in silver layer: {}", report.written);
    Ok(report)
}
