use anyhow::Result;
use permit_pipeline::constants::{BRONZE_COLLECTION, SILVER_COLLECTION};
use permit_pipeline::db::SqliteStore;
use permit_pipeline::pipeline::Pipeline;
use permit_pipeline::storage::DocumentStore;
use permit_pipeline::types::GoldView;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;

fn open(dir: &std::path::Path) -> Result<Arc<dyn DocumentStore>> {
    Ok(Arc::new(SqliteStore::open(dir.join("permits.db"))?))
}

fn count_sum(rows: &[Value]) -> u64 {
    rows.iter().map(|r| r["count"].as_u64().unwrap()).sum()
}

async fn seed_bronze(store: &dyn DocumentStore) -> Result<()> {
    store
        .replace_collection(
            BRONZE_COLLECTION,
            vec![
                json!({"permit_": "1", "permit_type": " A ", "issue_date": "2020-01-01T00:00:00.000", "community_area": "5"}),
                json!({"permit_": "1", "permit_type": "A", "issue_date": "2020-01-01T00:00:00.000", "community_area": ""}),
                json!({"permit_": "2", "permit_type": "B", "issue_date": "2021-06-01T00:00:00.000", "community_area": "7"}),
                json!({"permit_": "3", "permit_type": "B", "issue_date": "2021-07-15T00:00:00.000"}),
                json!({"permit_": "4", "issue_date": "2021-07-15T00:00:00.000"}),
            ],
        )
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_clean_aggregate_report_on_disk() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = open(temp_dir.path())?;
    seed_bronze(store.as_ref()).await?;
    let pipeline = Pipeline::new(store.clone());

    let cleaned = pipeline.clean().await?;
    assert_eq!(cleaned.read, 5);
    assert_eq!(cleaned.dropped_missing_fields, 1);
    assert_eq!(cleaned.duplicates_removed, 1);
    assert_eq!(cleaned.written, 3);

    let silver = store.read_all(SILVER_COLLECTION).await?;
    assert_eq!(silver[0]["permit_"], json!("1"));
    assert_eq!(silver[0]["permit_type"], json!("A"));
    assert_eq!(silver[0]["community_area"], json!(5));

    let aggregated = pipeline.aggregate().await;
    assert!(aggregated.all_succeeded());

    let types = store.read_all(GoldView::PermitDistribution.collection()).await?;
    assert_eq!(types, vec![json!({"key": "B", "count": 2}), json!({"key": "A", "count": 1})]);
    assert_eq!(count_sum(&types), silver.len() as u64);

    // permit 3 has no area: counted by type, left out of the area view
    let areas = store.read_all(GoldView::CommunityDistribution.collection()).await?;
    assert_eq!(areas, vec![json!({"key": 5, "count": 1}), json!({"key": 7, "count": 1})]);

    let trend = store.read_all(GoldView::IssueTrend.collection()).await?;
    assert_eq!(trend, vec![json!({"key": 2020, "count": 1}), json!({"key": 2021, "count": 2})]);

    let charts_dir = temp_dir.path().join("charts");
    let summary = pipeline.report(&charts_dir, 10).await?;
    assert!(summary.all_succeeded());
    for view in GoldView::ALL {
        assert!(charts_dir.join(view.chart_file()).exists());
    }
    Ok(())
}

#[tokio::test]
async fn test_rerunning_clean_and_aggregate_is_stable() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = open(temp_dir.path())?;
    seed_bronze(store.as_ref()).await?;
    let pipeline = Pipeline::new(store.clone());

    pipeline.clean().await?;
    pipeline.aggregate().await;
    let first_silver = store.read_all(SILVER_COLLECTION).await?;
    let first_types = store.read_all(GoldView::PermitDistribution.collection()).await?;

    pipeline.clean().await?;
    pipeline.aggregate().await;
    assert_eq!(store.read_all(SILVER_COLLECTION).await?, first_silver);
    assert_eq!(store.read_all(GoldView::PermitDistribution.collection()).await?, first_types);
    Ok(())
}

#[tokio::test]
async fn test_failed_clean_keeps_silver_across_reopen() -> Result<()> {
    let temp_dir = tempdir()?;
    {
        let store = open(temp_dir.path())?;
        seed_bronze(store.as_ref()).await?;
        Pipeline::new(store).clean().await?;
    }

    let store = open(temp_dir.path())?;
    store
        .replace_collection(
            BRONZE_COLLECTION,
            vec![json!({"permit_": "9", "permit_type": "C", "issue_date": "not a date"})],
        )
        .await?;
    let pipeline = Pipeline::new(store.clone());

    assert!(pipeline.clean().await.is_err());
    assert_eq!(store.count(SILVER_COLLECTION).await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_inspect_lists_bronze_fields() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = open(temp_dir.path())?;
    seed_bronze(store.as_ref()).await?;

    let summary = Pipeline::new(store).inspect(BRONZE_COLLECTION).await?;
    assert_eq!(summary.count, 5);
    assert_eq!(summary.fields.len(), 4);
    Ok(())
}
