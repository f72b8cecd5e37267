use crate::error::Result;
use crate::storage::DocumentStore;
use serde::Serialize;
use tracing::info;

/// Row count and field names of one collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub collection: String,
    pub count: usize,
    /// Fields of the first stored document, in stored order
    pub fields: Vec<String>,
}

pub async fn inspect(store: &dyn DocumentStore, collection: &str) -> Result<CollectionSummary> {
    let count = store.count(collection).await?;
    let fields = match store.find_one(collection).await? {
        Some(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };

    info!("Total rows in {}: {}", collection, count);
    if !fields.is_empty() {
        info!("Total columns: {}", fields.len());
        info!("Columns: {:?}", fields);
    }

    Ok(CollectionSummary {
        collection: collection.to_string(),
        count,
        fields,
    })
}
