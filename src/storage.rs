use crate::config::StoreConfig;
use crate::db::SqliteStore;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// A stored document. Collections only accept JSON objects.
pub type Document = Value;

const STAGING_SUFFIX: &str = "__staging";

/// Outcome of a best-effort bulk write
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsertReport {
    pub attempted: usize,
    pub inserted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl InsertReport {
    fn record_failure(&mut self, index: usize, reason: impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("document {}: {}", index, reason));
    }
}

/// Storage trait for the pipeline's named collections.
///
/// Every write replaces a collection wholesale. Implementations stage the new
/// contents next to the live collection and swap them in one step, so readers
/// see either the old collection or the new one, never a mix.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Replace `collection` with `documents`. Each document is inserted on its own;
    /// rejected documents are counted in the report and do not stop the rest.
    async fn replace_collection(&self, collection: &str, documents: Vec<Document>) -> Result<InsertReport>;

    /// All documents in insertion order. A missing collection reads as empty.
    async fn read_all(&self, collection: &str) -> Result<Vec<Document>>;

    async fn count(&self, collection: &str) -> Result<usize>;

    /// The first document in insertion order, if any
    async fn find_one(&self, collection: &str) -> Result<Option<Document>>;

    async fn drop_collection(&self, collection: &str) -> Result<()>;

    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// Open the store described by the configuration
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    if config.is_memory() {
        info!("Using in-memory document store for database {}", config.db_name);
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let path = config.database_path();
    info!("Opening document store at {}", path.display());
    Ok(Arc::new(SqliteStore::open(&path)?))
}

/// Collection names end up in SQL identifiers, so only a conservative charset is allowed
pub fn validate_collection_name(name: &str) -> Result<()> {
    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let starts_ok = name.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
    if !valid_chars || !starts_ok || name.ends_with(STAGING_SUFFIX) {
        return Err(PipelineError::Store {
            message: format!("Invalid collection name '{}'", name),
        });
    }
    Ok(())
}

pub(crate) fn staging_name(collection: &str) -> String {
    format!("{}{}", collection, STAGING_SUFFIX)
}

pub(crate) fn is_staging_name(name: &str) -> bool {
    name.ends_with(STAGING_SUFFIX)
}

/// In-memory storage implementation for tests and throwaway runs
#[derive(Default)]
pub struct InMemoryStore {
    collections: Arc<Mutex<HashMap<String, Vec<Document>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<Document>>>> {
        self.collections.lock().map_err(|_| PipelineError::Store {
            message: "in-memory store lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn replace_collection(&self, collection: &str, documents: Vec<Document>) -> Result<InsertReport> {
        validate_collection_name(collection)?;

        let mut report = InsertReport {
            attempted: documents.len(),
            ..InsertReport::default()
        };
        let mut staged = Vec::with_capacity(documents.len());
        for (index, document) in documents.into_iter().enumerate() {
            if document.is_object() {
                staged.push(document);
                report.inserted += 1;
            } else {
                warn!("Rejected document {} for {}: not a JSON object", index, collection);
                report.record_failure(index, "not a JSON object");
            }
        }

        self.lock()?.insert(collection.to_string(), staged);
        debug!("Replaced {} with {} documents", collection, report.inserted);
        Ok(report)
    }

    async fn read_all(&self, collection: &str) -> Result<Vec<Document>> {
        validate_collection_name(collection)?;
        Ok(self.lock()?.get(collection).cloned().unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        validate_collection_name(collection)?;
        Ok(self.lock()?.get(collection).map_or(0, Vec::len))
    }

    async fn find_one(&self, collection: &str) -> Result<Option<Document>> {
        validate_collection_name(collection)?;
        Ok(self.lock()?.get(collection).and_then(|docs| docs.first().cloned()))
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        validate_collection_name(collection)?;
        self.lock()?.remove(collection);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
