use crate::error::{PipelineError, Result};
use crate::storage::{
    is_staging_name, staging_name, validate_collection_name, Document, DocumentStore, InsertReport,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// SQLite-backed document store.
///
/// Each collection is a table of JSON documents keyed by insertion sequence.
/// The table-level CHECK keeps anything but a JSON object out of a collection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Connected to document store {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PipelineError::Store {
            message: "document store connection lock poisoned".to_string(),
        })
    }

    fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn create_table_sql(table: &str) -> String {
        format!(
            "CREATE TABLE \"{}\" (
                seq INTEGER PRIMARY KEY,
                doc TEXT NOT NULL CHECK (json_valid(doc) AND json_type(doc) = 'object')
            )",
            table
        )
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn replace_collection(&self, collection: &str, documents: Vec<Document>) -> Result<InsertReport> {
        validate_collection_name(collection)?;
        let staging = staging_name(collection);

        let mut report = InsertReport {
            attempted: documents.len(),
            ..InsertReport::default()
        };

        let mut conn = self.lock()?;
        // Stage, fill and swap in one transaction; an error before commit rolls everything back
        let tx = conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\";", staging))?;
        tx.execute_batch(&Self::create_table_sql(&staging))?;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO \"{}\" (doc) VALUES (?1)", staging))?;
            for (index, document) in documents.iter().enumerate() {
                // A failed row only aborts its own statement, the transaction stays open
                match stmt.execute(params![document.to_string()]) {
                    Ok(_) => report.inserted += 1,
                    Err(e) => {
                        warn!("Rejected document {} for {}: {}", index, collection, e);
                        report.failed += 1;
                        report.errors.push(format!("document {}: {}", index, e));
                    }
                }
            }
        }
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{}\"; ALTER TABLE \"{}\" RENAME TO \"{}\";",
            collection, staging, collection
        ))?;
        tx.commit()?;

        debug!(
            "Replaced {} with {} documents ({} rejected)",
            collection, report.inserted, report.failed
        );
        Ok(report)
    }

    async fn read_all(&self, collection: &str) -> Result<Vec<Document>> {
        validate_collection_name(collection)?;
        let conn = self.lock()?;
        if !Self::table_exists(&conn, collection)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&format!("SELECT doc FROM \"{}\" ORDER BY seq", collection))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut documents = Vec::new();
        for row in rows {
            let text = row?;
            documents.push(serde_json::from_str(&text)?);
        }
        Ok(documents)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        validate_collection_name(collection)?;
        let conn = self.lock()?;
        if !Self::table_exists(&conn, collection)? {
            return Ok(0);
        }
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", collection),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn find_one(&self, collection: &str) -> Result<Option<Document>> {
        validate_collection_name(collection)?;
        let conn = self.lock()?;
        if !Self::table_exists(&conn, collection)? {
            return Ok(None);
        }
        let text: Option<String> = conn
            .query_row(
                &format!("SELECT doc FROM \"{}\" ORDER BY seq LIMIT 1", collection),
                [],
                |row| row.get(0),
            )
            .optional()?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        validate_collection_name(collection)?;
        let conn = self.lock()?;
        conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\";", collection))?;
        debug!("Dropped collection {}", collection);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names.into_iter().filter(|n| !is_staging_name(n)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_rejects_non_object_documents() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = store
            .replace_collection(
                "bronze_permits",
                vec![json!({"permit_": "1"}), json!([1, 2, 3]), json!(42), json!({"permit_": "2"})],
            )
            .await
            .unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(store.count("bronze_permits").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_read_all_preserves_insertion_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let docs: Vec<Document> = (0..5).map(|n| json!({"n": n})).collect();
        store.replace_collection("silver_permits", docs.clone()).await.unwrap();

        assert_eq!(store.read_all("silver_permits").await.unwrap(), docs);
        assert_eq!(store.find_one("silver_permits").await.unwrap(), Some(json!({"n": 0})));
    }

    #[tokio::test]
    async fn test_replace_swaps_whole_collection() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .replace_collection("gold_issue_trend", vec![json!({"key": 2019, "count": 3})])
            .await
            .unwrap();
        store
            .replace_collection(
                "gold_issue_trend",
                vec![json!({"key": 2020, "count": 1}), json!({"key": 2021, "count": 4})],
            )
            .await
            .unwrap();

        let docs = store.read_all("gold_issue_trend").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["key"], json!(2020));
        assert_eq!(store.list_collections().await.unwrap(), vec!["gold_issue_trend".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.read_all("silver_permits").await.unwrap().is_empty());
        assert_eq!(store.count("silver_permits").await.unwrap(), 0);
        assert!(store.find_one("silver_permits").await.unwrap().is_none());
        store.drop_collection("silver_permits").await.unwrap();
    }
}
