use crate::constants;
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";
pub const DEFAULT_STORE_URI: &str = "data";
pub const MEMORY_STORE_URI: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub source: SourceConfig,
    pub report: ReportConfig,
}

/// Where the document store lives. Comes from the environment, never from the TOML file.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub uri: String,
    pub db_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    pub page_size: usize,
    pub target_count: usize,
    pub timeout_secs: u64,
    pub order_field: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub top_n: usize,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    source: SourceConfig,
    #[serde(default)]
    report: ReportConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: constants::DEFAULT_ENDPOINT.to_string(),
            page_size: constants::DEFAULT_PAGE_SIZE,
            target_count: constants::DEFAULT_TARGET_COUNT,
            timeout_secs: constants::DEFAULT_TIMEOUT_SECS,
            order_field: constants::PERMIT_ID_FIELD.to_string(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            top_n: constants::DEFAULT_TOP_N,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(PipelineError::Config("page_size must be positive".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(PipelineError::Config("timeout_secs must be positive".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(PipelineError::Config("endpoint must not be empty".to_string()));
        }
        Ok(())
    }
}

impl StoreConfig {
    /// Build from raw environment values. `DB_NAME` is mandatory.
    pub fn from_vars(uri: Option<String>, db_name: Option<String>) -> Result<Self> {
        let db_name = db_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PipelineError::Config("DB_NAME environment variable not set".to_string()))?;
        if db_name.contains(|c: char| c == '/' || c == '\\') {
            return Err(PipelineError::Config(format!(
                "DB_NAME '{}' must not contain path separators",
                db_name
            )));
        }
        let uri = uri
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STORE_URI.to_string());
        Ok(Self { uri, db_name })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::var("STORE_URI").ok(), env::var("DB_NAME").ok())
    }

    pub fn is_memory(&self) -> bool {
        self.uri == MEMORY_STORE_URI
    }

    /// Path of the SQLite file backing this database
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.uri).join(format!("{}.db", self.db_name))
    }
}

impl Config {
    /// Load `.env`, the store settings from the environment, and the optional TOML file.
    ///
    /// An explicitly given path must exist; the default `pipeline.toml` is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let store = StoreConfig::from_env()?;
        let file = match config_path {
            Some(path) => Self::read_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::read_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => FileConfig::default(),
        };

        Ok(Self {
            store,
            source: file.source,
            report: file.report,
        })
    }

    fn read_file(path: &Path) -> Result<FileConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let file: FileConfig = toml::from_str(&content)?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_requires_db_name() {
        let err = StoreConfig::from_vars(Some("data".to_string()), None).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = StoreConfig::from_vars(None, Some("   ".to_string())).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_store_config_defaults_uri() {
        let store = StoreConfig::from_vars(None, Some("permits".to_string())).unwrap();
        assert_eq!(store.uri, "data");
        assert_eq!(store.database_path(), Path::new("data").join("permits.db"));
        assert!(!store.is_memory());
    }

    #[test]
    fn test_store_config_memory_uri() {
        let store = StoreConfig::from_vars(Some(":memory:".to_string()), Some("permits".to_string())).unwrap();
        assert!(store.is_memory());
    }

    #[test]
    fn test_store_config_rejects_path_in_db_name() {
        assert!(StoreConfig::from_vars(None, Some("../evil".to_string())).is_err());
    }

    #[test]
    fn test_file_config_partial_tables_use_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            [source]
            page_size = 250

            [report]
            top_n = 5
            "#,
        )
        .unwrap();

        assert_eq!(file.source.page_size, 250);
        assert_eq!(file.source.target_count, constants::DEFAULT_TARGET_COUNT);
        assert_eq!(file.source.endpoint, constants::DEFAULT_ENDPOINT);
        assert_eq!(file.source.order_field, "permit_");
        assert_eq!(file.report.top_n, 5);
        assert_eq!(file.report.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_source_config_validation() {
        assert!(SourceConfig::default().validate().is_ok());
        assert_eq!(SourceConfig::default().timeout(), Duration::from_secs(10));

        let zero_page = SourceConfig { page_size: 0, ..SourceConfig::default() };
        assert!(zero_page.validate().is_err());

        let zero_timeout = SourceConfig { timeout_secs: 0, ..SourceConfig::default() };
        assert!(zero_timeout.validate().is_err());
    }
}
