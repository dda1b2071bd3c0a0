//! Store configuration
//!
//! Loaded from a JSON file. Every field except `variants_table` has a
//! default; `validate()` runs on load.
//!
//! Error codes:
//! - VS_CONFIG_READ (FATAL)
//! - VS_CONFIG_PARSE (FATAL)
//! - VS_CONFIG_INVALID (FATAL)

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evolution::HUMAN_SPECIES;
use crate::keycodec::DEFAULT_MAX_ROW_LENGTH;
use crate::sql::{StatementBuilder, TableKind, TableName};

/// Smallest row length that still fits a hashed key
pub const MIN_ROW_LENGTH: usize = 64;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read(_) => "VS_CONFIG_READ",
            ConfigError::Parse(_) => "VS_CONFIG_PARSE",
            ConfigError::Invalid(_) => "VS_CONFIG_INVALID",
        }
    }
}

fn default_table_kind() -> TableKind {
    TableKind::View
}
fn default_species() -> String {
    HUMAN_SPECIES.to_string()
}
fn default_max_row_length() -> usize {
    DEFAULT_MAX_ROW_LENGTH
}
fn default_batch_size() -> usize {
    5000
}
fn default_first_attempt_timeout_ms() -> u64 {
    5_000
}
fn default_attempt_timeout_ms() -> u64 {
    30_000
}
fn default_max_lock_wait_ms() -> u64 {
    1_800_000
} // 30 min
fn default_lease_ms() -> u64 {
    300_000
} // 5 min
fn default_index_lease_ms() -> u64 {
    3_600_000
} // 60 min
fn default_slow_operation_ms() -> u64 {
    10_000
}
fn default_max_statement_retries() -> u32 {
    5
}
fn default_retry_backoff_min_ms() -> u64 {
    100
}
fn default_retry_backoff_max_ms() -> u64 {
    1_000
}
fn default_metadata_update_attempts() -> u32 {
    50
}

/// Schema evolution timings and bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionSettings {
    /// Columns per ALTER statement
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_first_attempt_timeout_ms")]
    pub first_attempt_timeout_ms: u64,

    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,

    /// Schema lock lease
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    #[serde(default = "default_index_lease_ms")]
    pub index_lease_ms: u64,

    #[serde(default = "default_slow_operation_ms")]
    pub slow_operation_ms: u64,

    #[serde(default = "default_max_statement_retries")]
    pub max_statement_retries: u32,

    #[serde(default = "default_retry_backoff_min_ms")]
    pub retry_backoff_min_ms: u64,

    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,

    #[serde(default = "default_metadata_update_attempts")]
    pub metadata_update_attempts: u32,
}

impl Default for EvolutionSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            first_attempt_timeout_ms: default_first_attempt_timeout_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
            lease_ms: default_lease_ms(),
            index_lease_ms: default_index_lease_ms(),
            slow_operation_ms: default_slow_operation_ms(),
            max_statement_retries: default_max_statement_retries(),
            retry_backoff_min_ms: default_retry_backoff_min_ms(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
            metadata_update_attempts: default_metadata_update_attempts(),
        }
    }
}

impl EvolutionSettings {
    pub fn first_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.first_attempt_timeout_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn max_lock_wait(&self) -> Duration {
        Duration::from_millis(self.max_lock_wait_ms)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn index_lease(&self) -> Duration {
        Duration::from_millis(self.index_lease_ms)
    }

    pub fn slow_operation(&self) -> Duration {
        Duration::from_millis(self.slow_operation_ms)
    }

    /// Lock attempts after the first one: `max_lock_wait / attempt_timeout`
    pub fn max_lock_attempts(&self) -> u64 {
        (self.max_lock_wait_ms / self.attempt_timeout_ms.max(1)).max(1)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("evolution.batch_size must be > 0".into()));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "evolution.attempt_timeout_ms must be > 0".into(),
            ));
        }
        if self.lease_ms == 0 || self.index_lease_ms == 0 {
            return Err(ConfigError::Invalid("evolution lease must be > 0".into()));
        }
        if self.retry_backoff_min_ms > self.retry_backoff_max_ms {
            return Err(ConfigError::Invalid(format!(
                "evolution.retry_backoff_min_ms ({}) exceeds retry_backoff_max_ms ({})",
                self.retry_backoff_min_ms, self.retry_backoff_max_ms
            )));
        }
        if self.metadata_update_attempts == 0 {
            return Err(ConfigError::Invalid(
                "evolution.metadata_update_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Query compilation defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Apply `skip` after fetching instead of as SQL `OFFSET`
    #[serde(default)]
    pub client_side_skip: bool,

    #[serde(default)]
    pub default_limit: Option<u64>,
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `namespace:table` or `table` (required)
    pub variants_table: String,

    #[serde(default = "default_table_kind")]
    pub table_kind: TableKind,

    /// Render `ns:table` as `"ns"."table"`
    #[serde(default)]
    pub namespace_mapping: bool,

    #[serde(default = "default_species")]
    pub species: String,

    #[serde(default = "default_max_row_length")]
    pub max_row_length: usize,

    #[serde(default)]
    pub evolution: EvolutionSettings,

    #[serde(default)]
    pub query: QuerySettings,
}

impl StoreConfig {
    pub fn new(variants_table: impl Into<String>) -> Self {
        Self {
            variants_table: variants_table.into(),
            table_kind: default_table_kind(),
            namespace_mapping: false,
            species: default_species(),
            max_row_length: default_max_row_length(),
            evolution: EvolutionSettings::default(),
            query: QuerySettings::default(),
        }
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: StoreConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.variants_table.trim().is_empty() {
            return Err(ConfigError::Invalid("variants_table must not be empty".into()));
        }
        if self.species.trim().is_empty() {
            return Err(ConfigError::Invalid("species must not be empty".into()));
        }
        if self.max_row_length <= MIN_ROW_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "max_row_length must be > {}, got {}",
                MIN_ROW_LENGTH, self.max_row_length
            )));
        }
        self.evolution.validate()
    }

    pub fn table_name(&self) -> TableName {
        TableName::parse(&self.variants_table)
    }

    pub fn statement_builder(&self) -> StatementBuilder {
        StatementBuilder::new(self.table_name(), self.table_kind, self.namespace_mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_config_defaults() {
        let config = StoreConfig::from_json(r#"{"variants_table": "opencga:variants"}"#).unwrap();
        assert_eq!(config.table_kind, TableKind::View);
        assert_eq!(config.species, "hsapiens");
        assert_eq!(config.max_row_length, 4096);
        assert_eq!(config.evolution, EvolutionSettings::default());
        assert_eq!(config.evolution.max_lock_attempts(), 60);
        assert!(!config.query.client_side_skip);
        assert_eq!(config.table_name().namespace(), Some("opencga"));
    }

    #[test]
    fn test_overrides() {
        let config = StoreConfig::from_json(
            r#"{
                "variants_table": "variants",
                "table_kind": "TABLE",
                "namespace_mapping": true,
                "evolution": {"batch_size": 10, "slow_operation_ms": 50},
                "query": {"client_side_skip": true, "default_limit": 100}
            }"#,
        )
        .unwrap();
        assert_eq!(config.table_kind, TableKind::Table);
        assert_eq!(config.evolution.batch_size, 10);
        assert_eq!(config.evolution.slow_operation(), Duration::from_millis(50));
        assert_eq!(config.evolution.lease(), Duration::from_secs(300));
        assert_eq!(config.query.default_limit, Some(100));
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            r#"{"variants_table": ""}"#,
            r#"{"variants_table": "v", "max_row_length": 64}"#,
            r#"{"variants_table": "v", "evolution": {"batch_size": 0}}"#,
            r#"{"variants_table": "v", "evolution": {"retry_backoff_min_ms": 2000}}"#,
        ];
        for case in cases {
            let err = StoreConfig::from_json(case).unwrap_err();
            assert_eq!(err.code(), "VS_CONFIG_INVALID", "{}", case);
        }
    }

    #[test]
    fn test_parse_and_read_errors() {
        assert_eq!(StoreConfig::from_json("{").unwrap_err().code(), "VS_CONFIG_PARSE");
        assert_eq!(
            StoreConfig::from_json("{}").unwrap_err().code(),
            "VS_CONFIG_PARSE"
        );
        let err = StoreConfig::load(Path::new("/nonexistent/variant-store.json")).unwrap_err();
        assert_eq!(err.code(), "VS_CONFIG_READ");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"variants_table": "ns:v", "species": "mmusculus"}}"#).unwrap();
        let config = StoreConfig::load(file.path()).unwrap();
        assert_eq!(config.species, "mmusculus");
        assert_eq!(config.statement_builder().escaped_table(), "\"ns:v\"");
    }
}
