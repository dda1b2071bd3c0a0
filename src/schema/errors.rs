//! Schema error types
//!
//! Error codes:
//! - VS_SCHEMA_UNKNOWN_SQL_TYPE (FATAL, persisted metadata is corrupt)
//! - VS_SCHEMA_UNKNOWN_SOURCE (REJECT)
//! - VS_SCHEMA_INVALID_COLUMN (REJECT)

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Unknown SQL type: {0}")]
    UnknownSqlType(String),

    #[error("Unknown {kind} source: {source_name}")]
    UnknownSource { kind: &'static str, source_name: String },

    #[error("Invalid column: {0}")]
    InvalidColumn(String),
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::UnknownSqlType(_) => "VS_SCHEMA_UNKNOWN_SQL_TYPE",
            SchemaError::UnknownSource { .. } => "VS_SCHEMA_UNKNOWN_SOURCE",
            SchemaError::InvalidColumn(_) => "VS_SCHEMA_INVALID_COLUMN",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SchemaError::UnknownSqlType(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_severity() {
        let corrupt = SchemaError::UnknownSqlType("BLOB".into());
        assert_eq!(corrupt.code(), "VS_SCHEMA_UNKNOWN_SQL_TYPE");
        assert!(corrupt.is_fatal());

        let source = SchemaError::UnknownSource {
            kind: "conservation",
            source_name: "FOO".into(),
        };
        assert!(!source.is_fatal());
        assert_eq!(source.to_string(), "Unknown conservation source: FOO");
    }
}
