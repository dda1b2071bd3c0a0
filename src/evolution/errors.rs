//! Schema evolution errors
//!
//! Error codes:
//! - VS_EVOLUTION_LOCK_TIMEOUT (FATAL)
//! - VS_EVOLUTION_ILLEGAL_LOCK_STATUS (WARN when releasing)
//! - VS_EVOLUTION_SCHEMA_RACE (FATAL after retries)
//! - VS_EVOLUTION_STORE (FATAL)
//! - VS_EVOLUTION_METADATA_CONFLICT (FATAL)
//! - VS_EVOLUTION_METADATA_CORRUPT (FATAL)
//! - VS_EVOLUTION_IO (FATAL)
//! - VS_EVOLUTION_SCHEMA (delegated)

use thiserror::Error;

use crate::schema::SchemaError;

pub type EvolutionResult<T> = Result<T, EvolutionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvolutionError {
    #[error("Timed out after {waited_ms}ms waiting for lock '{resource}'")]
    LockTimeout { resource: String, waited_ms: u64 },

    #[error("Illegal lock status: {0}")]
    IllegalLockStatus(String),

    #[error("Concurrent schema mutation persisted after {attempts} attempts: {sql}")]
    SchemaRace { sql: String, attempts: u32 },

    #[error("Store error executing '{sql}': {reason}")]
    Store { sql: String, reason: String },

    #[error("Project metadata update conflicted {attempts} times")]
    MetadataConflict { attempts: u32 },

    #[error("Project metadata corrupt: {0}")]
    MetadataCorrupt(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl EvolutionError {
    pub fn code(&self) -> &'static str {
        match self {
            EvolutionError::LockTimeout { .. } => "VS_EVOLUTION_LOCK_TIMEOUT",
            EvolutionError::IllegalLockStatus(_) => "VS_EVOLUTION_ILLEGAL_LOCK_STATUS",
            EvolutionError::SchemaRace { .. } => "VS_EVOLUTION_SCHEMA_RACE",
            EvolutionError::Store { .. } => "VS_EVOLUTION_STORE",
            EvolutionError::MetadataConflict { .. } => "VS_EVOLUTION_METADATA_CONFLICT",
            EvolutionError::MetadataCorrupt(_) => "VS_EVOLUTION_METADATA_CORRUPT",
            EvolutionError::Io(_) => "VS_EVOLUTION_IO",
            EvolutionError::Schema(e) => e.code(),
        }
    }

    /// Everything except a stale unlock aborts the operation
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EvolutionError::IllegalLockStatus(_))
    }

    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, EvolutionError::LockTimeout { .. })
    }
}
