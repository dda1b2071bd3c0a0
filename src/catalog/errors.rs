//! Catalog snapshot errors
//!
//! Error codes:
//! - VS_CATALOG_IO
//! - VS_CATALOG_PARSE
//! - VS_CATALOG_DUPLICATE

use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Catalog I/O error: {0}")]
    Io(String),

    #[error("Catalog parse error: {0}")]
    Parse(String),

    #[error("Duplicate {kind} in study {study}: {name}")]
    Duplicate {
        kind: &'static str,
        study: u32,
        name: String,
    },
}

impl CatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Io(_) => "VS_CATALOG_IO",
            CatalogError::Parse(_) => "VS_CATALOG_PARSE",
            CatalogError::Duplicate { .. } => "VS_CATALOG_DUPLICATE",
        }
    }
}
