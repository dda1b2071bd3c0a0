//! Catalog metadata lookup
//!
//! The query compiler and schema manager resolve study, file, sample, cohort
//! and score names through `CatalogLookup`. `InMemoryCatalog` serves a JSON
//! snapshot.

mod errors;
mod lookup;
mod memory;

pub use errors::{CatalogError, CatalogResult};
pub use lookup::{CatalogLookup, EntityKind, HeaderKind, HeaderLine, HeaderType};
pub use memory::{
    CatalogSnapshot, EntityRecord, FileRecord, InMemoryCatalog, SampleRecord, StudyRecord,
};
