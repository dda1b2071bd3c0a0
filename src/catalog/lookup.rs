//! Catalog lookup boundary

use std::fmt;

use serde::{Deserialize, Serialize};

/// Catalog entities addressable by name or id within a study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Study,
    File,
    Sample,
    Cohort,
    Score,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Study => "study",
            EntityKind::File => "file",
            EntityKind::Sample => "sample",
            EntityKind::Cohort => "cohort",
            EntityKind::Score => "score",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// VCF header section a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeaderKind {
    Info,
    Format,
}

/// Declared value type of an INFO or FORMAT field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

impl HeaderType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, HeaderType::Integer | HeaderType::Float)
    }
}

/// One `##INFO` or `##FORMAT` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderLine {
    pub id: String,
    pub kind: HeaderKind,
    #[serde(rename = "type")]
    pub value_type: HeaderType,
    #[serde(default)]
    pub number: Option<String>,
}

/// Read-only view over catalog metadata needed for schema and query work.
///
/// Names that parse as integers may be treated as ids by implementations.
pub trait CatalogLookup: Send + Sync {
    /// Current project release
    fn project_release(&self) -> u32;

    fn study_ids(&self) -> Vec<u32>;

    fn resolve_study(&self, name: &str) -> Option<u32>;

    /// Id of a study-scoped entity (`File`, `Sample`, `Cohort`, `Score`)
    fn resolve(&self, kind: EntityKind, study: u32, name: &str) -> Option<u32>;

    fn name_of(&self, kind: EntityKind, study: u32, id: u32) -> Option<String>;

    /// Every id of a study-scoped entity kind, ascending
    fn ids(&self, kind: EntityKind, study: u32) -> Vec<u32>;

    /// Files of a sample, in load order
    fn files_of_sample(&self, study: u32, sample: u32) -> Vec<u32>;

    fn samples_of_file(&self, study: u32, file: u32) -> Vec<u32>;

    /// Whether a sample's data is split across several files
    fn is_multi_file_sample(&self, study: u32, sample: u32) -> bool;

    /// Files loaded into the variants table
    fn indexed_files(&self, study: u32) -> Vec<u32>;

    fn variant_header_lines(&self, study: u32, kind: HeaderKind) -> Vec<HeaderLine>;

    /// FORMAT keys stored per sample, in storage order (GT first)
    fn fixed_format(&self, study: u32) -> Vec<String>;

    /// INFO keys stored per file, in storage order
    fn fixed_attributes(&self, study: u32) -> Vec<String>;

    fn header_line(&self, study: u32, kind: HeaderKind, id: &str) -> Option<HeaderLine> {
        self.variant_header_lines(study, kind)
            .into_iter()
            .find(|line| line.id == id)
    }
}
