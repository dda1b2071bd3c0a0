//! In-memory catalog loaded from a JSON snapshot

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{CatalogError, CatalogResult};
use super::lookup::{CatalogLookup, EntityKind, HeaderKind, HeaderLine};

fn default_release() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_fixed_format() -> Vec<String> {
    vec!["GT".to_string()]
}

/// Serialized catalog contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default = "default_release")]
    pub release: u32,
    #[serde(default)]
    pub studies: Vec<StudyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub samples: Vec<SampleRecord>,
    #[serde(default)]
    pub cohorts: Vec<EntityRecord>,
    #[serde(default)]
    pub scores: Vec<EntityRecord>,
    #[serde(default = "default_fixed_format")]
    pub fixed_format: Vec<String>,
    #[serde(default)]
    pub fixed_attributes: Vec<String>,
    #[serde(default)]
    pub header_lines: Vec<HeaderLine>,
}

impl StudyRecord {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            files: Vec::new(),
            samples: Vec::new(),
            cohorts: Vec::new(),
            scores: Vec::new(),
            fixed_format: default_fixed_format(),
            fixed_attributes: Vec::new(),
            header_lines: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub samples: Vec<u32>,
    #[serde(default = "default_true")]
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub id: u32,
    pub name: String,
    /// Load order; derived from the file records when empty
    #[serde(default)]
    pub files: Vec<u32>,
    #[serde(default)]
    pub multi_file: bool,
}

struct StudyIndex {
    record: StudyRecord,
    names: HashMap<(EntityKind, String), u32>,
    ids: HashMap<(EntityKind, u32), String>,
}

impl StudyIndex {
    fn build(record: StudyRecord) -> CatalogResult<Self> {
        let mut names = HashMap::new();
        let mut ids = HashMap::new();
        let entries = record
            .files
            .iter()
            .map(|f| (EntityKind::File, f.id, f.name.clone()))
            .chain(record.samples.iter().map(|s| (EntityKind::Sample, s.id, s.name.clone())))
            .chain(record.cohorts.iter().map(|c| (EntityKind::Cohort, c.id, c.name.clone())))
            .chain(record.scores.iter().map(|s| (EntityKind::Score, s.id, s.name.clone())));

        for (kind, id, name) in entries {
            if names.insert((kind, name.clone()), id).is_some() || ids.insert((kind, id), name.clone()).is_some() {
                return Err(CatalogError::Duplicate {
                    kind: kind.as_str(),
                    study: record.id,
                    name,
                });
            }
        }
        Ok(Self { record, names, ids })
    }
}

/// `CatalogLookup` over a fixed snapshot
pub struct InMemoryCatalog {
    release: u32,
    studies: BTreeMap<u32, StudyIndex>,
    study_names: HashMap<String, u32>,
}

impl InMemoryCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> CatalogResult<Self> {
        let mut studies = BTreeMap::new();
        let mut study_names = HashMap::new();
        for record in snapshot.studies {
            let (id, name) = (record.id, record.name.clone());
            if study_names.insert(name.clone(), id).is_some() || studies.contains_key(&id) {
                return Err(CatalogError::Duplicate {
                    kind: EntityKind::Study.as_str(),
                    study: id,
                    name,
                });
            }
            studies.insert(id, StudyIndex::build(record)?);
        }
        Ok(Self {
            release: snapshot.release,
            studies,
            study_names,
        })
    }

    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let snapshot: CatalogSnapshot =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(snapshot)
    }

    pub fn load(path: &Path) -> CatalogResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CatalogError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    fn study(&self, study: u32) -> Option<&StudyRecord> {
        self.studies.get(&study).map(|s| &s.record)
    }
}

impl CatalogLookup for InMemoryCatalog {
    fn project_release(&self) -> u32 {
        self.release
    }

    fn study_ids(&self) -> Vec<u32> {
        self.studies.keys().copied().collect()
    }

    fn resolve_study(&self, name: &str) -> Option<u32> {
        if let Some(id) = self.study_names.get(name) {
            return Some(*id);
        }
        name.parse::<u32>()
            .ok()
            .filter(|id| self.studies.contains_key(id))
    }

    fn resolve(&self, kind: EntityKind, study: u32, name: &str) -> Option<u32> {
        if kind == EntityKind::Study {
            return self.resolve_study(name);
        }
        let index = self.studies.get(&study)?;
        if let Some(id) = index.names.get(&(kind, name.to_string())) {
            return Some(*id);
        }
        name.parse::<u32>()
            .ok()
            .filter(|id| index.ids.contains_key(&(kind, *id)))
    }

    fn name_of(&self, kind: EntityKind, study: u32, id: u32) -> Option<String> {
        if kind == EntityKind::Study {
            return self.study(id).map(|s| s.name.clone());
        }
        self.studies.get(&study)?.ids.get(&(kind, id)).cloned()
    }

    fn ids(&self, kind: EntityKind, study: u32) -> Vec<u32> {
        let Some(record) = self.study(study) else {
            return Vec::new();
        };
        let mut ids: Vec<u32> = match kind {
            EntityKind::Study => self.study_ids(),
            EntityKind::File => record.files.iter().map(|f| f.id).collect(),
            EntityKind::Sample => record.samples.iter().map(|s| s.id).collect(),
            EntityKind::Cohort => record.cohorts.iter().map(|c| c.id).collect(),
            EntityKind::Score => record.scores.iter().map(|s| s.id).collect(),
        };
        ids.sort_unstable();
        ids
    }

    fn files_of_sample(&self, study: u32, sample: u32) -> Vec<u32> {
        let Some(record) = self.study(study) else {
            return Vec::new();
        };
        match record.samples.iter().find(|s| s.id == sample) {
            Some(s) if !s.files.is_empty() => s.files.clone(),
            _ => record
                .files
                .iter()
                .filter(|f| f.samples.contains(&sample))
                .map(|f| f.id)
                .collect(),
        }
    }

    fn samples_of_file(&self, study: u32, file: u32) -> Vec<u32> {
        self.study(study)
            .and_then(|s| s.files.iter().find(|f| f.id == file))
            .map(|f| f.samples.clone())
            .unwrap_or_default()
    }

    fn is_multi_file_sample(&self, study: u32, sample: u32) -> bool {
        self.study(study)
            .and_then(|s| s.samples.iter().find(|x| x.id == sample))
            .map_or(false, |s| s.multi_file)
    }

    fn indexed_files(&self, study: u32) -> Vec<u32> {
        self.study(study)
            .map(|s| s.files.iter().filter(|f| f.indexed).map(|f| f.id).collect())
            .unwrap_or_default()
    }

    fn variant_header_lines(&self, study: u32, kind: HeaderKind) -> Vec<HeaderLine> {
        self.study(study)
            .map(|s| {
                s.header_lines
                    .iter()
                    .filter(|line| line.kind == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn fixed_format(&self, study: u32) -> Vec<String> {
        self.study(study)
            .map(|s| s.fixed_format.clone())
            .unwrap_or_default()
    }

    fn fixed_attributes(&self, study: u32) -> Vec<String> {
        self.study(study)
            .map(|s| s.fixed_attributes.clone())
            .unwrap_or_default()
    }
}
