//! Project metadata and its compare-and-swap store
//!
//! Schema evolution persists two attributes:
//! - `pending_columns`: flattened `[name, sqlType, name, sqlType, ...]`
//! - `alter_counter`: number of completed ALTER rounds

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{Column, SqlType};

use super::errors::{EvolutionError, EvolutionResult};

pub const PENDING_COLUMNS_ATTRIBUTE: &str = "pending_columns";
pub const ALTER_COUNTER_ATTRIBUTE: &str = "alter_counter";

pub const HUMAN_SPECIES: &str = "hsapiens";

fn default_species() -> String {
    HUMAN_SPECIES.to_string()
}

fn default_release() -> u32 {
    1
}

/// Project-wide metadata shared by every worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default = "default_species")]
    pub species: String,
    #[serde(default = "default_release")]
    pub release: u32,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            species: default_species(),
            release: default_release(),
            attributes: BTreeMap::new(),
        }
    }
}

impl ProjectMetadata {
    pub fn new(species: impl Into<String>, release: u32) -> Self {
        Self {
            species: species.into(),
            release,
            attributes: BTreeMap::new(),
        }
    }

    pub fn is_human(&self) -> bool {
        self.species == HUMAN_SPECIES
    }

    /// Pending columns in first-insertion order
    pub fn pending_columns(&self) -> EvolutionResult<Vec<Column>> {
        let Some(value) = self.attributes.get(PENDING_COLUMNS_ATTRIBUTE) else {
            return Ok(Vec::new());
        };
        let flat: Vec<String> = serde_json::from_value(value.clone())
            .map_err(|e| EvolutionError::MetadataCorrupt(format!("{}: {}", PENDING_COLUMNS_ATTRIBUTE, e)))?;
        if flat.len() % 2 != 0 {
            return Err(EvolutionError::MetadataCorrupt(format!(
                "{} has odd length {}",
                PENDING_COLUMNS_ATTRIBUTE,
                flat.len()
            )));
        }
        flat.chunks(2)
            .map(|pair| -> EvolutionResult<Column> {
                let sql_type: SqlType = pair[1].parse()?;
                Ok(Column::new(pair[0].clone(), sql_type))
            })
            .collect()
    }

    pub fn set_pending_columns(&mut self, columns: &[Column]) {
        let flat: Vec<Value> = columns
            .iter()
            .flat_map(|c| {
                [
                    Value::String(c.name.clone()),
                    Value::String(c.sql_type.sql_name().to_string()),
                ]
            })
            .collect();
        self.attributes
            .insert(PENDING_COLUMNS_ATTRIBUTE.to_string(), Value::Array(flat));
    }

    pub fn alter_counter(&self) -> u64 {
        self.attributes
            .get(ALTER_COUNTER_ATTRIBUTE)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn set_alter_counter(&mut self, counter: u64) {
        self.attributes
            .insert(ALTER_COUNTER_ATTRIBUTE.to_string(), Value::from(counter));
    }
}

/// A value with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Shared project metadata with optimistic concurrency
pub trait MetadataStore: Send + Sync {
    fn read(&self) -> EvolutionResult<Versioned<ProjectMetadata>>;

    /// Replace the metadata if it is still at `expected_version`.
    ///
    /// Returns `false` on a version conflict.
    fn compare_and_swap(&self, expected_version: u64, metadata: ProjectMetadata) -> EvolutionResult<bool>;
}

/// Read-modify-write with retry on conflict.
///
/// Returns the metadata as written.
pub fn update_project_metadata<F>(
    store: &dyn MetadataStore,
    max_attempts: u32,
    mut update: F,
) -> EvolutionResult<ProjectMetadata>
where
    F: FnMut(&mut ProjectMetadata) -> EvolutionResult<()>,
{
    for _ in 0..max_attempts.max(1) {
        let current = store.read()?;
        let mut metadata = current.value;
        update(&mut metadata)?;
        if store.compare_and_swap(current.version, metadata.clone())? {
            return Ok(metadata);
        }
    }
    Err(EvolutionError::MetadataConflict {
        attempts: max_attempts,
    })
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local metadata store
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    inner: Mutex<Versioned<ProjectMetadata>>,
}

impl InMemoryMetadataStore {
    pub fn new(metadata: ProjectMetadata) -> Self {
        Self {
            inner: Mutex::new(Versioned {
                version: 0,
                value: metadata,
            }),
        }
    }
}

impl Default for Versioned<ProjectMetadata> {
    fn default() -> Self {
        Self {
            version: 0,
            value: ProjectMetadata::default(),
        }
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn read(&self) -> EvolutionResult<Versioned<ProjectMetadata>> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn compare_and_swap(&self, expected_version: u64, metadata: ProjectMetadata) -> EvolutionResult<bool> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.version != expected_version {
            return Ok(false);
        }
        inner.version += 1;
        inner.value = metadata;
        Ok(true)
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// On-disk envelope
#[derive(Debug, Serialize, Deserialize)]
struct MetadataEnvelope {
    version: u64,
    crc32: u32,
    metadata: ProjectMetadata,
}

fn compute_checksum(metadata: &ProjectMetadata) -> EvolutionResult<u32> {
    let bytes = serde_json::to_vec(metadata)
        .map_err(|e| EvolutionError::MetadataCorrupt(e.to_string()))?;
    let mut hasher = Hasher::new();
    hasher.update(&bytes);
    Ok(hasher.finalize())
}

/// JSON file store. Writes go to a temp file that is fsynced, then renamed.
#[derive(Debug)]
pub struct FileMetadataStore {
    path: PathBuf,
    temp_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileMetadataStore {
    /// Open an existing file, or create it with `initial`
    pub fn open_or_create(path: impl AsRef<Path>, initial: ProjectMetadata) -> EvolutionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let store = Self {
            temp_path: path.with_extension("tmp"),
            path,
            write_lock: Mutex::new(()),
        };
        if !store.path.exists() {
            store.write_envelope(0, initial)?;
        }
        store.read()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_envelope(&self, version: u64, metadata: ProjectMetadata) -> EvolutionResult<()> {
        let io = |action: &str, e: std::io::Error| {
            EvolutionError::Io(format!("{} {}: {}", action, self.temp_path.display(), e))
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| io("create dir for", e))?;
        }
        let envelope = MetadataEnvelope {
            version,
            crc32: compute_checksum(&metadata)?,
            metadata,
        };
        let content = serde_json::to_string_pretty(&envelope)
            .map_err(|e| EvolutionError::MetadataCorrupt(e.to_string()))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| io("create", e))?;
        file.write_all(content.as_bytes()).map_err(|e| io("write", e))?;
        file.sync_all().map_err(|e| io("fsync", e))?;
        fs::rename(&self.temp_path, &self.path).map_err(|e| io("rename", e))?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

impl MetadataStore for FileMetadataStore {
    fn read(&self) -> EvolutionResult<Versioned<ProjectMetadata>> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| EvolutionError::Io(format!("read {}: {}", self.path.display(), e)))?;
        let envelope: MetadataEnvelope = serde_json::from_str(&content)
            .map_err(|e| EvolutionError::MetadataCorrupt(e.to_string()))?;
        let actual = compute_checksum(&envelope.metadata)?;
        if actual != envelope.crc32 {
            return Err(EvolutionError::MetadataCorrupt(format!(
                "checksum mismatch in {}: expected {:08x}, found {:08x}",
                self.path.display(),
                envelope.crc32,
                actual
            )));
        }
        Ok(Versioned {
            version: envelope.version,
            value: envelope.metadata,
        })
    }

    fn compare_and_swap(&self, expected_version: u64, metadata: ProjectMetadata) -> EvolutionResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.read()?;
        if current.version != expected_version {
            return Ok(false);
        }
        self.write_envelope(expected_version + 1, metadata)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("1_ST", SqlType::UnsignedInt),
            Column::new("1_3_S", SqlType::VarcharArray),
        ]
    }

    #[test]
    fn test_pending_columns_flattened() {
        let mut metadata = ProjectMetadata::default();
        metadata.set_pending_columns(&columns());
        assert_eq!(
            metadata.attributes[PENDING_COLUMNS_ATTRIBUTE],
            serde_json::json!(["1_ST", "UNSIGNED_INT", "1_3_S", "VARCHAR ARRAY"])
        );
        assert_eq!(metadata.pending_columns().unwrap(), columns());
    }

    #[test]
    fn test_corrupt_pending_columns() {
        let mut metadata = ProjectMetadata::default();
        metadata.attributes.insert(
            PENDING_COLUMNS_ATTRIBUTE.to_string(),
            serde_json::json!(["1_ST"]),
        );
        assert!(matches!(
            metadata.pending_columns(),
            Err(EvolutionError::MetadataCorrupt(_))
        ));

        metadata.attributes.insert(
            PENDING_COLUMNS_ATTRIBUTE.to_string(),
            serde_json::json!(["1_ST", "BLOB"]),
        );
        assert!(matches!(metadata.pending_columns(), Err(EvolutionError::Schema(_))));
    }

    #[test]
    fn test_alter_counter_defaults_to_zero() {
        let mut metadata = ProjectMetadata::default();
        assert_eq!(metadata.alter_counter(), 0);
        metadata.set_alter_counter(7);
        assert_eq!(metadata.alter_counter(), 7);
    }

    #[test]
    fn test_in_memory_cas() {
        let store = InMemoryMetadataStore::new(ProjectMetadata::default());
        let first = store.read().unwrap();
        assert!(store.compare_and_swap(first.version, ProjectMetadata::new("mmusculus", 1)).unwrap());
        assert!(!store.compare_and_swap(first.version, ProjectMetadata::default()).unwrap());
        assert_eq!(store.read().unwrap().value.species, "mmusculus");
    }

    #[test]
    fn test_update_retries_on_conflict() {
        let store = InMemoryMetadataStore::new(ProjectMetadata::default());
        let mut calls = 0;
        let updated = update_project_metadata(&store, 5, |m| {
            calls += 1;
            if calls == 1 {
                // Another writer bumps the version between read and CAS
                let current = store.read()?;
                store.compare_and_swap(current.version, current.value)?;
            }
            m.set_alter_counter(m.alter_counter() + 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 2);
        assert_eq!(updated.alter_counter(), 1);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.json");
        let store = FileMetadataStore::open_or_create(&path, ProjectMetadata::default()).unwrap();

        let updated = update_project_metadata(&store, 3, |m| {
            m.set_pending_columns(&columns());
            Ok(())
        })
        .unwrap();
        assert_eq!(updated.pending_columns().unwrap().len(), 2);

        let reopened = FileMetadataStore::open_or_create(&path, ProjectMetadata::default()).unwrap();
        let read = reopened.read().unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.value.pending_columns().unwrap(), columns());
    }

    #[test]
    fn test_file_store_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.json");
        let store = FileMetadataStore::open_or_create(&path, ProjectMetadata::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("hsapiens", "mmusculus")).unwrap();
        assert!(matches!(store.read(), Err(EvolutionError::MetadataCorrupt(_))));
    }
}
