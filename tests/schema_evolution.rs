//! Schema evolution tests
//!
//! Several loaders share one table, one metadata document and one lock:
//! - every requested column exists once all workers return
//! - nothing stays pending
//! - each batch bumps the alter counter exactly once
//! - pending columns survive on disk across manager instances

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;
use variant_store::catalog::{
    CatalogLookup, CatalogSnapshot, FileRecord, InMemoryCatalog, SampleRecord, StudyRecord,
};
use variant_store::config::EvolutionSettings;
use variant_store::evolution::{
    FileMetadataStore, InMemoryMetadataStore, InMemoryStore, LeaseLock, MetadataStore,
    ProjectMetadata, SchemaLock, SchemaManager, SCHEMA_LOCK,
};
use variant_store::schema::{file_column, sample_column, study_column, study_columns, Column};
use variant_store::sql::{StatementBuilder, TableKind, TableName};

// =============================================================================
// Helper Functions
// =============================================================================

fn fast_settings() -> EvolutionSettings {
    EvolutionSettings {
        first_attempt_timeout_ms: 2000,
        attempt_timeout_ms: 2000,
        max_lock_wait_ms: 10_000,
        retry_backoff_min_ms: 1,
        retry_backoff_max_ms: 3,
        batch_size: 3,
        ..EvolutionSettings::default()
    }
}

fn statements() -> StatementBuilder {
    StatementBuilder::new(TableName::parse("opencga:variants"), TableKind::Table, false)
}

fn setup_shared(species: &str) -> (Arc<InMemoryStore>, Arc<InMemoryMetadataStore>, Arc<LeaseLock>) {
    (
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryMetadataStore::new(ProjectMetadata::new(species, 1))),
        Arc::new(LeaseLock::new()),
    )
}

fn setup_manager(
    store: &Arc<InMemoryStore>,
    metadata: Arc<dyn MetadataStore>,
    lock: &Arc<LeaseLock>,
) -> SchemaManager {
    SchemaManager::new(statements(), metadata, lock.clone(), store.clone(), fast_settings())
}

fn setup_catalog() -> InMemoryCatalog {
    let mut study = StudyRecord::new(1, "s1");
    for file in 1..=4u32 {
        study.files.push(FileRecord {
            id: file,
            name: format!("f{}.vcf", file),
            samples: vec![file * 10, file * 10 + 1],
            indexed: true,
        });
        for sample in [file * 10, file * 10 + 1] {
            study.samples.push(SampleRecord {
                id: sample,
                name: format!("S{}", sample),
                files: Vec::new(),
                multi_file: false,
            });
        }
    }
    InMemoryCatalog::new(CatalogSnapshot {
        release: 1,
        studies: vec![study],
    })
    .unwrap()
}

// =============================================================================
// Concurrency Tests
// =============================================================================

/// Workers asking for overlapping columns all succeed and converge.
#[test]
fn test_concurrent_workers_converge() {
    let (store, metadata, lock) = setup_shared("mmusculus");
    store.set_latency(Duration::from_millis(2));

    let mut handles = Vec::new();
    for worker in 0..6u32 {
        let manager = setup_manager(&store, metadata.clone(), &lock);
        handles.push(thread::spawn(move || {
            let columns: Vec<Column> = (0..8u32)
                .map(|i| file_column(1, (worker % 3) * 4 + i))
                .chain(std::iter::once(study_column(1)))
                .collect();
            manager.ensure_columns(&columns)
        }));
    }
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let table = statements().escaped_table();
    let names = store.column_names(&table);
    for file in 0..16u32 {
        assert!(names.contains(&file_column(1, file).name), "missing file {}", file);
    }
    assert!(names.contains(&study_column(1).name));

    let project = metadata.read().unwrap().value;
    assert!(project.pending_columns().unwrap().is_empty());
    assert!(project.alter_counter() >= 1);
}

/// Two loaders released together for the same study run a single ALTER.
#[test]
fn test_simultaneous_callers_share_one_alter() {
    let (store, metadata, lock) = setup_shared("mmusculus");
    store.set_latency(Duration::from_millis(5));
    setup_manager(&store, metadata.clone(), &lock)
        .create_table_if_needed()
        .unwrap();
    let alters_before = store.alter_add_count();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let manager = setup_manager(&store, metadata.clone(), &lock);
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            manager.ensure_columns(&study_columns(7))
        }));
    }
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(store.alter_add_count() - alters_before, 1);
    let names = store.column_names(&statements().escaped_table());
    for column in study_columns(7) {
        assert!(names.contains(&column.name), "missing {}", column.name);
    }
    let project = metadata.read().unwrap().value;
    assert!(project.pending_columns().unwrap().is_empty());
    assert_eq!(project.alter_counter(), 1);
}

/// Concurrent file registrations add every sample column of every file.
#[test]
fn test_concurrent_file_registration() {
    let (store, metadata, lock) = setup_shared("mmusculus");
    let catalog = Arc::new(setup_catalog());

    let mut handles = Vec::new();
    for file in 1..=4u32 {
        let manager = setup_manager(&store, metadata.clone(), &lock);
        let catalog = catalog.clone();
        handles.push(thread::spawn(move || {
            manager.register_new_files(1, &[file], catalog.as_ref())
        }));
    }
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let names = store.column_names(&statements().escaped_table());
    for file in 1..=4u32 {
        assert!(names.contains(&file_column(1, file).name));
        for sample in catalog.samples_of_file(1, file) {
            assert!(names.contains(&sample_column(1, sample).name));
        }
    }
}

/// Store conflicts are retried without losing columns.
#[test]
fn test_conflicts_are_retried() {
    let (store, metadata, lock) = setup_shared("mmusculus");
    let manager = setup_manager(&store, metadata.clone(), &lock);
    manager.create_table_if_needed().unwrap();
    store.inject_concurrent_mutations(2);

    manager
        .ensure_columns(&[file_column(2, 1), file_column(2, 2)])
        .unwrap();
    let names = store.column_names(&statements().escaped_table());
    assert!(names.contains(&file_column(2, 2).name));
}

// =============================================================================
// Persistence Tests
// =============================================================================

/// Columns left pending by a timed-out worker are added by the next one,
/// even from a fresh manager reading the same metadata file.
#[test]
fn test_pending_columns_survive_restart() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("project.json");
    let store = Arc::new(InMemoryStore::new());
    let lock = Arc::new(LeaseLock::new());

    let settings = EvolutionSettings {
        first_attempt_timeout_ms: 10,
        attempt_timeout_ms: 10,
        max_lock_wait_ms: 30,
        ..fast_settings()
    };

    {
        let metadata = Arc::new(FileMetadataStore::open_or_create(&path, ProjectMetadata::new("mmusculus", 1)).unwrap());
        let manager = SchemaManager::new(statements(), metadata, lock.clone(), store.clone(), settings.clone());
        manager.create_table_if_needed().unwrap();

        let held = lock
            .lock(SCHEMA_LOCK, Duration::from_secs(60), Duration::ZERO)
            .unwrap();
        let err = manager.ensure_columns(&[study_column(7)]).unwrap_err();
        assert!(err.is_lock_timeout());
        lock.unlock(&held).unwrap();
    }

    let metadata = Arc::new(FileMetadataStore::open_or_create(&path, ProjectMetadata::default()).unwrap());
    let pending = metadata.read().unwrap().value.pending_columns().unwrap();
    assert_eq!(pending, vec![study_column(7)]);

    let manager = SchemaManager::new(statements(), metadata.clone(), lock, store.clone(), settings);
    assert_eq!(manager.register_pending_columns().unwrap(), 1);
    assert!(store
        .column_names(&statements().escaped_table())
        .contains(&study_column(7).name));
    assert!(metadata.read().unwrap().value.pending_columns().unwrap().is_empty());
}
