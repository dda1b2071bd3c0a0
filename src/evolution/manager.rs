//! Schema manager: adds missing columns to the shared variants table
//!
//! Protocol for `ensure_columns`:
//! 1. Create the table under the schema lock if it does not exist
//! 2. Merge unknown columns into the persisted pending set
//! 3. Take the schema lock, re-read pending, ALTER in batches
//! 4. Clear the added columns from pending and bump the alter counter
//!
//! Pending columns survive a failed or timed-out worker; whoever next takes
//! the lock adds them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::catalog::CatalogLookup;
use crate::config::{EvolutionSettings, StoreConfig};
use crate::observability::{Logger, ObservationScope, Timer};
use crate::schema::{
    all_indices, file_column, human_population_columns, release_columns, sample_columns,
    score_indices, static_columns, stats_columns, study_columns, variant_score_column, Column,
};
use crate::sql::{StatementBuilder, TableKind};

use super::cache::ExistenceCache;
use super::errors::{EvolutionError, EvolutionResult};
use super::executor::StatementExecutor;
use super::lock::{LockToken, SchemaLock, INDEX_LOCK, SCHEMA_LOCK};
use super::metadata::{update_project_metadata, MetadataStore, ProjectMetadata};
use super::store::PhysicalStore;

pub const TABLE_CREATED_EVENT: &str = "SCHEMA_TABLE_CREATED";
pub const COLUMNS_ADDED_EVENT: &str = "SCHEMA_COLUMNS_ADDED";
pub const COLUMNS_REGISTERED_EVENT: &str = "SCHEMA_COLUMNS_REGISTERED";
pub const COLUMNS_DROPPED_EVENT: &str = "SCHEMA_COLUMNS_DROPPED";
pub const LOCK_WAIT_EVENT: &str = "SCHEMA_LOCK_WAIT";
pub const INDEX_SKIPPED_EVENT: &str = "SCHEMA_INDEX_SKIPPED";
pub const LOCK_RELEASE_EVENT: &str = "SCHEMA_LOCK_RELEASE";

/// Owns the schema of one variants table
pub struct SchemaManager {
    statements: StatementBuilder,
    metadata: Arc<dyn MetadataStore>,
    lock: Arc<dyn SchemaLock>,
    store: Arc<dyn PhysicalStore>,
    settings: EvolutionSettings,
    cache: Mutex<ExistenceCache>,
}

impl SchemaManager {
    pub fn new(
        statements: StatementBuilder,
        metadata: Arc<dyn MetadataStore>,
        lock: Arc<dyn SchemaLock>,
        store: Arc<dyn PhysicalStore>,
        settings: EvolutionSettings,
    ) -> Self {
        Self {
            statements,
            metadata,
            lock,
            store,
            settings,
            cache: Mutex::new(ExistenceCache::new()),
        }
    }

    pub fn from_config(
        config: &StoreConfig,
        metadata: Arc<dyn MetadataStore>,
        lock: Arc<dyn SchemaLock>,
        store: Arc<dyn PhysicalStore>,
    ) -> Self {
        Self::new(
            config.statement_builder(),
            metadata,
            lock,
            store,
            config.evolution.clone(),
        )
    }

    pub fn statements(&self) -> &StatementBuilder {
        &self.statements
    }

    pub fn settings(&self) -> &EvolutionSettings {
        &self.settings
    }

    fn executor(&self) -> StatementExecutor<'_> {
        StatementExecutor::new(self.store.as_ref(), &self.settings)
    }

    fn cache(&self) -> MutexGuard<'_, ExistenceCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn project(&self) -> EvolutionResult<ProjectMetadata> {
        Ok(self.metadata.read()?.value)
    }

    fn update_metadata<F>(&self, update: F) -> EvolutionResult<ProjectMetadata>
    where
        F: FnMut(&mut ProjectMetadata) -> EvolutionResult<()>,
    {
        update_project_metadata(
            self.metadata.as_ref(),
            self.settings.metadata_update_attempts,
            update,
        )
    }

    // =========================================================================
    // Core protocol
    // =========================================================================

    /// Make sure every column in `columns` exists in the table.
    ///
    /// Idempotent: columns already known to exist cost no store round-trip
    /// and no lock.
    pub fn ensure_columns(&self, columns: &[Column]) -> EvolutionResult<()> {
        let timer = Timer::new();
        self.create_table_if_needed()?;
        self.update_pending_columns(columns)?;
        let added = self.register_pending_columns()?;

        let requested = columns.len().to_string();
        let added = added.to_string();
        let fields = [("requested", requested.as_str()), ("added", added.as_str())];
        if !timer.warn_if_slow("ensure_columns", self.settings.slow_operation(), &fields) {
            let elapsed = timer.elapsed_ms();
            Logger::info(
                COLUMNS_REGISTERED_EVENT,
                &[fields[0], fields[1], ("elapsed_ms", &elapsed)],
            );
        }
        Ok(())
    }

    /// Flush whatever is pending. Returns the number of columns added.
    pub fn register_pending_columns(&self) -> EvolutionResult<usize> {
        let max_attempts = self.settings.max_lock_attempts();
        let mut attempt: u64 = 0;

        let token = loop {
            if self.update_pending_columns(&[])?.is_empty() {
                return Ok(0);
            }
            let timeout = if attempt == 0 {
                self.settings.first_attempt_timeout()
            } else {
                self.settings.attempt_timeout()
            };
            match self.lock.lock(SCHEMA_LOCK, self.settings.lease(), timeout) {
                Ok(token) => break token,
                Err(e) if e.is_lock_timeout() && attempt < max_attempts => {
                    attempt += 1;
                    Logger::info(
                        LOCK_WAIT_EVENT,
                        &[
                            ("attempt", &attempt.to_string()),
                            ("max_attempts", &max_attempts.to_string()),
                            ("resource", SCHEMA_LOCK),
                        ],
                    );
                }
                Err(e) => return Err(e),
            }
        };

        let result = self.add_pending_columns_locked();
        self.release(&token)?;
        result
    }

    /// Merge `new_columns` into pending and drop anything known to exist.
    ///
    /// Returns the pending set as written.
    fn update_pending_columns(&self, new_columns: &[Column]) -> EvolutionResult<Vec<Column>> {
        let table = self.statements.escaped_table();
        let executor = self.executor();

        let written = self.update_metadata(|project| {
            let mut merged = project.pending_columns()?;
            let mut seen: HashSet<String> = merged.iter().map(|c| c.name.clone()).collect();
            for column in new_columns {
                if seen.insert(column.name.clone()) {
                    merged.push(column.clone());
                }
            }

            let misses = {
                let mut cache = self.cache();
                cache.sync(project.alter_counter());
                cache.misses(&merged)
            };
            if !misses.is_empty() {
                let names: Vec<String> = misses.iter().map(|c| c.name.clone()).collect();
                let existing = executor.get_columns(&table, &names)?;
                self.cache().insert_all(&existing);
            }

            let cache = self.cache();
            merged.retain(|c| !cache.contains(&c.name));
            project.set_pending_columns(&merged);
            Ok(())
        })?;
        written.pending_columns()
    }

    /// Runs with the schema lock held
    fn add_pending_columns_locked(&self) -> EvolutionResult<usize> {
        let pending = self.update_pending_columns(&[])?;
        if pending.is_empty() {
            return Ok(0);
        }

        let table = self.statements.escaped_table();
        let count = pending.len().to_string();
        let scope = ObservationScope::with_fields(
            "SCHEMA_ALTER",
            &[("table", table.as_str()), ("columns", count.as_str())],
        );

        let executor = self.executor();
        for batch in pending.chunks(self.settings.batch_size.max(1)) {
            if let Err(e) = executor.execute(&self.statements.alter_add_columns(batch, true)) {
                scope.fail(&e.to_string());
                return Err(e);
            }
            let names: Vec<&str> = batch.iter().map(|c| c.name.as_str()).collect();
            Logger::info(
                COLUMNS_ADDED_EVENT,
                &[
                    ("count", &batch.len().to_string()),
                    ("columns", &names.join(",")),
                    ("table", &table),
                ],
            );
        }

        let added: HashSet<&str> = pending.iter().map(|c| c.name.as_str()).collect();
        let mut previous_counter = 0;
        let written = self.update_metadata(|project| {
            let mut remaining = project.pending_columns()?;
            remaining.retain(|c| !added.contains(c.name.as_str()));
            project.set_pending_columns(&remaining);
            previous_counter = project.alter_counter();
            project.set_alter_counter(previous_counter + 1);
            Ok(())
        })?;

        {
            let mut cache = self.cache();
            cache.advance(previous_counter, written.alter_counter());
            cache.insert_all(&pending);
        }
        scope.complete();
        Ok(pending.len())
    }

    // =========================================================================
    // Table lifecycle
    // =========================================================================

    /// `CREATE ... IF NOT EXISTS` under the schema lock.
    ///
    /// Returns whether this call created the table.
    pub fn create_table_if_needed(&self) -> EvolutionResult<bool> {
        let table = self.statements.escaped_table();
        let executor = self.executor();
        if executor.table_exists(&table)? {
            return Ok(false);
        }

        let token = self.lock_or_wait(SCHEMA_LOCK, self.settings.lease())?;
        let result = self.create_table_locked(&executor, &table);
        self.release(&token)?;
        result
    }

    fn create_table_locked(&self, executor: &StatementExecutor<'_>, table: &str) -> EvolutionResult<bool> {
        if executor.table_exists(table)? {
            return Ok(false);
        }
        if let Some(create_schema) = self.statements.create_schema() {
            executor.execute(&create_schema)?;
        }
        match executor.execute(&self.statements.create_table()) {
            Ok(()) => {
                Logger::info(
                    TABLE_CREATED_EVENT,
                    &[("kind", self.statements.kind().as_str()), ("table", table)],
                );
                Ok(true)
            }
            // Another worker without the lock may have created it
            Err(e) => {
                if executor.table_exists(table)? {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Short first attempt, then one long wait up to `max_lock_wait`
    fn lock_or_wait(&self, resource: &str, lease: Duration) -> EvolutionResult<LockToken> {
        match self
            .lock
            .lock(resource, lease, self.settings.first_attempt_timeout())
        {
            Err(e) if e.is_lock_timeout() => {
                Logger::info(
                    LOCK_WAIT_EVENT,
                    &[
                        ("max_wait_ms", &self.settings.max_lock_wait_ms.to_string()),
                        ("resource", resource),
                    ],
                );
                self.lock.lock(resource, lease, self.settings.max_lock_wait())
            }
            other => other,
        }
    }

    /// A stale token is logged and ignored
    fn release(&self, token: &LockToken) -> EvolutionResult<()> {
        match self.lock.unlock(token) {
            Ok(()) => Ok(()),
            Err(e @ EvolutionError::IllegalLockStatus(_)) => {
                Logger::warn(
                    LOCK_RELEASE_EVENT,
                    &[
                        ("code", e.code()),
                        ("reason", &e.to_string()),
                        ("resource", &token.resource),
                    ],
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Column groups
    // =========================================================================

    /// Static columns, release columns and, for human projects, population
    /// frequency columns. Also flushes anything left pending.
    pub fn register_annotation_columns(&self) -> EvolutionResult<()> {
        let project = self.project()?;
        let mut columns = static_columns();
        if project.is_human() {
            columns.extend(human_population_columns());
        }
        columns.extend(release_columns(project.release));
        self.ensure_columns(&columns)
    }

    /// Columns needed to load `files` into `study`
    pub fn register_new_files(
        &self,
        study: u32,
        files: &[u32],
        catalog: &dyn CatalogLookup,
    ) -> EvolutionResult<()> {
        let mut columns = study_columns(study);
        columns.extend(files.iter().map(|file| file_column(study, *file)));
        columns.extend(self.sample_columns_of_files(study, files, catalog));

        let project = self.project()?;
        columns.extend(release_columns(project.release));
        if project.is_human() {
            columns.extend(human_population_columns());
        }
        self.ensure_columns(&columns)
    }

    /// Drop file columns and the sample columns those files own.
    ///
    /// Returns the number of columns dropped.
    pub fn drop_files(
        &self,
        study: u32,
        files: &[u32],
        catalog: &dyn CatalogLookup,
    ) -> EvolutionResult<usize> {
        let mut columns: Vec<Column> = files.iter().map(|file| file_column(study, *file)).collect();
        columns.extend(self.sample_columns_of_files(study, files, catalog));
        let names: Vec<String> = columns.into_iter().map(|c| c.name).collect();
        self.drop_columns(&names)
    }

    pub fn register_new_score(&self, study: u32, score: u32) -> EvolutionResult<()> {
        self.ensure_columns(&[variant_score_column(study, score)])
    }

    pub fn drop_score(&self, study: u32, scores: &[u32]) -> EvolutionResult<usize> {
        let names: Vec<String> = scores
            .iter()
            .map(|score| variant_score_column(study, *score).name)
            .collect();
        self.drop_columns(&names)
    }

    pub fn register_new_cohorts(&self, study: u32, cohorts: &[u32]) -> EvolutionResult<()> {
        let columns: Vec<Column> = cohorts
            .iter()
            .flat_map(|cohort| stats_columns(study, *cohort))
            .collect();
        self.ensure_columns(&columns)
    }

    fn sample_columns_of_files(
        &self,
        study: u32,
        files: &[u32],
        catalog: &dyn CatalogLookup,
    ) -> Vec<Column> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for file in files {
            for sample in catalog.samples_of_file(study, *file) {
                if !seen.insert(sample) {
                    continue;
                }
                columns.extend(sample_columns(
                    study,
                    sample,
                    &catalog.files_of_sample(study, sample),
                    Some(files),
                    catalog.is_multi_file_sample(study, sample),
                ));
            }
        }
        columns
    }

    /// Drop those of `names` that exist, in batches, under the schema lock
    pub fn drop_columns(&self, names: &[String]) -> EvolutionResult<usize> {
        let table = self.statements.escaped_table();
        let executor = self.executor();
        if !executor.table_exists(&table)? {
            return Ok(0);
        }

        let token = self.lock_or_wait(SCHEMA_LOCK, self.settings.lease())?;
        let result = self.drop_columns_locked(&executor, &table, names);
        self.release(&token)?;
        result
    }

    fn drop_columns_locked(
        &self,
        executor: &StatementExecutor<'_>,
        table: &str,
        names: &[String],
    ) -> EvolutionResult<usize> {
        let existing: Vec<String> = executor
            .get_columns(table, names)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        if existing.is_empty() {
            return Ok(0);
        }

        for batch in existing.chunks(self.settings.batch_size.max(1)) {
            executor.execute(&self.statements.alter_drop_columns(batch, true))?;
            Logger::info(
                COLUMNS_DROPPED_EVENT,
                &[
                    ("count", &batch.len().to_string()),
                    ("columns", &batch.join(",")),
                    ("table", table),
                ],
            );
        }

        let mut previous_counter = 0;
        let written = self.update_metadata(|project| {
            previous_counter = project.alter_counter();
            project.set_alter_counter(previous_counter + 1);
            Ok(())
        })?;

        let mut cache = self.cache();
        cache.advance(previous_counter, written.alter_counter());
        for name in &existing {
            cache.remove(name);
        }
        Ok(existing.len())
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    /// Create secondary indexes. Returns whether this call created them.
    ///
    /// Views carry no indexes. If another worker holds the index lock it is
    /// already creating them and this call is skipped.
    pub fn create_indexes(&self) -> EvolutionResult<bool> {
        let table = self.statements.escaped_table();
        if self.statements.kind() == TableKind::View {
            Logger::info(
                INDEX_SKIPPED_EVENT,
                &[("reason", "table is a VIEW"), ("table", &table)],
            );
            return Ok(false);
        }

        let token = match self.lock.lock(
            INDEX_LOCK,
            self.settings.index_lease(),
            self.settings.first_attempt_timeout(),
        ) {
            Ok(token) => token,
            Err(e) if e.is_lock_timeout() => {
                Logger::info(
                    INDEX_SKIPPED_EVENT,
                    &[("reason", "index lock held elsewhere"), ("table", &table)],
                );
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let result = self.create_indexes_locked();
        self.release(&token)?;
        result.map(|()| true)
    }

    fn create_indexes_locked(&self) -> EvolutionResult<()> {
        let indices = if self.project()?.is_human() {
            all_indices()
        } else {
            score_indices()
        };
        let executor = self.executor();
        for index in &indices {
            executor.execute(&self.statements.create_index(index, false))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::lock::LeaseLock;
    use crate::evolution::metadata::InMemoryMetadataStore;
    use crate::evolution::store::InMemoryStore;
    use crate::schema::{sample_column, SqlType};
    use crate::sql::TableName;

    struct Fixture {
        store: Arc<InMemoryStore>,
        metadata: Arc<InMemoryMetadataStore>,
        lock: Arc<LeaseLock>,
        manager: SchemaManager,
    }

    fn setup(kind: TableKind, species: &str) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let metadata = Arc::new(InMemoryMetadataStore::new(ProjectMetadata::new(species, 2)));
        let lock = Arc::new(LeaseLock::new());
        let settings = EvolutionSettings {
            first_attempt_timeout_ms: 20,
            attempt_timeout_ms: 20,
            max_lock_wait_ms: 100,
            retry_backoff_min_ms: 1,
            retry_backoff_max_ms: 2,
            batch_size: 2,
            ..EvolutionSettings::default()
        };
        let manager = SchemaManager::new(
            StatementBuilder::new(TableName::parse("ns:variants"), kind, false),
            metadata.clone(),
            lock.clone(),
            store.clone(),
            settings,
        );
        Fixture {
            store,
            metadata,
            lock,
            manager,
        }
    }

    fn columns(names: &[&str]) -> Vec<Column> {
        names.iter().map(|n| Column::new(*n, SqlType::VarcharArray)).collect()
    }

    #[test]
    fn test_ensure_columns_creates_table_and_adds() {
        let f = setup(TableKind::View, "hsapiens");
        f.manager.ensure_columns(&columns(&["1_ST", "1_5_F", "1_9_S"])).unwrap();

        let table = f.manager.statements().escaped_table();
        assert!(f.store.has_schema("ns"));
        let names = f.store.column_names(&table);
        assert!(names.contains(&"1_9_S".to_string()));
        // batch_size 2: two ALTER statements
        assert_eq!(f.store.alter_add_count(), 2);

        let project = f.metadata.read().unwrap().value;
        assert!(project.pending_columns().unwrap().is_empty());
        assert_eq!(project.alter_counter(), 1);
    }

    #[test]
    fn test_ensure_columns_idempotent() {
        let f = setup(TableKind::View, "hsapiens");
        let wanted = columns(&["1_ST", "1_5_F"]);
        f.manager.ensure_columns(&wanted).unwrap();
        let alters = f.store.alter_add_count();
        f.manager.ensure_columns(&wanted).unwrap();
        assert_eq!(f.store.alter_add_count(), alters);
    }

    #[test]
    fn test_static_columns_never_pending() {
        let f = setup(TableKind::View, "hsapiens");
        f.manager.ensure_columns(&static_columns()).unwrap();
        assert_eq!(f.store.alter_add_count(), 0);
    }

    #[test]
    fn test_lock_timeout_keeps_pending() {
        let f = setup(TableKind::View, "hsapiens");
        f.manager.create_table_if_needed().unwrap();
        let held = f
            .lock
            .lock(SCHEMA_LOCK, Duration::from_secs(60), Duration::ZERO)
            .unwrap();

        let err = f.manager.ensure_columns(&columns(&["3_ST"])).unwrap_err();
        assert!(err.is_lock_timeout());
        let pending = f.metadata.read().unwrap().value.pending_columns().unwrap();
        assert_eq!(pending, columns(&["3_ST"]));

        f.lock.unlock(&held).unwrap();
        assert_eq!(f.manager.register_pending_columns().unwrap(), 1);
        assert_eq!(f.store.alter_add_count(), 1);
    }

    #[test]
    fn test_foreign_alter_counter_invalidates_cache() {
        let f = setup(TableKind::View, "hsapiens");
        f.manager.ensure_columns(&columns(&["1_ST"])).unwrap();

        let table = f.manager.statements().escaped_table();
        f.store
            .execute(&f.manager.statements().alter_drop_columns(&["1_ST".to_string()], true))
            .unwrap();
        update_project_metadata(f.metadata.as_ref(), 5, |p| {
            p.set_alter_counter(p.alter_counter() + 1);
            Ok(())
        })
        .unwrap();

        f.manager.ensure_columns(&columns(&["1_ST"])).unwrap();
        assert!(f.store.column_names(&table).contains(&"1_ST".to_string()));
    }

    #[test]
    fn test_drop_score_only_existing() {
        let f = setup(TableKind::View, "mmusculus");
        f.manager.register_new_score(1, 4).unwrap();
        assert_eq!(f.manager.drop_score(1, &[4, 5]).unwrap(), 1);
        assert_eq!(f.store.alter_drop_count(), 1);
        assert_eq!(f.manager.drop_score(1, &[4]).unwrap(), 0);
    }

    #[test]
    fn test_register_new_cohorts() {
        let f = setup(TableKind::View, "mmusculus");
        f.manager.register_new_cohorts(2, &[7, 8]).unwrap();
        let names = f.store.column_names(&f.manager.statements().escaped_table());
        let dynamic: Vec<&String> = names.iter().filter(|n| n.starts_with("2_")).collect();
        assert_eq!(dynamic.len(), 10);
    }

    #[test]
    fn test_register_annotation_columns_non_human() {
        let f = setup(TableKind::View, "mmusculus");
        f.manager.register_annotation_columns().unwrap();
        let names = f.store.column_names(&f.manager.statements().escaped_table());
        assert!(names.contains(&"R_1".to_string()));
        assert!(names.contains(&"R_2".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("A_PF_")));
    }

    #[test]
    fn test_create_indexes() {
        let view = setup(TableKind::View, "hsapiens");
        view.manager.create_table_if_needed().unwrap();
        assert!(!view.manager.create_indexes().unwrap());

        let table = setup(TableKind::Table, "mmusculus");
        table.manager.create_table_if_needed().unwrap();
        assert!(table.manager.create_indexes().unwrap());
        let indexes = table.store.index_names(&table.manager.statements().escaped_table());
        assert_eq!(indexes.len(), score_indices().len());

        let _held = table
            .lock
            .lock(INDEX_LOCK, Duration::from_secs(60), Duration::ZERO)
            .unwrap();
        assert!(!table.manager.create_indexes().unwrap());
    }

    #[test]
    fn test_sample_column_helper_matches_builder() {
        let f = setup(TableKind::View, "mmusculus");
        f.manager.ensure_columns(&[sample_column(1, 3)]).unwrap();
        let names = f.store.column_names(&f.manager.statements().escaped_table());
        assert!(names.contains(&"1_3_S".to_string()));
    }
}
