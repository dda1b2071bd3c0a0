//! Physical store boundary and an in-memory implementation
//!
//! Table arguments are escaped table names exactly as they appear in the
//! generated statements (`"ns:table"` or `"ns"."table"`).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::schema::{Column, SqlType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another client changed the table schema concurrently; retryable
    #[error("Concurrent table mutation: {0}")]
    ConcurrentMutation(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ConcurrentMutation(_))
    }
}

/// SQL facade over the wide-column store
pub trait PhysicalStore: Send + Sync {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    fn execute(&self, sql: &str) -> Result<(), StoreError>;

    /// Those of `names` that exist as columns of `table`
    fn get_columns(&self, table: &str, names: &[String]) -> Result<Vec<Column>, StoreError>;
}

// =============================================================================
// Statement patterns
// =============================================================================

static CREATE_TABLE_RE: OnceLock<Regex> = OnceLock::new();
static ALTER_ADD_RE: OnceLock<Regex> = OnceLock::new();
static ALTER_DROP_RE: OnceLock<Regex> = OnceLock::new();
static CREATE_INDEX_RE: OnceLock<Regex> = OnceLock::new();
static CREATE_SCHEMA_RE: OnceLock<Regex> = OnceLock::new();
static DROP_TABLE_RE: OnceLock<Regex> = OnceLock::new();
static COLUMN_DEF_RE: OnceLock<Regex> = OnceLock::new();
static QUOTED_RE: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("valid regex"))
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
struct TableState {
    columns: Vec<Column>,
    names: HashSet<String>,
    indexes: Vec<String>,
}

impl TableState {
    fn add(&mut self, column: Column) -> bool {
        if self.names.insert(column.name.clone()) {
            self.columns.push(column);
            true
        } else {
            false
        }
    }

    fn drop(&mut self, name: &str) -> bool {
        if self.names.remove(name) {
            self.columns.retain(|c| c.name != name);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, TableState>,
    schemas: HashSet<String>,
    executed: Vec<String>,
}

/// Interprets the DDL this crate generates; for tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    alter_add_count: AtomicU64,
    alter_drop_count: AtomicU64,
    injected_conflicts: AtomicU32,
    latency_ms: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` statements with `ConcurrentMutation`
    pub fn inject_concurrent_mutations(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Sleep this long in every `execute`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Successful `ALTER ... ADD` statements so far
    pub fn alter_add_count(&self) -> u64 {
        self.alter_add_count.load(Ordering::SeqCst)
    }

    pub fn alter_drop_count(&self) -> u64 {
        self.alter_drop_count.load(Ordering::SeqCst)
    }

    /// Every successfully executed statement, in order
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub fn column_names(&self, table: &str) -> Vec<String> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn index_names(&self, table: &str) -> Vec<String> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.indexes.clone())
            .unwrap_or_default()
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.lock().schemas.contains(schema)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn apply(&self, state: &mut StoreState, sql: &str) -> Result<(), StoreError> {
        let column_def = pattern(&COLUMN_DEF_RE, r#""([^"]+)" ([A-Z_]+(?: ARRAY)?)"#);
        let quoted = pattern(&QUOTED_RE, r#""([^"]+)""#);

        if let Some(caps) = pattern(&CREATE_SCHEMA_RE, r#"^CREATE SCHEMA IF NOT EXISTS "([^"]+)"$"#)
            .captures(sql)
        {
            state.schemas.insert(caps[1].to_string());
            return Ok(());
        }

        if let Some(caps) = pattern(
            &CREATE_TABLE_RE,
            r#"^CREATE (?:VIEW|TABLE) IF NOT EXISTS ("[^ ]+") \((.*)\)$"#,
        )
        .captures(sql)
        {
            let table = caps[1].to_string();
            if state.tables.contains_key(&table) {
                return Ok(());
            }
            let mut created = TableState::default();
            for def in column_def.captures_iter(&caps[2]) {
                created.add(parse_column(&def[1], &def[2])?);
            }
            state.tables.insert(table, created);
            return Ok(());
        }

        if let Some(caps) = pattern(
            &ALTER_ADD_RE,
            r#"^ALTER (?:VIEW|TABLE) ("[^ ]+") ADD (IF NOT EXISTS )?(.*)$"#,
        )
        .captures(sql)
        {
            let if_not_exists = caps.get(2).is_some();
            let table = state
                .tables
                .get_mut(&caps[1])
                .ok_or_else(|| StoreError::TableNotFound(caps[1].to_string()))?;
            for def in column_def.captures_iter(&caps[3]) {
                let column = parse_column(&def[1], &def[2])?;
                let name = column.name.clone();
                if !table.add(column) && !if_not_exists {
                    return Err(StoreError::Other(format!("column {} already exists", name)));
                }
            }
            self.alter_add_count.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        if let Some(caps) = pattern(
            &ALTER_DROP_RE,
            r#"^ALTER (?:VIEW|TABLE) ("[^ ]+") DROP COLUMN (IF EXISTS )?(.*)$"#,
        )
        .captures(sql)
        {
            let if_exists = caps.get(2).is_some();
            let table = state
                .tables
                .get_mut(&caps[1])
                .ok_or_else(|| StoreError::TableNotFound(caps[1].to_string()))?;
            for name in quoted.captures_iter(&caps[3]) {
                if !table.drop(&name[1]) && !if_exists {
                    return Err(StoreError::Other(format!("column {} does not exist", &name[1])));
                }
            }
            self.alter_drop_count.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        if let Some(caps) = pattern(
            &CREATE_INDEX_RE,
            r#"^CREATE (?:LOCAL )?INDEX IF NOT EXISTS "([^"]+)" ON ("[^ ]+") \("#,
        )
        .captures(sql)
        {
            let table = state
                .tables
                .get_mut(&caps[2])
                .ok_or_else(|| StoreError::TableNotFound(caps[2].to_string()))?;
            if !table.indexes.iter().any(|i| i == &caps[1]) {
                table.indexes.push(caps[1].to_string());
            }
            return Ok(());
        }

        if let Some(caps) = pattern(
            &DROP_TABLE_RE,
            r#"^DROP (?:VIEW|TABLE) (IF EXISTS )?("[^ ]+")(?: CASCADE)?$"#,
        )
        .captures(sql)
        {
            if state.tables.remove(&caps[2]).is_none() && caps.get(1).is_none() {
                return Err(StoreError::TableNotFound(caps[2].to_string()));
            }
            return Ok(());
        }

        Err(StoreError::Other(format!("unsupported statement: {}", sql)))
    }
}

fn parse_column(name: &str, sql_type: &str) -> Result<Column, StoreError> {
    let sql_type: SqlType = sql_type
        .parse()
        .map_err(|e: crate::schema::SchemaError| StoreError::Other(e.to_string()))?;
    Ok(Column::new(name, sql_type))
}

impl PhysicalStore for InMemoryStore {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        Ok(self.lock().tables.contains_key(table))
    }

    fn execute(&self, sql: &str) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            thread::sleep(Duration::from_millis(latency));
        }
        if self.take_injected_conflict() {
            return Err(StoreError::ConcurrentMutation(sql.to_string()));
        }
        let mut state = self.lock();
        self.apply(&mut state, sql)?;
        state.executed.push(sql.to_string());
        Ok(())
    }

    fn get_columns(&self, table: &str, names: &[String]) -> Result<Vec<Column>, StoreError> {
        let state = self.lock();
        let table_state = state
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(table_state
            .columns
            .iter()
            .filter(|c| names.contains(&c.name))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IndexDefinition;
    use crate::sql::{StatementBuilder, TableKind, TableName};

    fn setup() -> (InMemoryStore, StatementBuilder) {
        let store = InMemoryStore::new();
        let builder = StatementBuilder::new(TableName::parse("ns:variants"), TableKind::Table, false);
        store.execute(&builder.create_table()).unwrap();
        (store, builder)
    }

    #[test]
    fn test_create_table_registers_static_columns() {
        let (store, builder) = setup();
        let table = builder.escaped_table();
        assert!(store.table_exists(&table).unwrap());
        let names = store.column_names(&table);
        assert_eq!(&names[..4], &["CHROMOSOME", "POSITION", "REFERENCE", "ALTERNATE"]);
        assert!(names.contains(&"_IDX_ST_".to_string()));
    }

    #[test]
    fn test_alter_add_and_drop() {
        let (store, builder) = setup();
        let table = builder.escaped_table();
        let columns = vec![
            Column::new("1_ST", SqlType::UnsignedInt),
            Column::new("1_2_S", SqlType::VarcharArray),
        ];
        store.execute(&builder.alter_add_columns(&columns, true)).unwrap();
        store.execute(&builder.alter_add_columns(&columns, true)).unwrap();
        assert_eq!(store.alter_add_count(), 2);

        let found = store
            .get_columns(&table, &["1_2_S".to_string(), "9_9_S".to_string()])
            .unwrap();
        assert_eq!(found, vec![Column::new("1_2_S", SqlType::VarcharArray)]);

        assert!(store.execute(&builder.alter_add_columns(&columns, false)).is_err());

        store
            .execute(&builder.alter_drop_columns(&["1_2_S".to_string()], true))
            .unwrap();
        assert!(store.get_columns(&table, &["1_2_S".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_injected_conflicts() {
        let (store, builder) = setup();
        store.inject_concurrent_mutations(2);
        let sql = builder.alter_add_columns(&[Column::new("R_1", SqlType::Boolean)], true);
        assert!(store.execute(&sql).unwrap_err().is_retryable());
        assert!(store.execute(&sql).unwrap_err().is_retryable());
        assert!(store.execute(&sql).is_ok());
    }

    #[test]
    fn test_index_schema_and_drop() {
        let (store, builder) = setup();
        let table = builder.escaped_table();
        store.execute(&builder.create_schema().unwrap()).unwrap();
        assert!(store.has_schema("ns"));

        let index = IndexDefinition::local(vec!["A_GERP".to_string()]);
        store.execute(&builder.create_index(&index, false)).unwrap();
        assert_eq!(store.index_names(&table), vec!["NS_VARIANTS_A_GERP_IDX"]);

        store.execute(&builder.drop_table(true, true)).unwrap();
        assert!(!store.table_exists(&table).unwrap());
        assert!(store.execute(&builder.drop_table(true, false)).is_ok());
        assert!(store.execute(&builder.drop_table(false, false)).is_err());
    }

    #[test]
    fn test_unknown_table_and_statement() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.get_columns("\"missing\"", &[]),
            Err(StoreError::TableNotFound(_))
        ));
        assert!(store.execute("SELECT 1").is_err());
    }
}
