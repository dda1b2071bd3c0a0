//! Statement execution with retry on concurrent schema mutation

use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::config::EvolutionSettings;
use crate::observability::{Logger, Timer};
use crate::schema::Column;

use super::errors::{EvolutionError, EvolutionResult};
use super::store::{PhysicalStore, StoreError};

pub const STATEMENT_RETRY_EVENT: &str = "SCHEMA_STATEMENT_RETRY";

/// Runs DDL against a `PhysicalStore`
pub struct StatementExecutor<'a> {
    store: &'a dyn PhysicalStore,
    settings: &'a EvolutionSettings,
}

impl<'a> StatementExecutor<'a> {
    pub fn new(store: &'a dyn PhysicalStore, settings: &'a EvolutionSettings) -> Self {
        Self { store, settings }
    }

    /// Execute `sql`, retrying `ConcurrentMutation` with a random backoff.
    ///
    /// Other store errors fail immediately.
    pub fn execute(&self, sql: &str) -> EvolutionResult<()> {
        let max_attempts = self.settings.max_statement_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let timer = Timer::new();
            let result = self.store.execute(sql);
            timer.warn_if_slow("execute", self.settings.slow_operation(), &[("sql", sql)]);

            match result {
                Ok(()) => return Ok(()),
                Err(StoreError::ConcurrentMutation(reason)) if attempt < max_attempts => {
                    let backoff = self.backoff();
                    Logger::warn(
                        STATEMENT_RETRY_EVENT,
                        &[
                            ("attempt", &attempt.to_string()),
                            ("backoff_ms", &backoff.as_millis().to_string()),
                            ("reason", &reason),
                            ("sql", sql),
                        ],
                    );
                    thread::sleep(backoff);
                }
                Err(StoreError::ConcurrentMutation(_)) => {
                    return Err(EvolutionError::SchemaRace {
                        sql: sql.to_string(),
                        attempts: attempt,
                    })
                }
                Err(e) => {
                    return Err(EvolutionError::Store {
                        sql: sql.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    pub fn table_exists(&self, table: &str) -> EvolutionResult<bool> {
        let timer = Timer::new();
        let result = self.store.table_exists(table);
        timer.warn_if_slow("table_exists", self.settings.slow_operation(), &[("table", table)]);
        result.map_err(|e| EvolutionError::Store {
            sql: format!("table_exists {}", table),
            reason: e.to_string(),
        })
    }

    pub fn get_columns(&self, table: &str, names: &[String]) -> EvolutionResult<Vec<Column>> {
        let timer = Timer::new();
        let result = self.store.get_columns(table, names);
        let count = names.len().to_string();
        timer.warn_if_slow(
            "get_columns",
            self.settings.slow_operation(),
            &[("table", table), ("columns", &count)],
        );
        result.map_err(|e| EvolutionError::Store {
            sql: format!("get_columns {}", table),
            reason: e.to_string(),
        })
    }

    fn backoff(&self) -> Duration {
        let min = self.settings.retry_backoff_min_ms;
        let max = self.settings.retry_backoff_max_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
