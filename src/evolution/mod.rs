//! Schema evolution
//!
//! Many independent loader processes share one wide table and add columns to
//! it as new studies, files, samples and cohorts arrive. Coordination runs
//! through three collaborators:
//!
//! - `MetadataStore`: compare-and-swap project metadata holding the pending
//!   column set and the alter counter
//! - `SchemaLock`: lease lock serializing ALTER statements
//! - `PhysicalStore`: the SQL facade that executes DDL
//!
//! `SchemaManager` drives the protocol. Existence checks are cached per
//! process and invalidated whenever the alter counter moves.

mod cache;
mod errors;
mod executor;
mod lock;
mod manager;
mod metadata;
mod store;

pub use cache::ExistenceCache;
pub use errors::{EvolutionError, EvolutionResult};
pub use executor::{StatementExecutor, STATEMENT_RETRY_EVENT};
pub use lock::{LeaseLock, LockToken, SchemaLock, INDEX_LOCK, SCHEMA_LOCK};
pub use manager::{
    SchemaManager, COLUMNS_ADDED_EVENT, COLUMNS_DROPPED_EVENT, COLUMNS_REGISTERED_EVENT,
    INDEX_SKIPPED_EVENT, LOCK_WAIT_EVENT, TABLE_CREATED_EVENT,
};
pub use metadata::{
    update_project_metadata, FileMetadataStore, InMemoryMetadataStore, MetadataStore,
    ProjectMetadata, Versioned, ALTER_COUNTER_ATTRIBUTE, HUMAN_SPECIES,
    PENDING_COLUMNS_ATTRIBUTE,
};
pub use store::{InMemoryStore, PhysicalStore, StoreError};
