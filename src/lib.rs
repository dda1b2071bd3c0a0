//! variant-store: storage core for genomic variants in a sparse wide-column store
//!
//! Subsystems:
//! - `keycodec`: variant coordinates to and from physical row keys
//! - `schema`: static column catalog and dynamic column naming
//! - `evolution`: pending columns, alter counter and lock-guarded ALTER batches
//! - `query`: variant query to SELECT statement compilation
//!
//! Supporting modules:
//! - `sql`: statement text builders shared by evolution and query
//! - `catalog`: study/sample/file/cohort/score id lookup
//! - `observability`: structured JSON logging
//! - `config`: JSON configuration
//! - `cli`: command-line entry points

pub mod catalog;
pub mod cli;
pub mod config;
pub mod evolution;
pub mod keycodec;
pub mod observability;
pub mod query;
pub mod schema;
pub mod sql;
