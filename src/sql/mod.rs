//! SQL text builders shared by schema evolution and the query compiler
//!
//! Identifiers are always double-quoted.

mod statements;
mod table;

pub use statements::StatementBuilder;
pub use table::{TableKind, TableName, NAMESPACE_SEPARATOR};
