//! Command-line interface
//!
//! - encode-key / decode-key: row key codec
//! - column: dynamic column names
//! - ddl: CREATE statements of the variants table
//! - compile: JSON query to SELECT statement

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, ColumnKind, Command, SortArg};
pub use commands::{column, compile, ddl, decode_key, encode_key, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_input, write_response};
