//! CLI-specific error types
//!
//! Error codes:
//! - VS_CLI_CONFIG_ERROR
//! - VS_CLI_IO_ERROR
//! - VS_CLI_INVALID_ARGUMENT
//!
//! Library errors keep their own code (`VS_CODEC_*`, `VS_QUERY_*`, ...).
//! Every CLI error ends the process with exit code 1.

use std::fmt;
use std::io;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::keycodec::CodecError;
use crate::query::QueryError;
use crate::schema::SchemaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    ConfigError,
    IoError,
    InvalidArgument,
    /// Error raised by a library module, with its code
    Library(&'static str),
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "VS_CLI_CONFIG_ERROR",
            Self::IoError => "VS_CLI_IO_ERROR",
            Self::InvalidArgument => "VS_CLI_INVALID_ARGUMENT",
            Self::Library(code) => code,
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

macro_rules! library_error {
    ($($error:ty),*) => {
        $(
            impl From<$error> for CliError {
                fn from(e: $error) -> Self {
                    Self::new(CliErrorCode::Library(e.code()), e.to_string())
                }
            }
        )*
    };
}

library_error!(CodecError, SchemaError, CatalogError, QueryError);

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_error_keeps_code() {
        let err: CliError = QueryError::unknown("study", "s9").into();
        assert_eq!(err.code_str(), "VS_QUERY_UNKNOWN_ENTITY");
        assert!(err.to_string().starts_with("VS_QUERY_UNKNOWN_ENTITY: "));
    }

    #[test]
    fn test_config_error_code() {
        let err: CliError = ConfigError::Invalid("x".into()).into();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert_eq!(err.code_str(), "VS_CLI_CONFIG_ERROR");
    }
}
