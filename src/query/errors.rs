//! Query compilation errors
//!
//! Error codes:
//! - VS_QUERY_MALFORMED_PARAM (REJECT)
//! - VS_QUERY_UNKNOWN_ENTITY (REJECT)
//! - VS_QUERY_MIXED_OPERATORS (REJECT)
//! - VS_QUERY_UNBALANCED_QUOTES (REJECT)
//! - VS_QUERY_INVALID_COLUMN_USAGE (REJECT)
//!
//! All query errors reject the request. None of them is fatal to the process.

use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Malformed param {param}='{value}': {reason}")]
    MalformedParam {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Unknown {kind} '{name}'")]
    UnknownEntity { kind: &'static str, name: String },

    #[error("Unable to mix AND (;) and OR (,) in '{0}'")]
    MixedOperators(String),

    #[error("Unbalanced quotes in '{0}'")]
    UnbalancedQuotes(String),

    #[error("Invalid column usage: {0}")]
    InvalidColumnUsage(String),
}

impl QueryError {
    pub fn malformed(param: &str, value: &str, reason: impl Into<String>) -> Self {
        QueryError::MalformedParam {
            param: param.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unknown(kind: &'static str, name: &str) -> Self {
        QueryError::UnknownEntity {
            kind,
            name: name.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            QueryError::MalformedParam { .. } => "VS_QUERY_MALFORMED_PARAM",
            QueryError::UnknownEntity { .. } => "VS_QUERY_UNKNOWN_ENTITY",
            QueryError::MixedOperators(_) => "VS_QUERY_MIXED_OPERATORS",
            QueryError::UnbalancedQuotes(_) => "VS_QUERY_UNBALANCED_QUOTES",
            QueryError::InvalidColumnUsage(_) => "VS_QUERY_INVALID_COLUMN_USAGE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            QueryError::malformed("release", "0", "must be > 0").code(),
            "VS_QUERY_MALFORMED_PARAM"
        );
        assert_eq!(QueryError::unknown("cohort", "ALL").code(), "VS_QUERY_UNKNOWN_ENTITY");
        assert_eq!(
            QueryError::MixedOperators("a,b;c".into()).code(),
            "VS_QUERY_MIXED_OPERATORS"
        );
    }

    #[test]
    fn test_display() {
        let err = QueryError::malformed("qual", ">>x", "not a number");
        assert_eq!(err.to_string(), "Malformed param qual='>>x': not a number");
        assert_eq!(
            QueryError::unknown("study", "s9").to_string(),
            "Unknown study 's9'"
        );
    }
}
