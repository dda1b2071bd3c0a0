//! Query value language
//!
//! - `,` separates OR'd values, `;` separates AND'd values
//! - `"` quotes a value so separators inside it are literal
//! - a leading `!` negates a value
//! - `key op value` fragments: `sift<=0.2`, `gnomad:ALL<0.01`, `>>30`

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::errors::{QueryError, QueryResult};

pub const OR_CHAR: char = ',';
pub const AND_CHAR: char = ';';
pub const QUOTE_CHAR: char = '"';
pub const NOT: &str = "!";
pub const STUDY_RESOURCE_SEPARATOR: char = ':';

static OPERATION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn operation_pattern() -> &'static Regex {
    OPERATION_PATTERN.get_or_init(|| {
        Regex::new(r"^([^=<>~!]*)(<?<=?|>>?=?|!=?|!?=?~|==?)([^=<>~!]+.*)$").expect("valid regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOperation {
    And,
    Or,
}

impl QueryOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOperation::And => "AND",
            QueryOperation::Or => "OR",
        }
    }

    pub fn separator(&self) -> char {
        match self {
            QueryOperation::And => AND_CHAR,
            QueryOperation::Or => OR_CHAR,
        }
    }
}

impl fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation used by a value list, or `None` for a single value.
///
/// Separators inside quotes are ignored.
pub fn check_operator(value: &str) -> QueryResult<Option<QueryOperation>> {
    let mut in_quotes = false;
    let mut contains_or = false;
    let mut contains_and = false;
    for c in value.chars() {
        match c {
            QUOTE_CHAR => in_quotes = !in_quotes,
            OR_CHAR if !in_quotes => contains_or = true,
            AND_CHAR if !in_quotes => contains_and = true,
            _ => {}
        }
        if contains_or && contains_and {
            return Err(QueryError::MixedOperators(value.to_string()));
        }
    }
    Ok(match (contains_and, contains_or) {
        (true, _) => Some(QueryOperation::And),
        (_, true) => Some(QueryOperation::Or),
        _ => None,
    })
}

/// Split `value` by the separator of `operation`
pub fn split_value(value: &str, operation: Option<QueryOperation>) -> QueryResult<Vec<String>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    match operation {
        None => {
            let unquoted = value
                .strip_prefix(QUOTE_CHAR)
                .and_then(|v| v.strip_suffix(QUOTE_CHAR))
                .unwrap_or(value);
            Ok(vec![unquoted.to_string()])
        }
        Some(op) => split_quotes(value, op.separator()),
    }
}

/// Check the operation and split in one go
pub fn split_values(value: &str) -> QueryResult<(Option<QueryOperation>, Vec<String>)> {
    let operation = check_operator(value)?;
    Ok((operation, split_value(value, operation)?))
}

/// Split on `separator` outside quotes. Quote characters are dropped and
/// empty parts skipped.
pub fn split_quotes(value: &str, separator: char) -> QueryResult<Vec<String>> {
    let mut in_quote = false;
    let mut parts = Vec::new();
    let mut current = String::new();
    for c in value.chars() {
        if c == QUOTE_CHAR {
            in_quote = !in_quote;
        } else if !in_quote && c == separator {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    if in_quote {
        return Err(QueryError::UnbalancedQuotes(value.to_string()));
    }
    Ok(parts)
}

pub fn is_negated(value: &str) -> bool {
    value.starts_with(NOT)
}

pub fn remove_negation(value: &str) -> &str {
    value.strip_prefix(NOT).unwrap_or(value)
}

/// A parsed `key op value` fragment.
///
/// `key` is `None` when the fragment has no operator at all, in which case
/// the operator defaults to `=` and the value is the raw fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOpValue {
    pub key: Option<String>,
    pub op: String,
    pub value: String,
}

impl KeyOpValue {
    pub fn key_str(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }
}

pub fn split_operator(value: &str) -> KeyOpValue {
    match operation_pattern().captures(value) {
        Some(caps) => KeyOpValue {
            key: Some(caps[1].trim().to_string()),
            op: caps[2].trim().to_string(),
            value: caps[3].trim().to_string(),
        },
        None => KeyOpValue {
            key: None,
            op: "=".to_string(),
            value: value.to_string(),
        },
    }
}

/// Split `study:resource` at the last `:`. Returns `(None, value)` when there
/// is no usable separator.
pub fn split_study_resource(value: &str) -> (Option<&str>, &str) {
    match value.rfind(STUDY_RESOURCE_SEPARATOR) {
        Some(idx) if idx > 0 && idx < value.len() - 1 => (Some(&value[..idx]), &value[idx + 1..]),
        _ => (None, value),
    }
}
