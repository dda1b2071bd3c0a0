//! Query operator translation
//!
//! | query op        | SQL op          |
//! |-----------------|-----------------|
//! | `==`            | `=`             |
//! | `=~`, `~`       | `LIKE`          |
//! | `!`             | `!=`            |
//! | `>>`, `>>=`     | `>`, `>=`       |
//! | `<<`, `<<=`     | `<`, `<=`       |
//!
//! The doubled forms also accept rows where the column is NULL.

use super::errors::{QueryError, QueryResult};

pub const LIKE: &str = "LIKE";

pub fn parse_operator(op: &str) -> &str {
    match op {
        "==" => "=",
        "=~" | "~" => LIKE,
        "!" => "!=",
        ">>" => ">",
        ">>=" => ">=",
        "<<" => "<",
        "<<=" => "<=",
        _ => op,
    }
}

pub fn parse_numeric_operator(op: &str) -> QueryResult<&str> {
    let parsed = parse_operator(op);
    if parsed == LIKE {
        return Err(QueryError::InvalidColumnUsage(format!(
            "Unable to use REGEX operator ({}) with numerical fields",
            op
        )));
    }
    Ok(parsed)
}

pub fn parse_boolean_operator(op: &str) -> QueryResult<&str> {
    let parsed = parse_operator(op);
    if parsed != "=" && parsed != "!=" {
        return Err(QueryError::InvalidColumnUsage(format!(
            "Unable to use operator ({}) with boolean fields",
            op
        )));
    }
    Ok(parsed)
}

/// Swap `<` and `>` so the operands can change sides: `col > v` is `v < col`
pub fn flip_operator(op: &str) -> String {
    op.chars()
        .map(|c| match c {
            '>' => '<',
            '<' => '>',
            other => other,
        })
        .collect()
}

/// Opposite operator, used to rewrite negated operators as `NOT (...)`
pub fn inverse_operator(op: &str) -> QueryResult<&'static str> {
    let inverse = match op {
        ">" => "<=",
        ">>" => "<<=",
        ">=" => "<",
        ">>=" => "<<",
        "<" => ">=",
        "<<" => ">>=",
        "<=" => ">",
        "<<=" => ">>",
        "" | "=" | "==" => "!=",
        "!" | "!=" => "=",
        "!~" | "!=~" => "~",
        _ => {
            return Err(QueryError::InvalidColumnUsage(format!(
                "Unknown operator {}",
                op
            )))
        }
    };
    Ok(inverse)
}

/// Doubled operators also match NULL
pub fn is_or_null(op: &str) -> bool {
    op.starts_with(">>") || op.starts_with("<<")
}

/// Render a double the way the store's SQL dialect prints it: `30.0`,
/// `0.25`, `1.0E-5`.
pub fn format_double(value: f64) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "NaN".to_string()
        } else if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let plain = value.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let scientific = format!("{:e}", value);
        match scientific.split_once('e') {
            Some((mantissa, exponent)) if mantissa.contains('.') => {
                format!("{}E{}", mantissa, exponent)
            }
            Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
            None => scientific,
        }
    }
}
