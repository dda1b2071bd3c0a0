//! Per-parameter filter compilation
//!
//! Every simple parameter goes through `FilterSpec::compile`:
//!
//! 1. split the raw value into OR'd or AND'd items
//! 2. split each item into `key op value`
//! 3. resolve the column from the key, pick the array slot from the operator
//! 4. rewrite `!op` as `NOT (inverse op)`
//! 5. coerce the value, append the optional relaxation clause
//! 6. render with `build_filter`, join with `append_filters`

use crate::schema::{Column, SqlType};

use super::errors::{QueryError, QueryResult};
use super::operators::{
    flip_operator, format_double, inverse_operator, is_or_null, parse_boolean_operator,
    parse_numeric_operator, parse_operator,
};
use super::params::QueryParam;
use super::values::{
    check_operator, is_negated, split_operator, split_value, KeyOpValue, QueryOperation,
};

/// Join filters with `AND`/`OR`.
///
/// `None` is only meaningful for a single filter; longer lists without an
/// operation are AND'd.
pub fn append_filters(filters: &[String], operation: Option<QueryOperation>) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let operation = match operation {
        None if filters.len() == 1 => return format!(" ( {} ) ", filters[0]),
        None => QueryOperation::And,
        Some(op) => op,
    };
    format!(
        " ( ( {} ) )",
        filters.join(&format!(" ) {} ( ", operation.as_str()))
    )
}

/// Reject values that would break out of a SQL string literal
pub fn check_string_value(value: &str) -> QueryResult<&str> {
    if value.contains('\'') {
        return Err(QueryError::InvalidColumnUsage(format!(
            "Unable to query text field with \"'\" : {}",
            value
        )));
    }
    Ok(value)
}

/// Where a malformed value came from, for error messages
#[derive(Debug, Clone, Copy)]
pub struct ValueSource<'a> {
    pub param: Option<QueryParam>,
    pub raw: &'a str,
}

impl<'a> ValueSource<'a> {
    pub fn new(param: QueryParam, raw: &'a str) -> Self {
        Self {
            param: Some(param),
            raw,
        }
    }

    pub fn internal() -> Self {
        Self { param: None, raw: "" }
    }

    fn malformed(&self, value: &str, kind: &str) -> QueryError {
        match self.param {
            Some(param) => QueryError::malformed(param.key(), self.raw, format!("not a valid {}", kind)),
            None => QueryError::InvalidColumnUsage(format!("Error parsing {} value '{}'", kind, value)),
        }
    }
}

pub fn parse_double(value: &str, source: ValueSource<'_>) -> QueryResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| source.malformed(value, "decimal"))
}

pub fn parse_integer(value: &str, source: ValueSource<'_>) -> QueryResult<i32> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| source.malformed(value, "integer"))
}

pub fn parse_boolean(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Render one `column op value` predicate.
///
/// - `negated` is prefixed (`"NOT "` or empty)
/// - a non-empty `extra` wraps the predicate: `( pred extra )`
/// - `slot > 0` addresses one element of an array column, 1-based
pub fn build_filter(
    column: &Column,
    op: &str,
    value: &str,
    negated: &str,
    extra: &str,
    slot: usize,
    source: ValueSource<'_>,
) -> QueryResult<String> {
    let mut sql_type = column.sql_type;
    let mut position = String::new();
    if slot > 0 {
        sql_type = sql_type.element_type();
        position = format!("[{}]", slot);
    }
    let quoted = column.quoted();

    let mut sb = String::new();
    if !extra.is_empty() {
        sb.push_str("( ");
    }
    sb.push_str(negated);
    match sql_type {
        SqlType::Varchar => {
            let value = check_string_value(value)?;
            if value.is_empty() {
                sb.push_str(&format!("{}{} IS NULL", quoted, position));
            } else {
                sb.push_str(&format!("{}{} {} '{}'", quoted, position, parse_operator(op), value));
            }
        }
        SqlType::VarcharArray => {
            let value = check_string_value(value)?;
            sb.push_str(&format!("'{}' {} ANY({})", value, parse_operator(op), quoted));
        }
        SqlType::IntegerArray => {
            let value = parse_integer(value, source)?;
            let op = flip_operator(parse_numeric_operator(op)?);
            sb.push_str(&format!("{} {} ANY({})", value, op, quoted));
        }
        SqlType::Integer | SqlType::UnsignedInt => {
            let value = parse_integer(value, source)?;
            sb.push_str(&format!("{}{} {} {}", quoted, position, parse_numeric_operator(op)?, value));
        }
        SqlType::FloatArray => {
            let value = parse_double(value, source)?;
            let op = flip_operator(parse_numeric_operator(op)?);
            sb.push_str(&format!("{} {} ANY({})", format_double(value), op, quoted));
        }
        SqlType::Float => {
            let value = parse_double(value, source)?;
            sb.push_str(&format!(
                "{}{} {} {}",
                quoted,
                position,
                parse_numeric_operator(op)?,
                format_double(value)
            ));
        }
        SqlType::Boolean => {
            sb.push_str(&format!(
                "{}{} {} {}",
                quoted,
                position,
                parse_boolean_operator(op)?,
                parse_boolean(value)
            ));
        }
        SqlType::Varbinary => {
            return Err(QueryError::InvalidColumnUsage(format!(
                "Unsupported column type {} for column {}",
                column.sql_type.sql_name(),
                column.name
            )))
        }
    }
    if is_or_null(op) {
        sb.push_str(&format!(" OR {} IS NULL", quoted));
    }
    if !extra.is_empty() {
        sb.push_str(&format!(" {} )", extra));
    }
    Ok(sb)
}

/// Coerced filter value
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Single(String),
    /// Expands to one predicate per element, OR'd
    AnyOf(Vec<String>),
}

type ColumnResolver<'a> = Box<dyn Fn(&KeyOpValue, &str) -> QueryResult<Column> + 'a>;
type ValueCoercion<'a> = Box<dyn Fn(&KeyOpValue) -> QueryResult<FilterValue> + 'a>;
type ExtraClause<'a> = Box<dyn Fn(&KeyOpValue) -> QueryResult<String> + 'a>;
type OperatorRewrite<'a> = Box<dyn Fn(&str) -> QueryResult<String> + 'a>;
type SlotSelector<'a> = Box<dyn Fn(&str) -> Option<usize> + 'a>;

/// How one query parameter turns into SQL.
///
/// Only the column resolver is required; every other capability is
/// optional and defaults to "use as is".
pub struct FilterSpec<'a> {
    param: QueryParam,
    column: ColumnResolver<'a>,
    value: Option<ValueCoercion<'a>>,
    extra: Option<ExtraClause<'a>>,
    operator: Option<OperatorRewrite<'a>>,
    slot: Option<SlotSelector<'a>>,
}

impl<'a> FilterSpec<'a> {
    /// Filter on a fixed column
    pub fn column(param: QueryParam, column: Column) -> Self {
        Self::resolved(param, move |_, _| Ok(column.clone()))
    }

    /// Filter on a column resolved from each `key op value` item
    pub fn resolved(
        param: QueryParam,
        resolver: impl Fn(&KeyOpValue, &str) -> QueryResult<Column> + 'a,
    ) -> Self {
        Self {
            param,
            column: Box::new(resolver),
            value: None,
            extra: None,
            operator: None,
            slot: None,
        }
    }

    pub fn with_value(mut self, coercion: impl Fn(&KeyOpValue) -> QueryResult<FilterValue> + 'a) -> Self {
        self.value = Some(Box::new(coercion));
        self
    }

    /// Clause appended inside the predicate's parentheses, typically
    /// `OR "col" IS NULL`
    pub fn with_extra(mut self, extra: impl Fn(&KeyOpValue) -> QueryResult<String> + 'a) -> Self {
        self.extra = Some(Box::new(extra));
        self
    }

    pub fn with_operator(mut self, rewrite: impl Fn(&str) -> QueryResult<String> + 'a) -> Self {
        self.operator = Some(Box::new(rewrite));
        self
    }

    pub fn with_slot(mut self, selector: impl Fn(&str) -> Option<usize> + 'a) -> Self {
        self.slot = Some(Box::new(selector));
        self
    }

    pub fn with_fixed_slot(self, slot: usize) -> Self {
        self.with_slot(move |_| Some(slot))
    }

    pub fn param(&self) -> QueryParam {
        self.param
    }

    /// Compile a raw parameter value. `None` when it holds no items.
    pub fn compile(&self, raw: &str) -> QueryResult<Option<String>> {
        let operation = check_operator(raw)?;
        let values = split_value(raw, operation)?;
        self.compile_values(operation, &values)
    }

    /// Compile already split items joined by `operation` (AND when `None`)
    pub fn compile_values(
        &self,
        operation: Option<QueryOperation>,
        values: &[String],
    ) -> QueryResult<Option<String>> {
        if values.is_empty() {
            return Ok(None);
        }
        let negated = values.iter().filter(|value| is_negated(value)).count();
        if negated > 0 && negated < values.len() {
            let separator = operation.unwrap_or(QueryOperation::And).separator().to_string();
            return Err(QueryError::malformed(
                self.param.key(),
                &values.join(&separator),
                "Can not mix negated and not negated values",
            ));
        }
        let mut sub_filters = Vec::with_capacity(values.len());
        for raw_value in values {
            sub_filters.push(self.compile_item(raw_value)?);
        }
        let operation = operation.unwrap_or(QueryOperation::And);
        Ok(Some(append_filters(&sub_filters, Some(operation))))
    }

    fn compile_item(&self, raw_value: &str) -> QueryResult<String> {
        let kov = split_operator(raw_value);
        let column = (self.column)(&kov, raw_value)?;

        let mut op = kov.op.clone();
        if let Some(rewrite) = &self.operator {
            op = rewrite(&op)?;
        }
        let slot = self.slot.as_ref().and_then(|select| select(&op));
        if slot.is_some() && !column.sql_type.is_array() {
            return Err(QueryError::InvalidColumnUsage(format!(
                "Unable to use array indexes with non array columns. {} {}",
                column.name,
                column.sql_type.sql_name()
            )));
        }

        let negated = if op.starts_with('!') {
            op = inverse_operator(&op)?.to_string();
            "NOT "
        } else {
            ""
        };

        let extra = match &self.extra {
            Some(extra) => extra(&kov)?,
            None => String::new(),
        };

        let source = ValueSource::new(self.param, raw_value);
        let slot = slot.unwrap_or(0);
        let value = match &self.value {
            Some(coerce) => coerce(&kov)?,
            None => FilterValue::Single(kov.value.clone()),
        };
        match value {
            FilterValue::Single(value) => {
                build_filter(&column, &op, &value, negated, &extra, slot, source)
            }
            FilterValue::AnyOf(values) => {
                let mut sub = Vec::with_capacity(values.len());
                for value in &values {
                    sub.push(build_filter(&column, &op, value, "", &extra, slot, source)?);
                }
                Ok(format!("{}{}", negated, append_filters(&sub, Some(QueryOperation::Or))))
            }
        }
    }
}
