//! SQL column types and column descriptors

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::SchemaError;

/// Logical column types understood by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Varchar,
    VarcharArray,
    UnsignedInt,
    Integer,
    IntegerArray,
    Float,
    FloatArray,
    Boolean,
    Varbinary,
}

impl SqlType {
    /// Name used in DDL and in persisted pending columns
    pub fn sql_name(&self) -> &'static str {
        match self {
            SqlType::Varchar => "VARCHAR",
            SqlType::VarcharArray => "VARCHAR ARRAY",
            SqlType::UnsignedInt => "UNSIGNED_INT",
            SqlType::Integer => "INTEGER",
            SqlType::IntegerArray => "INTEGER ARRAY",
            SqlType::Float => "FLOAT",
            SqlType::FloatArray => "FLOAT ARRAY",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Varbinary => "VARBINARY",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            SqlType::VarcharArray | SqlType::IntegerArray | SqlType::FloatArray
        )
    }

    /// Type of one element, for array slot access
    pub fn element_type(&self) -> SqlType {
        match self {
            SqlType::VarcharArray => SqlType::Varchar,
            SqlType::IntegerArray => SqlType::Integer,
            SqlType::FloatArray => SqlType::Float,
            other => *other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.element_type(),
            SqlType::UnsignedInt | SqlType::Integer | SqlType::Float
        )
    }

    pub fn all() -> &'static [SqlType] {
        &[
            SqlType::Varchar,
            SqlType::VarcharArray,
            SqlType::UnsignedInt,
            SqlType::Integer,
            SqlType::IntegerArray,
            SqlType::Float,
            SqlType::FloatArray,
            SqlType::Boolean,
            SqlType::Varbinary,
        ]
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

impl FromStr for SqlType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SqlType::all()
            .iter()
            .find(|t| t.sql_name() == s)
            .copied()
            .ok_or_else(|| SchemaError::UnknownSqlType(s.to_string()))
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// `"NAME"`
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_names_parse_back() {
        for t in SqlType::all() {
            assert_eq!(t.sql_name().parse::<SqlType>().unwrap(), *t);
        }
    }

    #[test]
    fn test_unknown_sql_name() {
        assert_eq!(
            "DECIMAL".parse::<SqlType>(),
            Err(SchemaError::UnknownSqlType("DECIMAL".into()))
        );
    }

    #[test]
    fn test_array_element_types() {
        assert!(SqlType::FloatArray.is_array());
        assert_eq!(SqlType::FloatArray.element_type(), SqlType::Float);
        assert_eq!(SqlType::Varchar.element_type(), SqlType::Varchar);
        assert!(SqlType::IntegerArray.is_numeric());
        assert!(!SqlType::VarcharArray.is_numeric());
    }

    #[test]
    fn test_column_quoting() {
        let column = Column::new("7_42_S", SqlType::VarcharArray);
        assert_eq!(column.quoted(), "\"7_42_S\"");
        assert!(column.nullable);
        assert!(!column.not_null().nullable);
    }
}
