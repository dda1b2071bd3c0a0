//! Table kinds and escaped table names

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator between namespace and table in a full table name
pub const NAMESPACE_SEPARATOR: char = ':';

/// How the variants table is declared to the SQL layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableKind {
    /// Mapped over an existing wide-column table
    View,
    /// Owned by the SQL layer; supports secondary indexes
    Table,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::View => "VIEW",
            TableKind::Table => "TABLE",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VIEW" => Ok(TableKind::View),
            "TABLE" => Ok(TableKind::Table),
            other => Err(format!("unknown table kind: {}", other)),
        }
    }
}

/// A possibly namespaced table name, `namespace:table`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    namespace: Option<String>,
    table: String,
}

impl TableName {
    pub fn parse(full_name: &str) -> Self {
        match full_name.split_once(NAMESPACE_SEPARATOR) {
            Some((namespace, table)) if !namespace.is_empty() => Self {
                namespace: Some(namespace.to_string()),
                table: table.to_string(),
            },
            _ => Self {
                namespace: None,
                table: full_name.to_string(),
            },
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, self.table),
            None => self.table.clone(),
        }
    }

    /// `"ns"."table"` with namespace mapping, `"ns:table"` without
    pub fn escaped(&self, namespace_mapping: bool) -> String {
        match (&self.namespace, namespace_mapping) {
            (Some(namespace), true) => format!("\"{}\".\"{}\"", namespace, self.table),
            _ => format!("\"{}\"", self.full_name()),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_table() {
        let name = TableName::parse("variants");
        assert_eq!(name.namespace(), None);
        assert_eq!(name.escaped(true), "\"variants\"");
        assert_eq!(name.escaped(false), "\"variants\"");
    }

    #[test]
    fn test_namespaced_table() {
        let name = TableName::parse("opencga:proj_variants");
        assert_eq!(name.namespace(), Some("opencga"));
        assert_eq!(name.table(), "proj_variants");
        assert_eq!(name.escaped(false), "\"opencga:proj_variants\"");
        assert_eq!(name.escaped(true), "\"opencga\".\"proj_variants\"");
    }

    #[test]
    fn test_table_kind_parse() {
        assert_eq!("view".parse::<TableKind>().unwrap(), TableKind::View);
        assert_eq!("TABLE".parse::<TableKind>().unwrap(), TableKind::Table);
        assert!("index".parse::<TableKind>().is_err());
    }
}
