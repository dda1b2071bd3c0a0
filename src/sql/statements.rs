//! DDL statement builders for the variants table

use crate::schema::{Column, IndexDefinition, IndexType, VariantColumn, PRIMARY_KEY};

use super::table::{TableKind, TableName};

/// Renders DDL for one variants table
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    table: TableName,
    kind: TableKind,
    namespace_mapping: bool,
}

impl StatementBuilder {
    pub fn new(table: TableName, kind: TableKind, namespace_mapping: bool) -> Self {
        Self {
            table,
            kind,
            namespace_mapping,
        }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn escaped_table(&self) -> String {
        self.table.escaped(self.namespace_mapping)
    }

    /// `CREATE {kind} IF NOT EXISTS ...` with every static column
    pub fn create_table(&self) -> String {
        let mut sql = format!("CREATE {} IF NOT EXISTS {} (", self.kind, self.escaped_table());
        for column in VariantColumn::all() {
            sql.push_str(&format!(" \"{}\" {}", column.name(), column.sql_type()));
            if !column.nullable() {
                sql.push_str(" NOT NULL");
            }
            sql.push_str(" , ");
        }
        let primary_key: Vec<&str> = PRIMARY_KEY.iter().map(|c| c.name()).collect();
        sql.push_str(&format!(" CONSTRAINT PK PRIMARY KEY ({}) )", primary_key.join(", ")));
        sql
    }

    /// `CREATE SCHEMA IF NOT EXISTS "ns"`, when the table is namespaced
    pub fn create_schema(&self) -> Option<String> {
        self.table
            .namespace()
            .map(|namespace| format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", namespace))
    }

    pub fn alter_add_columns(&self, columns: &[Column], if_not_exists: bool) -> String {
        let columns: Vec<String> = columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.sql_type))
            .collect();
        format!(
            "ALTER {} {} ADD {}{}",
            self.kind,
            self.escaped_table(),
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            columns.join(", ")
        )
    }

    pub fn alter_drop_columns(&self, columns: &[String], if_exists: bool) -> String {
        let columns: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
        format!(
            "ALTER {} {} DROP COLUMN {}{}",
            self.kind,
            self.escaped_table(),
            if if_exists { "IF EXISTS " } else { "" },
            columns.join(", ")
        )
    }

    pub fn drop_table(&self, if_exists: bool, cascade: bool) -> String {
        let mut sql = format!("DROP {} ", self.kind);
        if if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.escaped_table());
        if cascade {
            sql.push_str(" CASCADE");
        }
        sql
    }

    /// `TABLE_NAME_{COLUMNS}_IDX`, with quotes and brackets stripped
    pub fn index_name(&self, index: &IndexDefinition) -> String {
        let table: String = self
            .table
            .full_name()
            .chars()
            .map(|c| if matches!(c, ':' | '\\' | '.') { '_' } else { c })
            .collect::<String>()
            .to_uppercase();
        let columns: String = index
            .columns
            .join("_")
            .chars()
            .filter(|c| !matches!(c, '"' | '[' | ']'))
            .collect();
        format!("{}_{}_IDX", table, columns)
    }

    pub fn create_index(&self, index: &IndexDefinition, async_build: bool) -> String {
        let mut sql = String::from("CREATE");
        if index.index_type == IndexType::Local {
            sql.push_str(" LOCAL");
        }
        sql.push_str(" INDEX IF NOT EXISTS ");
        sql.push_str(&format!(
            "\"{}\" ON {} ( {} )",
            self.index_name(index),
            self.escaped_table(),
            escaped_columns(&index.columns)
        ));
        if !index.include.is_empty() {
            sql.push_str(&format!(" INCLUDE({} )", escaped_columns(&index.include)));
        }
        if async_build {
            sql.push_str(" ASYNC");
        }
        sql
    }
}

/// Quote plain names; expressions that already start with a quote are kept
fn escaped_columns(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| {
            if c.starts_with('"') {
                c.clone()
            } else {
                format!("\"{}\"", c)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{score_indices, SqlType};

    fn builder(kind: TableKind) -> StatementBuilder {
        StatementBuilder::new(TableName::parse("opencga:variants"), kind, false)
    }

    #[test]
    fn test_create_table() {
        let sql = builder(TableKind::View).create_table();
        assert!(sql.starts_with(
            "CREATE VIEW IF NOT EXISTS \"opencga:variants\" ( \"CHROMOSOME\" VARCHAR NOT NULL ,  \"POSITION\" UNSIGNED_INT NOT NULL ,  \"REFERENCE\" VARCHAR , "
        ));
        assert!(sql.contains(" \"A_SO\" INTEGER ARRAY , "));
        assert!(sql.ends_with(
            " CONSTRAINT PK PRIMARY KEY (CHROMOSOME, POSITION, REFERENCE, ALTERNATE) )"
        ));
    }

    #[test]
    fn test_create_schema() {
        assert_eq!(
            builder(TableKind::View).create_schema().unwrap(),
            "CREATE SCHEMA IF NOT EXISTS \"opencga\""
        );
        let plain = StatementBuilder::new(TableName::parse("variants"), TableKind::View, false);
        assert_eq!(plain.create_schema(), None);
    }

    #[test]
    fn test_alter_add_columns() {
        let columns = vec![
            Column::new("1_ST", SqlType::UnsignedInt),
            Column::new("1_5_S", SqlType::VarcharArray),
        ];
        assert_eq!(
            builder(TableKind::View).alter_add_columns(&columns, true),
            "ALTER VIEW \"opencga:variants\" ADD IF NOT EXISTS \"1_ST\" UNSIGNED_INT, \"1_5_S\" VARCHAR ARRAY"
        );
    }

    #[test]
    fn test_alter_drop_columns() {
        let columns = vec!["1_5_F".to_string(), "1_9_S".to_string()];
        assert_eq!(
            builder(TableKind::Table).alter_drop_columns(&columns, true),
            "ALTER TABLE \"opencga:variants\" DROP COLUMN IF EXISTS \"1_5_F\", \"1_9_S\""
        );
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(
            builder(TableKind::View).drop_table(true, true),
            "DROP VIEW IF EXISTS \"opencga:variants\" CASCADE"
        );
        assert_eq!(
            builder(TableKind::Table).drop_table(false, false),
            "DROP TABLE \"opencga:variants\""
        );
    }

    #[test]
    fn test_create_index() {
        let sift = score_indices().remove(6);
        let b = StatementBuilder::new(TableName::parse("opencga:variants"), TableKind::Table, true);
        assert_eq!(b.index_name(&sift), "OPENCGA_VARIANTS_A_SIFT2_IDX");
        assert_eq!(
            b.create_index(&sift, false),
            "CREATE LOCAL INDEX IF NOT EXISTS \"OPENCGA_VARIANTS_A_SIFT2_IDX\" ON \"opencga\".\"variants\" ( \"A_SIFT\"[2] ) INCLUDE(\"A_GENES\", \"A_SO\" )"
        );
    }

    #[test]
    fn test_create_index_async_plain_column() {
        let gerp = score_indices().remove(2);
        let sql = builder(TableKind::Table).create_index(&gerp, true);
        assert!(sql.contains("( \"A_GERP\" )"));
        assert!(sql.ends_with(" ASYNC"));
    }
}
