use super::{statement, Catalog};
use crate::compiler::CompiledStatement;
use crate::database::{DatabaseType, DatabaseValue};

/// SQLite catalog built on `sqlite_master` and the pragma table-valued functions
///
/// A schema here is an attached database name (`main`, `temp`, ...). It is
/// passed as the trailing pragma argument, and spliced as a quoted identifier
/// in front of `sqlite_master`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteCatalog;

fn master_table(schema: Option<&str>) -> String {
    match schema.filter(|s| !s.is_empty()) {
        Some(schema) => format!("\"{}\".sqlite_master", schema.replace('"', "\"\"")),
        None => "sqlite_master".to_string(),
    }
}

/// Pragma arguments: `(?1)` or `(?1, ?2)` with the bound parameters to match
fn pragma_args(table: &str, schema: Option<&str>) -> (&'static str, Vec<DatabaseValue>) {
    match schema.filter(|s| !s.is_empty()) {
        Some(schema) => ("?1, ?2", vec![table.into(), schema.into()]),
        None => ("?1", vec![table.into()]),
    }
}

impl Catalog for SqliteCatalog {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn tables_query(&self, schema: Option<&str>) -> CompiledStatement {
        let sql = format!(
            "SELECT name AS table_name FROM {} \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            master_table(schema)
        );
        statement(&sql, Vec::new())
    }

    fn indexes_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        let (args, params) = pragma_args(table, schema);
        // pragma_index_info takes the schema as its second argument too
        let info_args = if params.len() > 1 { "il.name, ?2" } else { "il.name" };
        let sql = format!(
            "SELECT il.name AS index_name, m.sql AS index_sql, ii.name AS column_name, \
             il.\"unique\" AS is_unique \
             FROM pragma_index_list({args}) AS il \
             JOIN pragma_index_info({info_args}) AS ii \
             LEFT JOIN {master} AS m ON m.type = 'index' AND m.name = il.name \
             ORDER BY il.name, ii.seqno",
            master = master_table(schema),
        );
        statement(&sql, params)
    }

    fn columns_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        let (args, params) = pragma_args(table, schema);
        let sql = format!(
            "SELECT name AS column_name, type AS data_type, \
             CASE WHEN \"notnull\" = 0 AND pk = 0 THEN 1 ELSE 0 END AS is_nullable, \
             CASE WHEN pk > 0 THEN 1 ELSE 0 END AS is_primary_key, \
             dflt_value AS column_default \
             FROM pragma_table_info({args}) ORDER BY cid"
        );
        statement(&sql, params)
    }

    fn primary_keys_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        let (args, params) = pragma_args(table, schema);
        let sql = format!(
            "SELECT name AS column_name FROM pragma_table_info({args}) WHERE pk > 0 ORDER BY pk"
        );
        statement(&sql, params)
    }

    fn foreign_keys_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        let (args, params) = pragma_args(table, schema);
        // "to" is NULL when the reference targets the parent's implicit key
        let sql = format!(
            "SELECT \"from\" AS column_name, \"table\" AS dest_table, \
             COALESCE(\"to\", '') AS dest_column \
             FROM pragma_foreign_key_list({args}) ORDER BY id, seq"
        );
        statement(&sql, params)
    }
}
