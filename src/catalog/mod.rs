//! Per-dialect catalog queries used for introspection.
//!
//! Every dialect aliases its output to the same column names so rows can be
//! decoded in one place:
//!
//! | query        | columns                                                        |
//! |--------------|----------------------------------------------------------------|
//! | tables       | `table_name`                                                   |
//! | indexes      | `index_name`, `index_sql`, `column_name`, `is_unique`          |
//! | columns      | `column_name`, `data_type`, `is_nullable`, `is_primary_key`, `column_default` |
//! | primary keys | `column_name`                                                  |
//! | foreign keys | `column_name`, `dest_table`, `dest_column`                     |
//!
//! Flags are 0/1 integers. Index rows come ordered by index name then key
//! position; column rows by ordinal position.

mod mysql;
mod postgres;
mod sqlite;

use std::fmt::Debug;

use crate::compiler::CompiledStatement;
use crate::database::{DatabaseType, DatabaseValue};

pub use mysql::MySqlCatalog;
pub use postgres::PostgresCatalog;
pub use sqlite::SqliteCatalog;

/// Builds the single catalog query behind each introspection call
pub trait Catalog: Send + Sync + Debug {
    fn database_type(&self) -> DatabaseType;

    fn tables_query(&self, schema: Option<&str>) -> CompiledStatement;

    fn indexes_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement;

    fn columns_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement;

    fn primary_keys_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement;

    fn foreign_keys_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement;
}

/// Build the catalog for a database type
pub fn catalog_for(db_type: DatabaseType) -> Box<dyn Catalog> {
    match db_type {
        DatabaseType::Sqlite => Box::new(SqliteCatalog),
        DatabaseType::MySql => Box::new(MySqlCatalog),
        DatabaseType::Postgres => Box::new(PostgresCatalog),
    }
}

/// Schema as a bound parameter; NULL selects the connection's default schema
fn schema_param(schema: Option<&str>) -> DatabaseValue {
    DatabaseValue::from(schema.filter(|s| !s.is_empty()))
}

fn statement(sql: &str, params: Vec<DatabaseValue>) -> CompiledStatement {
    CompiledStatement {
        sql: sql.to_string(),
        params,
    }
}
