use super::{schema_param, statement, Catalog};
use crate::compiler::CompiledStatement;
use crate::database::{DatabaseType, DatabaseValue};

/// MySQL catalog over `information_schema`
///
/// Placeholders are positional, so table and schema are bound in the order
/// they appear. A NULL schema means `DATABASE()`. Text columns are cast to
/// CHAR because the catalog reports some of them as binary strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlCatalog;

const TABLES_SQL: &str = "SELECT CAST(table_name AS CHAR) AS table_name \
    FROM information_schema.tables \
    WHERE table_schema = COALESCE(?, DATABASE()) AND table_type = 'BASE TABLE' \
    ORDER BY table_name";

const INDEXES_SQL: &str = "SELECT CAST(index_name AS CHAR) AS index_name, \
    CAST(NULL AS CHAR) AS index_sql, \
    CAST(column_name AS CHAR) AS column_name, \
    CAST(CASE WHEN non_unique = 0 THEN 1 ELSE 0 END AS SIGNED) AS is_unique \
    FROM information_schema.statistics \
    WHERE table_name = ? AND table_schema = COALESCE(?, DATABASE()) \
    ORDER BY index_name, seq_in_index";

const COLUMNS_SQL: &str = "SELECT CAST(column_name AS CHAR) AS column_name, \
    CAST(data_type AS CHAR) AS data_type, \
    CAST(CASE WHEN is_nullable = 'YES' THEN 1 ELSE 0 END AS SIGNED) AS is_nullable, \
    CAST(CASE WHEN column_key = 'PRI' THEN 1 ELSE 0 END AS SIGNED) AS is_primary_key, \
    CAST(column_default AS CHAR) AS column_default \
    FROM information_schema.columns \
    WHERE table_name = ? AND table_schema = COALESCE(?, DATABASE()) \
    ORDER BY ordinal_position";

const PRIMARY_KEYS_SQL: &str = "SELECT CAST(column_name AS CHAR) AS column_name \
    FROM information_schema.key_column_usage \
    WHERE constraint_name = 'PRIMARY' \
      AND table_name = ? AND table_schema = COALESCE(?, DATABASE()) \
    ORDER BY ordinal_position";

const FOREIGN_KEYS_SQL: &str = "SELECT CAST(column_name AS CHAR) AS column_name, \
    CAST(referenced_table_name AS CHAR) AS dest_table, \
    CAST(referenced_column_name AS CHAR) AS dest_column \
    FROM information_schema.key_column_usage \
    WHERE referenced_table_name IS NOT NULL \
      AND table_name = ? AND table_schema = COALESCE(?, DATABASE()) \
    ORDER BY constraint_name, ordinal_position";

fn table_params(table: &str, schema: Option<&str>) -> Vec<DatabaseValue> {
    vec![table.into(), schema_param(schema)]
}

impl Catalog for MySqlCatalog {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn tables_query(&self, schema: Option<&str>) -> CompiledStatement {
        statement(TABLES_SQL, vec![schema_param(schema)])
    }

    fn indexes_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        statement(INDEXES_SQL, table_params(table, schema))
    }

    fn columns_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        statement(COLUMNS_SQL, table_params(table, schema))
    }

    fn primary_keys_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        statement(PRIMARY_KEYS_SQL, table_params(table, schema))
    }

    fn foreign_keys_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        statement(FOREIGN_KEYS_SQL, table_params(table, schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_count_matches_params() {
        let catalog = MySqlCatalog;
        let statements = [
            catalog.tables_query(None),
            catalog.indexes_query("users", None),
            catalog.columns_query("users", Some("app")),
            catalog.primary_keys_query("users", None),
            catalog.foreign_keys_query("orders", None),
        ];
        for stmt in statements {
            assert_eq!(stmt.sql.matches('?').count(), stmt.params.len(), "{}", stmt.sql);
        }
    }

    #[test]
    fn test_foreign_keys_use_referenced_columns() {
        let stmt = MySqlCatalog.foreign_keys_query("orders", None);
        assert!(stmt.sql.contains("referenced_table_name IS NOT NULL"));
        assert_eq!(stmt.params[0], DatabaseValue::from("orders"));
        assert_eq!(stmt.params[1], DatabaseValue::Null);
    }
}
