use super::{schema_param, statement, Catalog};
use crate::compiler::CompiledStatement;
use crate::database::DatabaseType;

/// PostgreSQL catalog over `information_schema` and `pg_catalog`
///
/// `$1` is always the table name and `$2` the schema (NULL means
/// `current_schema()`).
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresCatalog;

const TABLES_SQL: &str = "SELECT table_name::text AS table_name \
    FROM information_schema.tables \
    WHERE table_schema = COALESCE($1::text, current_schema()) AND table_type = 'BASE TABLE' \
    ORDER BY table_name";

const INDEXES_SQL: &str = "SELECT ic.relname::text AS index_name, \
    pg_get_indexdef(ix.indexrelid) AS index_sql, \
    a.attname::text AS column_name, \
    (CASE WHEN ix.indisunique THEN 1 ELSE 0 END)::bigint AS is_unique \
    FROM pg_catalog.pg_index ix \
    JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid \
    JOIN pg_catalog.pg_class ic ON ic.oid = ix.indexrelid \
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
    JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) ON true \
    LEFT JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
    WHERE t.relname = $1::text AND n.nspname = COALESCE($2::text, current_schema()) \
    ORDER BY ic.relname, k.ord";

const COLUMNS_SQL: &str = "SELECT c.column_name::text AS column_name, \
    c.data_type::text AS data_type, \
    (CASE WHEN c.is_nullable = 'YES' THEN 1 ELSE 0 END)::bigint AS is_nullable, \
    (CASE WHEN pk.column_name IS NULL THEN 0 ELSE 1 END)::bigint AS is_primary_key, \
    c.column_default::text AS column_default \
    FROM information_schema.columns c \
    LEFT JOIN ( \
        SELECT kcu.column_name \
        FROM information_schema.table_constraints tc \
        JOIN information_schema.key_column_usage kcu \
          ON kcu.constraint_name = tc.constraint_name \
         AND kcu.table_schema = tc.table_schema \
         AND kcu.table_name = tc.table_name \
        WHERE tc.constraint_type = 'PRIMARY KEY' \
          AND tc.table_name = $1::text \
          AND tc.table_schema = COALESCE($2::text, current_schema()) \
    ) pk ON pk.column_name = c.column_name \
    WHERE c.table_name = $1::text AND c.table_schema = COALESCE($2::text, current_schema()) \
    ORDER BY c.ordinal_position";

const PRIMARY_KEYS_SQL: &str = "SELECT kcu.column_name::text AS column_name \
    FROM information_schema.table_constraints tc \
    JOIN information_schema.key_column_usage kcu \
      ON kcu.constraint_name = tc.constraint_name \
     AND kcu.table_schema = tc.table_schema \
     AND kcu.table_name = tc.table_name \
    WHERE tc.constraint_type = 'PRIMARY KEY' \
      AND tc.table_name = $1::text \
      AND tc.table_schema = COALESCE($2::text, current_schema()) \
    ORDER BY kcu.ordinal_position";

// conkey and confkey are parallel arrays; unnesting them together keeps
// each local column paired with the referenced column at the same position.
const FOREIGN_KEYS_SQL: &str = "SELECT src.attname::text AS column_name, \
    dt.relname::text AS dest_table, \
    dst.attname::text AS dest_column \
    FROM pg_catalog.pg_constraint con \
    JOIN pg_catalog.pg_class t ON t.oid = con.conrelid \
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
    JOIN pg_catalog.pg_class dt ON dt.oid = con.confrelid \
    JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(src_attnum, dest_attnum, ord) ON true \
    JOIN pg_catalog.pg_attribute src ON src.attrelid = con.conrelid AND src.attnum = k.src_attnum \
    JOIN pg_catalog.pg_attribute dst ON dst.attrelid = con.confrelid AND dst.attnum = k.dest_attnum \
    WHERE con.contype = 'f' \
      AND t.relname = $1::text \
      AND n.nspname = COALESCE($2::text, current_schema()) \
    ORDER BY con.conname, k.ord";

impl Catalog for PostgresCatalog {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn tables_query(&self, schema: Option<&str>) -> CompiledStatement {
        statement(TABLES_SQL, vec![schema_param(schema)])
    }

    fn indexes_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        statement(INDEXES_SQL, vec![table.into(), schema_param(schema)])
    }

    fn columns_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        statement(COLUMNS_SQL, vec![table.into(), schema_param(schema)])
    }

    fn primary_keys_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        statement(PRIMARY_KEYS_SQL, vec![table.into(), schema_param(schema)])
    }

    fn foreign_keys_query(&self, table: &str, schema: Option<&str>) -> CompiledStatement {
        statement(FOREIGN_KEYS_SQL, vec![table.into(), schema_param(schema)])
    }
}
