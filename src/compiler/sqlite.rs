use crate::compiler::{
    errors::{sql_generation_error, unsupported_feature_error},
    ColumnDescriptor, Constraint, DataType, IndexDescriptor, IndexType, ModelDescriptor, Result,
    SqlCompiler,
};
use crate::database::DatabaseType;

/// SQLite DDL compiler
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteCompiler;

impl SqliteCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl SqlCompiler for SqliteCompiler {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn map_data_type(&self, data_type: &DataType) -> Result<String> {
        let ty = match data_type {
            // SQLite has a flexible type system with only a few storage classes
            DataType::Text(_) | DataType::Varchar(_) | DataType::Char(_) => "TEXT",
            DataType::Integer(_) | DataType::SmallInt | DataType::BigInt => "INTEGER",
            DataType::Boolean => "INTEGER",
            DataType::Float | DataType::Double => "REAL",
            DataType::Decimal(_, _) => "NUMERIC",
            // Date/time values are stored as ISO8601 text
            DataType::Date
            | DataType::Time
            | DataType::DateTime
            | DataType::Timestamp
            | DataType::TimestampTz => "TEXT",
            DataType::Blob => "BLOB",
            DataType::Json | DataType::JsonB | DataType::Uuid => "TEXT",
            DataType::Enum(_, _) => "TEXT",
            DataType::Custom(custom) => return Ok(custom.clone()),
        };
        Ok(ty.to_string())
    }

    fn column_definition_sql(&self, column: &ColumnDescriptor, inline_pk: bool) -> Result<String> {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.map_data_type(&column.data_type)?,
        ];

        if column.auto_increment && !(inline_pk && column.data_type.is_integer()) {
            return Err(sql_generation_error(format!(
                "SQLite AUTOINCREMENT on '{}' requires a single INTEGER PRIMARY KEY column",
                column.name
            )));
        }

        if inline_pk {
            if column.auto_increment {
                parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
            } else {
                parts.push("PRIMARY KEY".to_string());
            }
        }

        if !column.is_nullable {
            parts.push("NOT NULL".to_string());
        }

        if column.is_unique && !inline_pk {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default_value) = &column.default_value {
            parts.push(format!("DEFAULT {}", default_value));
        }

        if let DataType::Enum(_, variants) = &column.data_type {
            let values: Vec<String> = variants
                .iter()
                .map(|v| format!("'{}'", self.escape_string_literal(v)))
                .collect();
            parts.push(format!(
                "CHECK ({} IN ({}))",
                self.quote_identifier(&column.name),
                values.join(", ")
            ));
        }

        for constraint in &column.constraints {
            if let Constraint::Check { expression, .. } = constraint {
                parts.push(format!("CHECK ({})", expression));
            }
        }

        Ok(parts.join(" "))
    }

    fn index_sql(&self, index: &IndexDescriptor, model: &ModelDescriptor) -> Result<String> {
        // SQLite only has the default btree index
        if let Some(idx_type) = &index.index_type {
            if !matches!(idx_type, IndexType::BTree) {
                return Err(unsupported_feature_error(format!(
                    "SQLite only supports BTree indexes, not {:?}",
                    idx_type
                )));
            }
        }

        let where_clause = index
            .condition
            .as_ref()
            .map(|cond| format!(" WHERE {}", cond))
            .unwrap_or_default();

        // The index lives in the table's schema; only the index name is qualified
        Ok(format!(
            "CREATE {}INDEX {} ON {} ({}){}",
            if index.is_unique { "UNIQUE " } else { "" },
            self.qualified_table_name(&index.resolved_name(&model.name), model.schema.as_deref()),
            self.quote_identifier(&model.name),
            self.quote_columns(&index.columns),
            where_clause
        ))
    }

    fn identifier_quote_char(&self) -> char {
        '"'
    }
}
