use crate::compiler::{
    errors::{sql_generation_error, unsupported_feature_error},
    ColumnDescriptor, Constraint, DataType, IndexDescriptor, IndexType, IntegerSize,
    ModelDescriptor, Result, SqlCompiler,
};
use crate::database::DatabaseType;

/// PostgreSQL DDL compiler
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresCompiler;

impl PostgresCompiler {
    pub fn new() -> Self {
        Self
    }

    fn serial_type(column: &ColumnDescriptor) -> Result<&'static str> {
        match &column.data_type {
            DataType::Integer(size) => Ok(match size {
                IntegerSize::I8 | IntegerSize::U8 | IntegerSize::I16 | IntegerSize::U16 => {
                    "SMALLSERIAL"
                }
                IntegerSize::I32 | IntegerSize::U32 => "SERIAL",
                IntegerSize::I64 | IntegerSize::U64 => "BIGSERIAL",
            }),
            DataType::SmallInt => Ok("SMALLSERIAL"),
            DataType::BigInt => Ok("BIGSERIAL"),
            _ => Err(sql_generation_error(format!(
                "SERIAL types only supported for integer columns, '{}' is not one",
                column.name
            ))),
        }
    }
}

impl SqlCompiler for PostgresCompiler {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn map_data_type(&self, data_type: &DataType) -> Result<String> {
        let ty = match data_type {
            DataType::Text(_) => "TEXT".to_string(),
            DataType::Varchar(len) => format!("VARCHAR({})", len),
            DataType::Char(len) => format!("CHAR({})", len),
            DataType::Integer(size) => match size {
                IntegerSize::I8 | IntegerSize::U8 | IntegerSize::I16 | IntegerSize::U16 => {
                    "SMALLINT".to_string()
                }
                IntegerSize::I32 | IntegerSize::U32 => "INTEGER".to_string(),
                IntegerSize::I64 | IntegerSize::U64 => "BIGINT".to_string(),
            },
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Float => "REAL".to_string(),
            DataType::Double => "DOUBLE PRECISION".to_string(),
            DataType::Decimal(p, s) => format!("NUMERIC({}, {})", p, s),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME WITHOUT TIME ZONE".to_string(),
            DataType::DateTime | DataType::Timestamp => "TIMESTAMP WITHOUT TIME ZONE".to_string(),
            DataType::TimestampTz => "TIMESTAMP WITH TIME ZONE".to_string(),
            DataType::Blob => "BYTEA".to_string(),
            DataType::Json => "JSON".to_string(),
            DataType::JsonB => "JSONB".to_string(),
            DataType::Uuid => "UUID".to_string(),
            // No CREATE TYPE here; values are checked inline
            DataType::Enum(_, _) => "TEXT".to_string(),
            DataType::Custom(custom) => custom.clone(),
        };
        Ok(ty)
    }

    fn column_definition_sql(&self, column: &ColumnDescriptor, inline_pk: bool) -> Result<String> {
        let name = self.quote_identifier(&column.name);
        let mut sql = if column.auto_increment {
            format!("{} {}", name, Self::serial_type(column)?)
        } else {
            format!("{} {}", name, self.map_data_type(&column.data_type)?)
        };

        if inline_pk {
            sql.push_str(" PRIMARY KEY");
        }

        if !column.is_nullable {
            sql.push_str(" NOT NULL");
        }

        if let Some(def) = &column.default_value {
            sql.push_str(&format!(" DEFAULT {}", def));
        }

        if column.is_unique && !inline_pk {
            sql.push_str(" UNIQUE");
        }

        if let DataType::Enum(_, variants) = &column.data_type {
            let values: Vec<String> = variants
                .iter()
                .map(|v| format!("'{}'", self.escape_string_literal(v)))
                .collect();
            sql.push_str(&format!(" CHECK ({} IN ({}))", name, values.join(", ")));
        }

        for c in &column.constraints {
            if let Constraint::Check { expression, .. } = c {
                sql.push_str(&format!(" CHECK ({})", expression));
            }
        }

        Ok(sql)
    }

    fn index_sql(&self, index: &IndexDescriptor, model: &ModelDescriptor) -> Result<String> {
        let method = match &index.index_type {
            Some(IndexType::Gin) => " USING GIN",
            Some(IndexType::Gist) => " USING GIST",
            Some(IndexType::Hash) => " USING HASH",
            Some(IndexType::Spatial) => {
                return Err(unsupported_feature_error("Spatial indexes not supported"));
            }
            Some(IndexType::BTree) | None => "",
        };
        let where_clause = index
            .condition
            .as_ref()
            .map(|c| format!(" WHERE {}", c))
            .unwrap_or_default();

        // PostgreSQL creates the index in the table's schema
        Ok(format!(
            "CREATE {}INDEX {} ON {}{} ({}){}",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.resolved_name(&model.name)),
            self.qualified_table_name(&model.name, model.schema.as_deref()),
            method,
            self.quote_columns(&index.columns),
            where_clause
        ))
    }

    fn identifier_quote_char(&self) -> char {
        '"'
    }
}
