use crate::compiler::{
    errors::unsupported_feature_error, ColumnDescriptor, Constraint, DataType, IndexDescriptor,
    IndexType, IntegerSize, ModelDescriptor, Result, SqlCompiler,
};
use crate::database::DatabaseType;

/// MySQL DDL compiler
///
/// Targets MySQL >= 5.7 (where JSON is available). MariaDB mostly works too.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlCompiler;

impl MySqlCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Map IntegerSize to the concrete MySQL integer type (optionally unsigned)
    fn map_integer_size(size: &IntegerSize) -> &'static str {
        match size {
            IntegerSize::I8 => "TINYINT",
            IntegerSize::U8 => "TINYINT UNSIGNED",
            IntegerSize::I16 => "SMALLINT",
            IntegerSize::U16 => "SMALLINT UNSIGNED",
            IntegerSize::I32 => "INT",
            IntegerSize::U32 => "INT UNSIGNED",
            IntegerSize::I64 => "BIGINT",
            IntegerSize::U64 => "BIGINT UNSIGNED",
        }
    }
}

impl SqlCompiler for MySqlCompiler {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn map_data_type(&self, data_type: &DataType) -> Result<String> {
        let ty = match data_type {
            DataType::Text(_) => "TEXT".to_string(),
            DataType::Varchar(len) => format!("VARCHAR({})", len),
            DataType::Char(len) => format!("CHAR({})", len),
            DataType::Integer(size) => Self::map_integer_size(size).to_string(),
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Boolean => "TINYINT(1)".to_string(),
            DataType::Float => "FLOAT".to_string(),
            DataType::Double => "DOUBLE".to_string(),
            DataType::Decimal(p, s) => format!("DECIMAL({}, {})", p, s),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::DateTime => "DATETIME".to_string(),
            DataType::Timestamp | DataType::TimestampTz => "TIMESTAMP".to_string(),
            DataType::Blob => "BLOB".to_string(),
            DataType::Json | DataType::JsonB => "JSON".to_string(),
            DataType::Uuid => "CHAR(36)".to_string(),
            DataType::Enum(_, variants) => {
                let vals: Vec<String> = variants
                    .iter()
                    .map(|v| format!("'{}'", self.escape_string_literal(v)))
                    .collect();
                format!("ENUM({})", vals.join(", "))
            }
            DataType::Custom(custom) => custom.clone(),
        };
        Ok(ty)
    }

    fn column_definition_sql(&self, column: &ColumnDescriptor, inline_pk: bool) -> Result<String> {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.map_data_type(&column.data_type)?,
        ];

        parts.push(if column.is_nullable { "NULL" } else { "NOT NULL" }.to_string());

        if let Some(default_val) = &column.default_value {
            parts.push(format!("DEFAULT {}", default_val));
        }

        if column.auto_increment {
            parts.push("AUTO_INCREMENT".to_string());
        }

        // The table-level PRIMARY KEY clause covers composite keys
        if inline_pk {
            parts.push("PRIMARY KEY".to_string());
        } else if column.is_unique {
            parts.push("UNIQUE".to_string());
        }

        for c in &column.constraints {
            if let Constraint::Check { expression, .. } = c {
                parts.push(format!("CHECK ({})", expression));
            }
        }

        if let Some(comment) = &column.comment {
            parts.push(format!("COMMENT '{}'", self.escape_string_literal(comment)));
        }

        Ok(parts.join(" "))
    }

    fn index_sql(&self, index: &IndexDescriptor, model: &ModelDescriptor) -> Result<String> {
        let using_clause = match &index.index_type {
            None | Some(IndexType::BTree) => "",
            Some(IndexType::Hash) => " USING HASH",
            Some(unsupported) => {
                return Err(unsupported_feature_error(format!(
                    "MySQL does not support {:?} index type",
                    unsupported
                )));
            }
        };

        if index.condition.is_some() {
            return Err(unsupported_feature_error(
                "MySQL does not support partial indexes (index conditions)",
            ));
        }

        Ok(format!(
            "CREATE {}INDEX {} ON {} ({}){}",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.resolved_name(&model.name)),
            self.qualified_table_name(&model.name, model.schema.as_deref()),
            self.quote_columns(&index.columns),
            using_clause
        ))
    }

    fn identifier_quote_char(&self) -> char {
        '`'
    }

    fn table_suffix_sql(&self, model: &ModelDescriptor) -> Result<String> {
        let mut suffix = String::new();
        if let Some(engine) = &model.engine {
            suffix.push_str(&format!(" ENGINE={}", engine));
        }
        if let Some(charset) = &model.charset {
            suffix.push_str(&format!(" DEFAULT CHARSET={}", charset));
        }
        if let Some(collation) = &model.collation {
            suffix.push_str(&format!(" COLLATE {}", collation));
        }
        if let Some(comment) = &model.comment {
            suffix.push_str(&format!(" COMMENT='{}'", self.escape_string_literal(comment)));
        }
        Ok(suffix)
    }
}
