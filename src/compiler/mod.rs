// DDL compiler
//
// Turns model descriptors into dialect-specific CREATE TABLE, CREATE INDEX
// and DROP TABLE statements. Each dialect supplies type mapping, column
// rendering and index rules; statement assembly is shared.

pub mod definitions;
pub mod errors;
mod mysql;
mod postgres;
mod sqlite;

use std::collections::HashSet;
use std::fmt::Debug;

use crate::database::{DatabaseType, DatabaseValue};

pub use definitions::{
    ColumnDescriptor, Constraint, DataType, IndexDescriptor, IndexType, IntegerSize,
    ModelDescriptor, ReferentialAction,
};
pub use errors::{Error, Result};
pub use mysql::MySqlCompiler;
pub use postgres::PostgresCompiler;
pub use sqlite::SqliteCompiler;

use errors::{model_definition_error, sql_generation_error};

/// SQL text plus its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

impl CompiledStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Dialect-specific DDL generation
pub trait SqlCompiler: Send + Sync + Debug {
    fn database_type(&self) -> DatabaseType;

    /// Map a common data type to a database-specific type string
    fn map_data_type(&self, data_type: &DataType) -> Result<String>;

    /// Render one column. `inline_pk` is set when the column alone forms the
    /// primary key and should carry it inline.
    fn column_definition_sql(&self, column: &ColumnDescriptor, inline_pk: bool) -> Result<String>;

    /// Render `CREATE [UNIQUE] INDEX ...` for a validated index
    fn index_sql(&self, index: &IndexDescriptor, model: &ModelDescriptor) -> Result<String>;

    /// Character used to quote identifiers
    fn identifier_quote_char(&self) -> char;

    /// Table options appended after the closing parenthesis
    fn table_suffix_sql(&self, _model: &ModelDescriptor) -> Result<String> {
        Ok(String::new())
    }

    /// Quote an identifier (table, column name), doubling embedded quotes
    fn quote_identifier(&self, identifier: &str) -> String {
        let q = self.identifier_quote_char();
        let escaped = identifier.replace(q, &format!("{}{}", q, q));
        format!("{}{}{}", q, escaped, q)
    }

    /// Escape a string literal for SQL
    fn escape_string_literal(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    fn qualified_table_name(&self, table: &str, schema: Option<&str>) -> String {
        match schema {
            Some(schema) if !schema.is_empty() => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
            _ => self.quote_identifier(table),
        }
    }

    fn quote_columns(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render a table-level constraint
    fn constraint_sql(&self, constraint: &Constraint, table: &str) -> Result<String> {
        let named = |name: &Option<String>, fallback: &str| {
            let cname = name.as_deref().unwrap_or(fallback);
            self.quote_identifier(&format!("{}_{}", table, cname))
        };

        let sql = match constraint {
            Constraint::PrimaryKey { name, columns } => format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                named(name, "pk"),
                self.quote_columns(columns)
            ),
            Constraint::Unique { name, columns } => format!(
                "CONSTRAINT {} UNIQUE ({})",
                named(name, "unique"),
                self.quote_columns(columns)
            ),
            Constraint::Check { name, expression } => {
                format!("CONSTRAINT {} CHECK ({})", named(name, "check"), expression)
            }
            Constraint::ForeignKey {
                name,
                columns,
                references_table,
                references_columns,
                on_delete,
                on_update,
            } => {
                let fallback = format!("{}_fk", columns.join("_"));
                let target = if references_columns.is_empty() {
                    self.quote_identifier(references_table)
                } else {
                    format!(
                        "{} ({})",
                        self.quote_identifier(references_table),
                        self.quote_columns(references_columns)
                    )
                };
                format!(
                    "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ON DELETE {} ON UPDATE {}",
                    named(name, &fallback),
                    self.quote_columns(columns),
                    target,
                    ReferentialAction::as_sql(on_delete.as_ref()),
                    ReferentialAction::as_sql(on_update.as_ref())
                )
            }
        };
        Ok(sql)
    }

    /// `CREATE TABLE` for `model`; `safe` adds `IF NOT EXISTS`
    fn compile_create_table(&self, model: &ModelDescriptor, safe: bool) -> Result<CompiledStatement> {
        validate_model(model)?;

        let pk_columns: Vec<String> = model
            .primary_key_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        let inline_pk = model.primary_key.is_none() && pk_columns.len() == 1;

        let mut parts = model
            .columns
            .iter()
            .map(|c| self.column_definition_sql(c, inline_pk && c.is_primary_key))
            .collect::<Result<Vec<_>>>()?;

        if !inline_pk && !pk_columns.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.quote_columns(&pk_columns)));
        }

        for constraint in &model.constraints {
            if !matches!(constraint, Constraint::ForeignKey { .. }) {
                parts.push(self.constraint_sql(constraint, &model.name)?);
            }
        }
        for fk in model.foreign_keys() {
            parts.push(self.constraint_sql(&fk, &model.name)?);
        }

        let sql = format!(
            "CREATE TABLE {}{} (\n  {}\n){}",
            if safe { "IF NOT EXISTS " } else { "" },
            self.qualified_table_name(&model.name, model.schema.as_deref()),
            parts.join(",\n  "),
            self.table_suffix_sql(model)?
        );
        Ok(CompiledStatement::new(sql))
    }

    /// `CREATE [UNIQUE] INDEX` over already-resolved columns of `model`
    fn compile_create_index(
        &self,
        model: &ModelDescriptor,
        columns: &[&ColumnDescriptor],
        unique: bool,
    ) -> Result<CompiledStatement> {
        let mut index = IndexDescriptor::new(columns.iter().map(|c| c.name.clone()));
        index.is_unique = unique;
        self.compile_index(model, &index)
    }

    /// `CREATE [UNIQUE] INDEX` for a declared index
    fn compile_index(&self, model: &ModelDescriptor, index: &IndexDescriptor) -> Result<CompiledStatement> {
        if index.columns.is_empty() {
            return Err(model_definition_error(format!(
                "index on '{}' has no columns",
                model.name
            )));
        }
        for column in &index.columns {
            if model.column(column).is_none() {
                return Err(model_definition_error(format!(
                    "index column '{}' does not exist on '{}'",
                    column, model.name
                )));
            }
        }
        Ok(CompiledStatement::new(self.index_sql(index, model)?))
    }

    /// `DROP TABLE`; `safe` adds `IF EXISTS`
    fn compile_drop_table(&self, model: &ModelDescriptor, safe: bool) -> Result<CompiledStatement> {
        if model.name.trim().is_empty() {
            return Err(sql_generation_error("cannot drop a table without a name"));
        }
        Ok(CompiledStatement::new(format!(
            "DROP TABLE {}{}",
            if safe { "IF EXISTS " } else { "" },
            self.qualified_table_name(&model.name, model.schema.as_deref())
        )))
    }
}

/// Build the compiler for a database type
pub fn compiler_for(db_type: DatabaseType) -> Box<dyn SqlCompiler> {
    match db_type {
        DatabaseType::Sqlite => Box::new(SqliteCompiler::new()),
        DatabaseType::MySql => Box::new(MySqlCompiler::new()),
        DatabaseType::Postgres => Box::new(PostgresCompiler::new()),
    }
}

/// Common shape checks before any SQL is produced
fn validate_model(model: &ModelDescriptor) -> Result<()> {
    if model.name.trim().is_empty() {
        return Err(model_definition_error("model name must not be empty"));
    }
    if model.columns.is_empty() {
        return Err(model_definition_error(format!(
            "model '{}' has no columns",
            model.name
        )));
    }

    let mut seen = HashSet::new();
    for column in &model.columns {
        if column.name.trim().is_empty() {
            return Err(model_definition_error(format!(
                "model '{}' has a column without a name",
                model.name
            )));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(model_definition_error(format!(
                "duplicate column '{}' in model '{}'",
                column.name, model.name
            )));
        }
    }

    for pk in model.primary_key_columns() {
        if !seen.contains(pk) {
            return Err(model_definition_error(format!(
                "primary key column '{}' does not exist on '{}'",
                pk, model.name
            )));
        }
    }

    for fk in model.foreign_keys() {
        if let Constraint::ForeignKey {
            columns,
            references_table,
            references_columns,
            ..
        } = &fk
        {
            if references_table.trim().is_empty() {
                return Err(model_definition_error(format!(
                    "foreign key on '{}' has no referenced table",
                    model.name
                )));
            }
            if let Some(missing) = columns.iter().find(|c| !seen.contains(c.as_str())) {
                return Err(model_definition_error(format!(
                    "foreign key column '{}' does not exist on '{}'",
                    missing, model.name
                )));
            }
            if !references_columns.is_empty() && references_columns.len() != columns.len() {
                return Err(model_definition_error(format!(
                    "foreign key on '{}' maps {} columns to {} referenced columns",
                    model.name,
                    columns.len(),
                    references_columns.len()
                )));
            }
        }
    }

    Ok(())
}
