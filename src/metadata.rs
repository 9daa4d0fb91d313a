//! Introspection records and their decoding from catalog rows.

use serde::{Deserialize, Serialize};

use crate::database::{DatabaseResult, DatabaseRow};

/// One index on a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    /// Definition as stored by the database, where it keeps one
    pub sql: Option<String>,
    /// Key columns in index order
    pub columns: Vec<String>,
    pub unique: bool,
    pub table: String,
}

/// One physical column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub table: String,
    pub default: Option<String>,
}

/// One foreign-key column and what it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyMetadata {
    pub column: String,
    pub dest_table: String,
    pub dest_column: String,
    pub table: String,
}

impl ForeignKeyMetadata {
    /// `(column, dest_table, dest_column)`
    pub fn as_tuple(&self) -> (&str, &str, &str) {
        (&self.column, &self.dest_table, &self.dest_column)
    }
}

fn flag(row: &dyn DatabaseRow, column: &str) -> DatabaseResult<bool> {
    Ok(row.try_get_i64(column)?.unwrap_or(0) != 0)
}

pub(crate) fn table_names(rows: &[Box<dyn DatabaseRow>]) -> DatabaseResult<Vec<String>> {
    rows.iter().map(|row| row.get_string("table_name")).collect()
}

/// Fold one-row-per-key-column results into one record per index name
pub(crate) fn indexes_from_rows(
    table: &str,
    rows: &[Box<dyn DatabaseRow>],
) -> DatabaseResult<Vec<IndexMetadata>> {
    let mut indexes: Vec<IndexMetadata> = Vec::new();

    for row in rows {
        let name = row.get_string("index_name")?;
        let column = row.try_get_string("column_name")?;

        let position = match indexes.iter().position(|idx| idx.name == name) {
            Some(position) => position,
            None => {
                indexes.push(IndexMetadata {
                    sql: row.try_get_string("index_sql")?,
                    unique: flag(row.as_ref(), "is_unique")?,
                    name,
                    columns: Vec::new(),
                    table: table.to_string(),
                });
                indexes.len() - 1
            }
        };

        // Expression keys have no column name
        if let Some(column) = column {
            indexes[position].columns.push(column);
        }
    }

    Ok(indexes)
}

pub(crate) fn columns_from_rows(
    table: &str,
    rows: &[Box<dyn DatabaseRow>],
) -> DatabaseResult<Vec<ColumnMetadata>> {
    rows.iter()
        .map(|row| {
            Ok(ColumnMetadata {
                name: row.get_string("column_name")?,
                data_type: row.try_get_string("data_type")?.unwrap_or_default(),
                nullable: flag(row.as_ref(), "is_nullable")?,
                primary_key: flag(row.as_ref(), "is_primary_key")?,
                table: table.to_string(),
                default: row.try_get_string("column_default")?,
            })
        })
        .collect()
}

pub(crate) fn primary_keys_from_rows(rows: &[Box<dyn DatabaseRow>]) -> DatabaseResult<Vec<String>> {
    rows.iter().map(|row| row.get_string("column_name")).collect()
}

pub(crate) fn foreign_keys_from_rows(
    table: &str,
    rows: &[Box<dyn DatabaseRow>],
) -> DatabaseResult<Vec<ForeignKeyMetadata>> {
    rows.iter()
        .map(|row| {
            Ok(ForeignKeyMetadata {
                column: row.get_string("column_name")?,
                dest_table: row.get_string("dest_table")?,
                dest_column: row.try_get_string("dest_column")?.unwrap_or_default(),
                table: table.to_string(),
            })
        })
        .collect()
}
