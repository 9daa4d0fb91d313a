//! Error-translation policy applied to every driver failure before it reaches
//! a caller.

use std::fmt::Debug;

use crate::database::{DatabaseError, DatabaseType};

/// Remaps driver errors into the crate's error taxonomy.
///
/// Implementations must not swallow errors: the output is always an error.
pub trait ErrorTranslator: Send + Sync + Debug {
    fn translate(&self, db_type: DatabaseType, err: DatabaseError) -> DatabaseError;
}

/// Classifies execution failures by the backend's code and message.
///
/// Only `DatabaseError::Query` is reclassified; every other variant passes
/// through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorTranslator;

impl ErrorTranslator for DefaultErrorTranslator {
    fn translate(&self, db_type: DatabaseType, err: DatabaseError) -> DatabaseError {
        match err {
            DatabaseError::Query(msg) => {
                if is_integrity_error(db_type, &msg) {
                    DatabaseError::Integrity(msg)
                } else if is_already_exists_error(db_type, &msg) {
                    DatabaseError::AlreadyExists(msg)
                } else {
                    DatabaseError::Query(msg)
                }
            }
            other => other,
        }
    }
}

/// Table, index or other schema object already present
fn is_already_exists_error(db_type: DatabaseType, err_msg: &str) -> bool {
    let lower_msg = err_msg.to_lowercase();

    match db_type {
        DatabaseType::Sqlite => {
            (lower_msg.contains("table") || lower_msg.contains("index"))
                && lower_msg.contains("already exists")
        }
        DatabaseType::Postgres => {
            lower_msg.contains("error 42p07") // duplicate_table
                || lower_msg.contains("error 42710") // duplicate_object
                || (lower_msg.contains("relation") && lower_msg.contains("already exists"))
                || lower_msg.contains("duplicate table")
        }
        DatabaseType::MySql => {
            lower_msg.contains("error 1050") // Table already exists
                || lower_msg.contains("error 1061") // Duplicate key name
                || (lower_msg.contains("table") && lower_msg.contains("already exists"))
        }
    }
}

/// Constraint violations raised by data, not by schema
fn is_integrity_error(db_type: DatabaseType, err_msg: &str) -> bool {
    let lower_msg = err_msg.to_lowercase();

    match db_type {
        DatabaseType::Sqlite => lower_msg.contains("constraint failed"),
        // SQLSTATE class 23: integrity_constraint_violation
        DatabaseType::Postgres => lower_msg.starts_with("error 23"),
        DatabaseType::MySql => {
            lower_msg.contains("error 1062") // Duplicate entry for key
                || lower_msg.contains("error 1048") // Column cannot be null
                || lower_msg.contains("error 1451") // Cannot delete or update a parent row
                || lower_msg.contains("error 1452") // Cannot add or update a child row
                || (lower_msg.contains("duplicate") && lower_msg.contains("entry"))
        }
    }
}
