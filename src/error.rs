use crate::compiler::Error as CompileError;
use crate::database::DatabaseError;
use crate::schema::SchemaError;
use std::io;
use thiserror::Error;

/// Unified error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Caller passed arguments that can never succeed; raised before any I/O
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error category for configuration issues
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid environment variable {name}: {reason}")]
    InvalidEnvVar { name: String, reason: String },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Error {
    /// The driver error behind this error, if any.
    pub fn as_database_error(&self) -> Option<&DatabaseError> {
        match self {
            Error::Database(err) => Some(err),
            _ => None,
        }
    }

    /// True when a DDL statement failed because its target already exists.
    pub fn is_already_exists(&self) -> bool {
        self.as_database_error()
            .is_some_and(DatabaseError::is_already_exists)
    }

    /// True when the operation ran before `connect` or after `close`.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Error::Database(DatabaseError::NotConnected))
    }
}
