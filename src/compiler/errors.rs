use std::error::Error as StdError;
use std::fmt;

/// Error types for DDL compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The model descriptor is inconsistent (unknown columns, empty names, ...)
    ModelDefinition(String),
    /// SQL text could not be produced
    SqlGeneration(String),
    /// The target dialect cannot express the requested feature
    UnsupportedFeature(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ModelDefinition(msg) => write!(f, "Model definition error: {}", msg),
            Error::SqlGeneration(msg) => write!(f, "SQL generation error: {}", msg),
            Error::UnsupportedFeature(msg) => write!(f, "Unsupported feature: {}", msg),
        }
    }
}

impl StdError for Error {}

/// Convenience Result type for compiler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Helper to create a ModelDefinition error
pub fn model_definition_error<S: Into<String>>(msg: S) -> Error {
    Error::ModelDefinition(msg.into())
}

/// Helper to create a SqlGeneration error
pub fn sql_generation_error<S: Into<String>>(msg: S) -> Error {
    Error::SqlGeneration(msg.into())
}

/// Helper to create an UnsupportedFeature error
pub fn unsupported_feature_error<S: Into<String>>(msg: S) -> Error {
    Error::UnsupportedFeature(msg.into())
}
