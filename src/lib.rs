//! Async execution bridge for model-driven SQL.
//!
//! Model descriptors are compiled to DDL per dialect, then executed through
//! scoped single-session connections on `sqlx` and `tokio`. Catalog queries
//! read the resulting schema back.

pub mod adapter;
#[cfg(all(test, feature = "sqlite"))]
mod adapter_tests;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod connection;
pub mod database;
pub mod dialect;
pub mod error;
mod logging;
pub mod metadata;
pub mod schema;
pub mod translator;

pub use adapter::{AioDatabase, IndexField};
pub use compiler::{
    ColumnDescriptor, CompiledStatement, Constraint, DataType, IndexDescriptor, ModelDescriptor,
    SqlCompiler,
};
pub use config::{AdapterOptions, Settings};
pub use connection::{AioConnection, Cursor, SqlExecutor};
pub use database::{DatabaseConfig, DatabaseError, DatabaseType, DatabaseValue};
pub use dialect::Dialect;
pub use error::{ConfigError, Error, Result};
pub use logging::{init_logging, init_logging_with};
pub use metadata::{ColumnMetadata, ForeignKeyMetadata, IndexMetadata};
pub use schema::{generate_create_script, load_models, sort_models_topologically, SchemaError};
pub use translator::{DefaultErrorTranslator, ErrorTranslator};
