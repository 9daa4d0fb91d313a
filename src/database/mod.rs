use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Error type for driver-level database operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    /// Opening, pinging or closing a session failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Statement execution failed
    #[error("query error: {0}")]
    Query(String),

    /// The object a DDL statement creates already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Constraint violation (unique, foreign key, not null, check)
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Transaction control failed or was misused
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation attempted before `connect` or after `close`/`release`
    #[error("not connected")]
    NotConnected,
}

impl DatabaseError {
    /// True when the error reports that the target object already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, DatabaseError::AlreadyExists(_))
    }
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// PostgreSQL database
    Postgres,
    /// MySQL database
    MySql,
    /// SQLite database
    Sqlite,
}

impl Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::Postgres => write!(f, "postgres"),
            DatabaseType::MySql => write!(f, "mysql"),
            DatabaseType::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for DatabaseType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DatabaseType::Postgres),
            "mysql" | "mariadb" => Ok(DatabaseType::MySql),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            other => Err(DatabaseError::Configuration(format!(
                "unknown database type '{}'",
                other
            ))),
        }
    }
}

/// Database configuration for establishing connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Type of database to connect to
    pub db_type: DatabaseType,

    /// Database host (for Postgres/MySQL)
    #[serde(default)]
    pub host: Option<String>,

    /// Database port (for Postgres/MySQL)
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name (for Postgres/MySQL) or file path (for SQLite)
    pub database: String,

    /// Database username (for Postgres/MySQL)
    #[serde(default)]
    pub username: Option<String>,

    /// Database password (for Postgres/MySQL)
    #[serde(default)]
    pub password: Option<String>,

    /// SSL mode (for Postgres)
    #[serde(default)]
    pub ssl_mode: Option<String>,

    /// Additional connection parameters as key-value pairs
    #[serde(default)]
    pub extra_params: HashMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        // Default to SQLite in-memory database
        Self {
            db_type: DatabaseType::Sqlite,
            host: None,
            port: None,
            database: ":memory:".to_string(),
            username: None,
            password: None,
            ssl_mode: None,
            extra_params: HashMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// True for SQLite in-memory targets, whose data lives only while a session is open:
    /// `:memory:`, `file::memory:` with or without a query string, and any target
    /// carrying `mode=memory`.
    pub fn is_in_memory(&self) -> bool {
        if self.db_type != DatabaseType::Sqlite {
            return false;
        }
        let (path, query) = sqlite_target(&self.database);
        path == ":memory:" || query.split('&').any(|param| param == "mode=memory")
    }
}

/// Split a SQLite target into its path, without any `file:` scheme, and its query string
pub(crate) fn sqlite_target(database: &str) -> (&str, &str) {
    let database = database.trim();
    let (path, query) = database.split_once('?').unwrap_or((database, ""));
    (path.strip_prefix("file:").unwrap_or(path), query)
}

/// Represents a parameter value for database queries
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::Text(value.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::Text(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Integer(value)
    }
}

impl From<Option<&str>> for DatabaseValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(DatabaseValue::Null, DatabaseValue::from)
    }
}

/// Represents a row from a database query
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by name
    fn get_string(&self, column: &str) -> DatabaseResult<String>;
    fn get_i64(&self, column: &str) -> DatabaseResult<i64>;

    /// Try to get a column value by name, returning None if the column doesn't exist or is NULL
    fn try_get_string(&self, column: &str) -> DatabaseResult<Option<String>>;
    fn try_get_i64(&self, column: &str) -> DatabaseResult<Option<i64>>;
}

/// Everything one statement reports back
#[derive(Default)]
pub struct StatementOutcome {
    /// The prepared statement describes a result set, even if it produced no rows
    pub returns_rows: bool,
    pub rows: Vec<Box<dyn DatabaseRow>>,
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

impl StatementOutcome {
    /// Rows returned by a query, or rows affected by any other statement
    pub fn rowcount(&self) -> u64 {
        if self.returns_rows {
            self.rows.len() as u64
        } else {
            self.rows_affected
        }
    }
}

/// A single live driver session.
///
/// Every method takes `&mut self`: a session runs one statement at a time and
/// observes program order.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Execute one prepared statement, collecting its rows and its
    /// affected-row count from the driver
    async fn execute(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<StatementOutcome>;

    /// Run unprepared SQL text, possibly several `;`-separated statements.
    /// Used for transaction control and DDL scripts.
    async fn execute_batch(&mut self, sql: &str) -> DatabaseResult<u64>;

    /// Check if the connection is alive
    async fn ping(&mut self) -> DatabaseResult<()>;

    /// Close the session gracefully
    async fn close(self: Box<Self>) -> DatabaseResult<()>;
}

/// Opens driver sessions against one configured target.
#[async_trait]
pub trait Driver: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// Open a fresh session
    async fn open(&self) -> DatabaseResult<Box<dyn DatabaseConnection>>;

    /// Whether the target only exists while at least one session stays open
    fn requires_anchor(&self) -> bool {
        false
    }

    /// Target description for logs, without credentials
    fn describe(&self) -> String;
}

/// Build the driver for `config`, failing when its backend feature is disabled.
pub fn create_driver(config: &DatabaseConfig) -> DatabaseResult<Arc<dyn Driver>> {
    let driver = match config.db_type {
        DatabaseType::Postgres => {
            #[cfg(feature = "postgres")]
            {
                Arc::new(postgres::PostgresDriver::new(config)?) as Arc<dyn Driver>
            }
            #[cfg(not(feature = "postgres"))]
            {
                return Err(DatabaseError::Configuration(
                    "PostgreSQL support is not enabled. Enable the 'postgres' feature.".to_string(),
                ));
            }
        }
        DatabaseType::MySql => {
            #[cfg(feature = "mysql")]
            {
                Arc::new(mysql::MySqlDriver::new(config)?) as Arc<dyn Driver>
            }
            #[cfg(not(feature = "mysql"))]
            {
                return Err(DatabaseError::Configuration(
                    "MySQL support is not enabled. Enable the 'mysql' feature.".to_string(),
                ));
            }
        }
        DatabaseType::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                Arc::new(sqlite::SqliteDriver::new(config)?) as Arc<dyn Driver>
            }
            #[cfg(not(feature = "sqlite"))]
            {
                return Err(DatabaseError::Configuration(
                    "SQLite support is not enabled. Enable the 'sqlite' feature.".to_string(),
                ));
            }
        }
    };

    Ok(driver)
}

/// Map a sqlx error into the driver taxonomy. Execution failures keep the
/// backend's code in the message so translators can classify them.
#[cfg(feature = "database")]
pub(crate) fn from_sqlx(err: sqlx::Error) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => DatabaseError::Query(format!("error {}: {}", code, db_err.message())),
            None => DatabaseError::Query(db_err.message().to_string()),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DatabaseError::Connection(err.to_string()),
        sqlx::Error::Configuration(_) => DatabaseError::Configuration(err.to_string()),
        _ => DatabaseError::Query(err.to_string()),
    }
}

/// Append `extra_params` to a connection URL as a query string
#[cfg(feature = "database")]
fn append_extra_params(connection_string: &mut String, extra_params: &HashMap<String, String>) {
    // Sorted so the URL is stable across runs
    let mut params: Vec<_> = extra_params.iter().collect();
    params.sort();
    for (key, value) in params {
        if connection_string.contains('?') {
            connection_string.push('&');
        } else {
            connection_string.push('?');
        }
        connection_string.push_str(&format!("{}={}", key, value));
    }
}

// Implementation modules for specific database types
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresConnection, PostgresDriver};

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "mysql")]
pub use mysql::{MySqlConnection, MySqlDriver};

#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteDriver};

#[cfg(test)]
mod tests;

/// Constructors for common connection configurations
pub mod extensions {
    use super::{DatabaseConfig, DatabaseType};

    /// Create a PostgreSQL connection configuration
    pub fn postgres_config(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> DatabaseConfig {
        let mut config = DatabaseConfig {
            db_type: DatabaseType::Postgres,
            host: Some(host.into()),
            port: Some(port),
            database: database.into(),
            username: Some(username.into()),
            password: Some(password.into()),
            ssl_mode: Some("prefer".to_string()),
            ..Default::default()
        };

        config
            .extra_params
            .insert("application_name".to_string(), "aiodb".to_string());

        config
    }

    /// Create a MySQL connection configuration
    pub fn mysql_config(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> DatabaseConfig {
        let mut config = DatabaseConfig {
            db_type: DatabaseType::MySql,
            host: Some(host.into()),
            port: Some(port),
            database: database.into(),
            username: Some(username.into()),
            password: Some(password.into()),
            ..Default::default()
        };

        config
            .extra_params
            .insert("charset".to_string(), "utf8mb4".to_string());

        config
    }

    /// Create a SQLite connection configuration
    pub fn sqlite_config(database_path: impl Into<String>) -> DatabaseConfig {
        DatabaseConfig {
            db_type: DatabaseType::Sqlite,
            database: database_path.into(),
            ..Default::default()
        }
    }
}
