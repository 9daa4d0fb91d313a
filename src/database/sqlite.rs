use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions};
use sqlx::{ConnectOptions, Connection, Either, Executor, Row, Sqlite, Statement};
use std::path::Path;
use std::str::FromStr;

use crate::database::{
    append_extra_params, from_sqlx, sqlite_target, DatabaseConfig, DatabaseConnection,
    DatabaseError, DatabaseResult, DatabaseRow, DatabaseType, DatabaseValue, Driver,
    StatementOutcome,
};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Opens single SQLite sessions for one database file (or in-memory database)
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    options: SqliteConnectOptions,
    database: String,
    in_memory: bool,
}

impl SqliteDriver {
    /// Create a driver from a configuration. In-memory targets get a shared
    /// cache name here, so every session opened from this driver sees the same
    /// database.
    pub fn new(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let database_url = build_sqlite_connection_string(config)?;
        let in_memory = config.is_in_memory();

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?
            .create_if_missing(!in_memory)
            .foreign_keys(true);

        Ok(Self {
            options,
            database: config.database.clone(),
            in_memory,
        })
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    async fn open(&self) -> DatabaseResult<Box<dyn DatabaseConnection>> {
        // Ensure the directory exists if file-based
        if !self.in_memory && !self.database.starts_with("file:") {
            if let Some(parent) = Path::new(&self.database).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        DatabaseError::Connection(format!(
                            "Failed to create directory for SQLite database: {}",
                            e
                        ))
                    })?;
                }
            }
        }

        let conn = self
            .options
            .connect()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Ok(Box::new(SqliteConnection { conn }))
    }

    fn requires_anchor(&self) -> bool {
        self.in_memory
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.database)
    }
}

/// Convert a DatabaseConfig to a SQLite connection string
fn build_sqlite_connection_string(config: &DatabaseConfig) -> DatabaseResult<String> {
    let database = config.database.trim();
    if database.is_empty() {
        return Err(DatabaseError::Configuration(
            "SQLite database path must not be empty".to_string(),
        ));
    }

    // Every spelling of an anonymous in-memory database maps to `sqlite::memory:`,
    // which sqlx turns into a uniquely named shared-cache database
    let (path, query) = sqlite_target(database);
    let mut connection_string = match (path, query) {
        (":memory:", "") => "sqlite::memory:".to_string(),
        (":memory:", query) => format!("sqlite::memory:?{}", query),
        _ => format!("sqlite:{}", database),
    };

    append_extra_params(&mut connection_string, &config.extra_params);

    Ok(connection_string)
}

fn bind_params<'q>(
    mut query_builder: SqliteQuery<'q>,
    params: &[DatabaseValue],
) -> SqliteQuery<'q> {
    for param in params {
        query_builder = match param {
            DatabaseValue::Null => query_builder.bind(None::<String>),
            DatabaseValue::Boolean(b) => query_builder.bind(*b),
            DatabaseValue::Integer(i) => query_builder.bind(*i),
            DatabaseValue::Float(f) => query_builder.bind(*f),
            DatabaseValue::Text(s) => query_builder.bind(s.clone()),
            DatabaseValue::Blob(b) => query_builder.bind(b.clone()),
        };
    }
    query_builder
}

/// One SQLite session
pub struct SqliteConnection {
    conn: sqlx::SqliteConnection,
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    async fn execute(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<StatementOutcome> {
        let returns_rows = {
            let statement = (&mut self.conn).prepare(query).await.map_err(from_sqlx)?;
            !statement.columns().is_empty()
        };

        let mut outcome = StatementOutcome {
            returns_rows,
            ..Default::default()
        };
        let mut results = (&mut self.conn).fetch_many(bind_params(sqlx::query(query), params));
        while let Some(step) = results.try_next().await.map_err(from_sqlx)? {
            match step {
                Either::Left(done) => {
                    outcome.rows_affected += done.rows_affected();
                    // sqlite3_changes() is connection-wide; only trust it for statements without rows
                    if !returns_rows && done.rows_affected() > 0 {
                        outcome.last_insert_id = Some(done.last_insert_rowid());
                    }
                }
                Either::Right(row) => outcome.rows.push(Box::new(SqliteRow { row })),
            }
        }
        Ok(outcome)
    }

    async fn execute_batch(&mut self, sql: &str) -> DatabaseResult<u64> {
        let result = (&mut self.conn)
            .execute(sqlx::raw_sql(sql))
            .await
            .map_err(from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn ping(&mut self) -> DatabaseResult<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to ping database: {}", e)))
    }

    async fn close(self: Box<Self>) -> DatabaseResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close database: {}", e)))
    }
}

/// SQLite implementation of the database row interface
pub struct SqliteRow {
    row: sqlx::sqlite::SqliteRow,
}

impl DatabaseRow for SqliteRow {
    fn get_string(&self, column: &str) -> DatabaseResult<String> {
        self.row.try_get(column).map_err(|e| {
            DatabaseError::Query(format!("Failed to get string column {}: {}", column, e))
        })
    }

    fn get_i64(&self, column: &str) -> DatabaseResult<i64> {
        self.row.try_get(column).map_err(|e| {
            DatabaseError::Query(format!("Failed to get i64 column {}: {}", column, e))
        })
    }

    fn try_get_string(&self, column: &str) -> DatabaseResult<Option<String>> {
        match self.row.try_get::<Option<String>, _>(column) {
            Ok(value) => Ok(value),
            Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!(
                "Failed to get string column {}: {}",
                column, e
            ))),
        }
    }

    fn try_get_i64(&self, column: &str) -> DatabaseResult<Option<i64>> {
        match self.row.try_get::<Option<i64>, _>(column) {
            Ok(value) => Ok(value),
            Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!(
                "Failed to get i64 column {}: {}",
                column, e
            ))),
        }
    }
}
