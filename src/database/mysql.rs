use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions};
use sqlx::{ConnectOptions, Connection, Either, Executor, MySql, Row, Statement};
use std::str::FromStr;

use crate::database::{
    append_extra_params, from_sqlx, DatabaseConfig, DatabaseConnection, DatabaseError,
    DatabaseResult, DatabaseRow, DatabaseType, DatabaseValue, Driver, StatementOutcome,
};

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Opens single MySQL sessions against one server/database
#[derive(Debug, Clone)]
pub struct MySqlDriver {
    options: MySqlConnectOptions,
    target: String,
}

impl MySqlDriver {
    pub fn new(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let database_url = build_mysql_connection_string(config)?;
        let options = MySqlConnectOptions::from_str(&database_url)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?;

        Ok(Self {
            options,
            target: format!(
                "mysql://{}:{}/{}",
                config.host.as_deref().unwrap_or("localhost"),
                config.port.unwrap_or(3306),
                config.database
            ),
        })
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    async fn open(&self) -> DatabaseResult<Box<dyn DatabaseConnection>> {
        let conn = self
            .options
            .connect()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Ok(Box::new(MySqlConnection { conn }))
    }

    fn describe(&self) -> String {
        self.target.clone()
    }
}

/// Convert a DatabaseConfig to a MySQL connection string
fn build_mysql_connection_string(config: &DatabaseConfig) -> DatabaseResult<String> {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port.unwrap_or(3306);
    let database = &config.database;

    let mut connection_string = "mysql://".to_string();

    if let Some(username) = &config.username {
        connection_string.push_str(username);

        if let Some(password) = &config.password {
            connection_string.push_str(&format!(":{}", password));
        }

        connection_string.push('@');
    }

    connection_string.push_str(&format!("{}:{}/{}", host, port, database));

    append_extra_params(&mut connection_string, &config.extra_params);

    Ok(connection_string)
}

fn bind_params<'q>(mut query_builder: MySqlQuery<'q>, params: &[DatabaseValue]) -> MySqlQuery<'q> {
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

/// One MySQL session
pub struct MySqlConnection {
    conn: sqlx::MySqlConnection,
}

#[async_trait]
impl DatabaseConnection for MySqlConnection {
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
                    if let Ok(id @ 1..) = i64::try_from(done.last_insert_id()) {
                        outcome.last_insert_id = Some(id);
                    }
                }
                Either::Right(row) => outcome.rows.push(Box::new(MySqlRow { row })),
            }
        }
        Ok(outcome)
    }

    async fn execute_batch(&mut self, sql: &str) -> DatabaseResult<u64> {
        let result = sqlx::raw_sql(sql)
            .execute(&mut self.conn)
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

/// MySQL implementation of the database row interface
pub struct MySqlRow {
    row: sqlx::mysql::MySqlRow,
}

impl DatabaseRow for MySqlRow {
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
