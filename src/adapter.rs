//! The async database adapter: one per database target.
//!
//! [`AioDatabase`] moves through `Unconfigured -> Connected -> Closed`. Every
//! operation opens its own [`AioConnection`] scope, so nothing is pooled and
//! nothing is shared between concurrent callers except immutable settings.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::compiler::{ColumnDescriptor, CompiledStatement, ModelDescriptor};
use crate::config::{AdapterOptions, Settings};
use crate::connection::{AioConnection, Cursor, HandleCounter, SqlExecutor};
use crate::database::{
    create_driver, DatabaseConfig, DatabaseConnection, DatabaseError, DatabaseRow, DatabaseType,
    DatabaseValue, Driver,
};
use crate::dialect::Dialect;
use crate::metadata::{self, ColumnMetadata, ForeignKeyMetadata, IndexMetadata};
use crate::schema::{drop_order, sort_models_topologically};
use crate::translator::{DefaultErrorTranslator, ErrorTranslator};
use crate::{Error, Result};

/// A column named in a [`AioDatabase::create_index`] call
#[derive(Debug, Clone, PartialEq)]
pub enum IndexField {
    Name(String),
    Column(ColumnDescriptor),
}

impl IndexField {
    pub fn name(&self) -> &str {
        match self {
            IndexField::Name(name) => name,
            IndexField::Column(column) => &column.name,
        }
    }
}

impl From<&str> for IndexField {
    fn from(name: &str) -> Self {
        IndexField::Name(name.to_string())
    }
}

impl From<String> for IndexField {
    fn from(name: String) -> Self {
        IndexField::Name(name)
    }
}

impl From<ColumnDescriptor> for IndexField {
    fn from(column: ColumnDescriptor) -> Self {
        IndexField::Column(column)
    }
}

impl From<&ColumnDescriptor> for IndexField {
    fn from(column: &ColumnDescriptor) -> Self {
        IndexField::Column(column.clone())
    }
}

/// A connected target
struct Target {
    driver: Arc<dyn Driver>,
    /// Keeps in-memory databases alive between scopes
    anchor: Option<Box<dyn DatabaseConnection>>,
}

enum State {
    Unconfigured,
    Connected(Target),
    Closed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Unconfigured => "unconfigured",
            State::Connected(_) => "connected",
            State::Closed => "closed",
        }
    }
}

/// Async adapter over one database target
pub struct AioDatabase {
    dialect: Dialect,
    options: AdapterOptions,
    translator: Arc<dyn ErrorTranslator>,
    counter: HandleCounter,
    state: Mutex<State>,
}

impl AioDatabase {
    /// Create an unconnected adapter for a dialect (or a database type)
    pub fn new(dialect: impl Into<Dialect>) -> Self {
        Self {
            dialect: dialect.into(),
            options: AdapterOptions::default(),
            translator: Arc::new(DefaultErrorTranslator),
            counter: HandleCounter::new(),
            state: Mutex::new(State::Unconfigured),
        }
    }

    /// Set the transaction policy copied into every connection
    pub fn with_options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn ErrorTranslator>) -> Self {
        self.translator = translator;
        self
    }

    /// Build an adapter from settings and connect it
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let db = Self::new(settings.database.db_type).with_options(settings.adapter);
        db.connect(settings.database.clone()).await?;
        Ok(db)
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn database_type(&self) -> DatabaseType {
        self.dialect.database_type()
    }

    pub fn options(&self) -> AdapterOptions {
        self.options
    }

    /// Scope connections currently open
    pub fn open_handles(&self) -> usize {
        self.counter.open_handles()
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, State::Connected(_))
    }

    /// Bind the adapter to a target. Fails when already connected;
    /// connecting again after [`AioDatabase::close`] is allowed.
    pub async fn connect(&self, config: DatabaseConfig) -> Result<()> {
        if config.db_type != self.database_type() {
            return Err(DatabaseError::Configuration(format!(
                "cannot connect a {} adapter to a {} database",
                self.database_type(),
                config.db_type
            ))
            .into());
        }

        if self.is_connected().await {
            return Err(already_connected());
        }

        // The anchor is opened without holding the state lock
        let driver = create_driver(&config)?;
        let anchor = if driver.requires_anchor() {
            let handle = driver
                .open()
                .await
                .map_err(|e| self.translator.translate(config.db_type, e))?;
            Some(handle)
        } else {
            None
        };

        let mut state = self.state.lock().await;
        if matches!(*state, State::Connected(_)) {
            drop(state);
            if let Some(anchor) = anchor {
                if let Err(e) = anchor.close().await {
                    warn!(error = %e, "Closing unused anchor connection failed");
                }
            }
            return Err(already_connected());
        }

        info!(
            db_type = %config.db_type,
            target_db = %driver.describe(),
            anchored = anchor.is_some(),
            previous = state.name(),
            "Database connected"
        );
        *state = State::Connected(Target { driver, anchor });
        Ok(())
    }

    /// Unbind the adapter. A no-op when not connected.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !matches!(*state, State::Connected(_)) {
            debug!(state = state.name(), "Close on unconnected adapter ignored");
            return Ok(());
        }

        let State::Connected(target) = std::mem::replace(&mut *state, State::Closed) else {
            return Ok(());
        };
        drop(state);

        if self.counter.open_handles() > 0 {
            warn!(
                open_handles = self.counter.open_handles(),
                "Closing adapter while scope connections are still open"
            );
        }

        let db_type = self.database_type();
        if let Some(anchor) = target.anchor {
            anchor
                .close()
                .await
                .map_err(|e| self.translator.translate(db_type, e))?;
        }

        info!(target_db = %target.driver.describe(), "Database closed");
        Ok(())
    }

    async fn driver(&self) -> Result<Arc<dyn Driver>> {
        match &*self.state.lock().await {
            State::Connected(target) => Ok(Arc::clone(&target.driver)),
            _ => Err(DatabaseError::NotConnected.into()),
        }
    }

    /// Open a fresh connection scope. The caller owns it and should
    /// [`AioConnection::release`] it; dropping it also closes the handle.
    pub async fn connection(&self) -> Result<AioConnection> {
        let driver = self.driver().await?;
        let conn = AioConnection::open(
            &*driver,
            self.options,
            Arc::clone(&self.translator),
            &self.counter,
        )
        .await?;
        Ok(conn)
    }

    /// Run `f` inside a connection scope. On success an open transaction is
    /// committed, on failure it is rolled back; the connection is released
    /// either way.
    pub async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut AioConnection) -> BoxFuture<'c, Result<T>>,
    {
        let mut conn = self.connection().await?;
        let result = f(&mut conn).await;
        finish_scope(conn, result).await
    }

    async fn run(&self, sql: &str, params: &[DatabaseValue]) -> Result<Cursor> {
        let mut conn = self.connection().await?;
        let result = conn.execute(sql, params).await.map_err(Error::from);
        finish_scope(conn, result).await
    }

    async fn run_statement(&self, statement: &CompiledStatement) -> Result<Cursor> {
        self.run(&statement.sql, &statement.params).await
    }

    /// Execute one statement in its own scope
    pub async fn execute_sql(&self, sql: &str, params: &[DatabaseValue]) -> Result<Cursor> {
        self.run(sql, params).await
    }

    /// Execute a `;`-separated script in one scope
    pub async fn execute_script(&self, script: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let result = conn.execute_script(script).await.map_err(Error::from);
        finish_scope(conn, result).await
    }

    /// Create every model's table and declared indexes, parents first.
    ///
    /// All DDL is compiled before anything runs, so a dependency cycle or a
    /// compile error leaves the database untouched. With `fail_silently`, a
    /// table that already exists is skipped together with its indexes.
    pub async fn create_tables(&self, models: &[ModelDescriptor], fail_silently: bool) -> Result<()> {
        let compiler = self.dialect.compiler();
        let mut plan = Vec::with_capacity(models.len());
        for model in sort_models_topologically(models)? {
            let create = compiler.compile_create_table(model, false)?;
            let indexes = model
                .indexes
                .iter()
                .map(|index| compiler.compile_index(model, index))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            plan.push((model, create, indexes));
        }

        let mut created = 0usize;
        for (model, create, indexes) in plan {
            match self.run_statement(&create).await {
                Ok(_) => {}
                Err(err) if fail_silently && err.is_already_exists() => {
                    info!(table = %model.name, "Table already exists, skipping");
                    continue;
                }
                Err(err) => return Err(err),
            }
            for index in &indexes {
                self.run_statement(index).await?;
            }
            created += 1;
        }

        info!(requested = models.len(), created, "Created tables");
        Ok(())
    }

    /// Create one table; `safe` adds `IF NOT EXISTS`
    pub async fn create_table(&self, model: &ModelDescriptor, safe: bool) -> Result<Cursor> {
        let statement = self.dialect.compiler().compile_create_table(model, safe)?;
        let cursor = self.run_statement(&statement).await?;
        debug!(table = %model.name, safe, "Created table");
        Ok(cursor)
    }

    /// Create an index over `fields` of `model`. Fields must be non-empty,
    /// distinct and belong to the model; otherwise nothing is executed.
    pub async fn create_index(
        &self,
        model: &ModelDescriptor,
        fields: &[IndexField],
        unique: bool,
    ) -> Result<Cursor> {
        let columns = resolve_index_fields(model, fields)?;
        let statement = self
            .dialect
            .compiler()
            .compile_create_index(model, &columns, unique)?;
        self.run_statement(&statement).await
    }

    /// Drop one table; `safe` adds `IF EXISTS`
    pub async fn drop_table(&self, model: &ModelDescriptor, safe: bool) -> Result<Cursor> {
        let statement = self.dialect.compiler().compile_drop_table(model, safe)?;
        let cursor = self.run_statement(&statement).await?;
        debug!(table = %model.name, safe, "Dropped table");
        Ok(cursor)
    }

    /// Drop tables, dependents before the tables they reference
    pub async fn drop_tables(&self, models: &[ModelDescriptor], safe: bool) -> Result<()> {
        let compiler = self.dialect.compiler();
        let statements = drop_order(models)?
            .into_iter()
            .map(|model| compiler.compile_drop_table(model, safe))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for statement in &statements {
            self.run_statement(statement).await?;
        }
        info!(tables = statements.len(), "Dropped tables");
        Ok(())
    }

    async fn catalog_rows(&self, statement: CompiledStatement) -> Result<Vec<Box<dyn DatabaseRow>>> {
        let mut cursor = self.run_statement(&statement).await?;
        Ok(cursor.fetchall())
    }

    /// Table names in the schema (the connection's default when `None`)
    pub async fn get_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        let rows = self
            .catalog_rows(self.dialect.catalog().tables_query(schema))
            .await?;
        Ok(metadata::table_names(&rows)?)
    }

    pub async fn table_exists(&self, table: &str, schema: Option<&str>) -> Result<bool> {
        require_table(table)?;
        Ok(self.get_tables(schema).await?.iter().any(|t| t == table))
    }

    /// One record per index, key columns in index order
    pub async fn get_indexes(&self, table: &str, schema: Option<&str>) -> Result<Vec<IndexMetadata>> {
        require_table(table)?;
        let rows = self
            .catalog_rows(self.dialect.catalog().indexes_query(table, schema))
            .await?;
        Ok(metadata::indexes_from_rows(table, &rows)?)
    }

    pub async fn get_columns(&self, table: &str, schema: Option<&str>) -> Result<Vec<ColumnMetadata>> {
        require_table(table)?;
        let rows = self
            .catalog_rows(self.dialect.catalog().columns_query(table, schema))
            .await?;
        Ok(metadata::columns_from_rows(table, &rows)?)
    }

    /// Primary-key column names in key order
    pub async fn get_primary_keys(&self, table: &str, schema: Option<&str>) -> Result<Vec<String>> {
        require_table(table)?;
        let rows = self
            .catalog_rows(self.dialect.catalog().primary_keys_query(table, schema))
            .await?;
        Ok(metadata::primary_keys_from_rows(&rows)?)
    }

    pub async fn get_foreign_keys(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Vec<ForeignKeyMetadata>> {
        require_table(table)?;
        let rows = self
            .catalog_rows(self.dialect.catalog().foreign_keys_query(table, schema))
            .await?;
        Ok(metadata::foreign_keys_from_rows(table, &rows)?)
    }
}

impl fmt::Debug for AioDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AioDatabase")
            .field("dialect", &self.dialect)
            .field("options", &self.options)
            .field("translator", &self.translator)
            .field("open_handles", &self.counter.open_handles())
            .finish()
    }
}

#[async_trait]
impl SqlExecutor for AioDatabase {
    async fn execute_sql(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<Cursor> {
        self.run(sql, params).await
    }
}

/// Commit or roll back, then release. The scope's own error wins over
/// errors raised while finishing it.
async fn finish_scope<T>(mut conn: AioConnection, result: Result<T>) -> Result<T> {
    let finished = match &result {
        Ok(_) => conn.commit().await,
        Err(_) => conn.rollback().await,
    };
    let released = conn.release().await;

    let value = result?;
    finished?;
    released?;
    Ok(value)
}

fn already_connected() -> Error {
    DatabaseError::Configuration("adapter is already connected".to_string()).into()
}

fn require_table(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(Error::InvalidArgument("table name must not be empty".to_string()));
    }
    Ok(())
}

fn resolve_index_fields<'m>(
    model: &'m ModelDescriptor,
    fields: &[IndexField],
) -> Result<Vec<&'m ColumnDescriptor>> {
    if fields.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "index on '{}' needs at least one field",
            model.name
        )));
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(fields.len());
    for field in fields {
        let name = field.name();
        let column = model.column(name).ok_or_else(|| {
            Error::InvalidArgument(format!("'{}' is not a field of '{}'", name, model.name))
        })?;
        if !seen.insert(name) {
            return Err(Error::InvalidArgument(format!(
                "field '{}' is listed twice in index on '{}'",
                name, model.name
            )));
        }
        columns.push(column);
    }
    Ok(columns)
}
