//! Scoped single-session wrapper over a driver handle.
//!
//! An [`AioConnection`] is fully open until [`AioConnection::release`] runs or
//! it is dropped. Either path returns its lease on the owner's
//! [`HandleCounter`], so a cancelled or failed scope never leaks a handle.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::AdapterOptions;
use crate::database::{
    DatabaseConnection, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType, DatabaseValue,
    Driver, StatementOutcome,
};
use crate::translator::ErrorTranslator;

/// Counts driver handles that are currently open
#[derive(Debug, Clone, Default)]
pub struct HandleCounter {
    open: Arc<AtomicUsize>,
}

impl HandleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles opened and not yet released
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Count one more open handle until the lease is dropped
    pub fn lease(&self) -> HandleLease {
        self.open.fetch_add(1, Ordering::SeqCst);
        HandleLease {
            open: Arc::clone(&self.open),
        }
    }
}

/// One unit of [`HandleCounter`], returned on drop
#[derive(Debug)]
pub struct HandleLease {
    open: Arc<AtomicUsize>,
}

impl Drop for HandleLease {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Materialised result of one statement
pub struct Cursor {
    rows: VecDeque<Box<dyn DatabaseRow>>,
    rowcount: u64,
    last_insert_id: Option<i64>,
}

impl Cursor {
    fn from_outcome(outcome: StatementOutcome) -> Self {
        Self {
            rowcount: outcome.rowcount(),
            rows: outcome.rows.into(),
            last_insert_id: outcome.last_insert_id,
        }
    }

    /// Take every row not yet fetched
    pub fn fetchall(&mut self) -> Vec<Box<dyn DatabaseRow>> {
        self.rows.drain(..).collect()
    }

    /// Take the next row
    pub fn fetchone(&mut self) -> Option<Box<dyn DatabaseRow>> {
        self.rows.pop_front()
    }

    /// Rows returned by a query, or rows affected by any other statement
    pub fn rowcount(&self) -> u64 {
        self.rowcount
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Rows still waiting to be fetched
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("remaining", &self.rows.len())
            .field("rowcount", &self.rowcount)
            .field("last_insert_id", &self.last_insert_id)
            .finish()
    }
}

/// The name the compiler-facing code executes statements through.
///
/// Implemented by [`AioConnection`] (runs on the held session) and by
/// [`crate::AioDatabase`] (opens a scope per call).
#[async_trait]
pub trait SqlExecutor: Send {
    async fn execute_sql(&mut self, sql: &str, params: &[DatabaseValue]) -> crate::Result<Cursor>;
}

/// One live database session
pub struct AioConnection {
    handle: Option<Box<dyn DatabaseConnection>>,
    db_type: DatabaseType,
    options: AdapterOptions,
    translator: Arc<dyn ErrorTranslator>,
    in_transaction: bool,
    lease: Option<HandleLease>,
}

impl AioConnection {
    /// Open a session from `driver`. The lease is only taken once the handle
    /// exists, so a failed open leaves the counter untouched.
    pub async fn open(
        driver: &dyn Driver,
        options: AdapterOptions,
        translator: Arc<dyn ErrorTranslator>,
        counter: &HandleCounter,
    ) -> DatabaseResult<Self> {
        let db_type = driver.database_type();
        let handle = driver
            .open()
            .await
            .map_err(|e| translator.translate(db_type, e))?;

        debug!(target_db = %driver.describe(), "Opened connection");

        Ok(Self {
            handle: Some(handle),
            db_type,
            options,
            translator,
            in_transaction: false,
            lease: Some(counter.lease()),
        })
    }

    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn options(&self) -> AdapterOptions {
        self.options
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn translate(&self, err: DatabaseError) -> DatabaseError {
        self.translator.translate(self.db_type, err)
    }

    /// Submit one statement and materialise its result
    pub async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Cursor> {
        if self.handle.is_none() {
            return Err(DatabaseError::NotConnected);
        }

        if !self.options.autocommit && !self.in_transaction {
            self.begin().await?;
        }

        debug!(sql = %sql, params = params.len(), "Executing statement");

        let handle = self.handle.as_mut().ok_or(DatabaseError::NotConnected)?;
        let result = handle.execute(sql, params).await.map(Cursor::from_outcome);

        match result {
            Ok(cursor) => Ok(cursor),
            Err(err) => Err(self.fail(err).await),
        }
    }

    /// Run a script of `;`-separated statements as unprepared SQL.
    /// Follows the same transaction policy as [`AioConnection::execute`].
    pub async fn execute_script(&mut self, script: &str) -> DatabaseResult<()> {
        if self.handle.is_none() {
            return Err(DatabaseError::NotConnected);
        }

        if !self.options.autocommit && !self.in_transaction {
            self.begin().await?;
        }

        debug!(bytes = script.len(), "Executing script");

        let handle = self.handle.as_mut().ok_or(DatabaseError::NotConnected)?;
        let result = handle.execute_batch(script).await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(self.fail(err).await),
        }
    }

    /// Translate a statement failure, rolling back first under autorollback
    async fn fail(&mut self, err: DatabaseError) -> DatabaseError {
        let err = self.translate(err);
        if self.in_transaction && self.options.autorollback {
            warn!(error = %err, "Statement failed, rolling back open transaction");
            if let Err(rollback_err) = self.rollback().await {
                warn!(error = %rollback_err, "Automatic rollback failed");
            }
        }
        err
    }

    async fn control(&mut self, statement: &str) -> DatabaseResult<()> {
        let handle = self.handle.as_mut().ok_or(DatabaseError::NotConnected)?;
        let result = handle.execute_batch(statement).await;
        result.map(|_| ()).map_err(|e| self.translate(e))
    }

    /// Open an explicit transaction
    pub async fn begin(&mut self) -> DatabaseResult<()> {
        if self.in_transaction {
            return Err(DatabaseError::Transaction(
                "a transaction is already open on this connection".to_string(),
            ));
        }
        self.control("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit the open transaction. A no-op when none is open.
    pub async fn commit(&mut self) -> DatabaseResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.control("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back the open transaction. A no-op when none is open.
    pub async fn rollback(&mut self) -> DatabaseResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        // The session leaves the transaction even if ROLLBACK reports an error
        self.in_transaction = false;
        self.control("ROLLBACK").await
    }

    pub async fn ping(&mut self) -> DatabaseResult<()> {
        let handle = self.handle.as_mut().ok_or(DatabaseError::NotConnected)?;
        let result = handle.ping().await;
        result.map_err(|e| self.translate(e))
    }

    /// Close the session. Idempotent; an open transaction is rolled back first.
    pub async fn release(&mut self) -> DatabaseResult<()> {
        if self.handle.is_none() {
            return Ok(());
        }

        if self.in_transaction {
            warn!("Releasing connection with an open transaction, rolling back");
            if let Err(e) = self.rollback().await {
                warn!(error = %e, "Rollback on release failed");
            }
        }

        let result = match self.handle.take() {
            Some(handle) => handle.close().await.map_err(|e| self.translate(e)),
            None => Ok(()),
        };
        self.lease.take();

        match &result {
            Ok(()) => debug!("Released connection"),
            Err(e) => warn!(error = %e, "Connection close reported an error"),
        }
        result
    }
}

impl Drop for AioConnection {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!(
                in_transaction = self.in_transaction,
                "Connection dropped without release, driver closes the handle"
            );
        }
    }
}

impl fmt::Debug for AioConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AioConnection")
            .field("db_type", &self.db_type)
            .field("open", &self.is_open())
            .field("in_transaction", &self.in_transaction)
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl SqlExecutor for AioConnection {
    async fn execute_sql(&mut self, sql: &str, params: &[DatabaseValue]) -> crate::Result<Cursor> {
        Ok(self.execute(sql, params).await?)
    }
}
