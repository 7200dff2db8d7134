//! Transaction Support for txscope Database Operations
//!
//! Provides [`SqlxTransaction`] - a transaction handle that owns one pooled
//! connection for its whole life, plus savepoint handles for manual nesting.

use crate::codec::{self, decode_row};
use crate::dialect::Dialect;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{Stream, TryStreamExt};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Executor as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use txscope_core::{
    Args, Batch, BatchResults, CommandTag, CopySource, DbError, DbResult, Identifier, QueryOutput,
    QueryRunner, Row, Rows, Scope, SingleRow, Transaction, TxOptions,
};

// ============== OpenTx ==============

/// A pooled connection with a transaction in progress.
///
/// Dropped while still open, the connection is detached from the pool and
/// closed, so the server discards the transaction and the pool never hands
/// out a connection mid-transaction.
pub(crate) struct OpenTx {
    conn: Option<PoolConnection<Any>>,
}

impl OpenTx {
    /// Acquire a connection and run the dialect's begin statements on it.
    pub(crate) async fn begin(pool: &AnyPool, dialect: Dialect, options: &TxOptions) -> DbResult<Self> {
        let conn = pool.acquire().await.map_err(DbError::transaction_open)?;
        let mut tx = Self { conn: Some(conn) };
        for statement in dialect.begin_statements(options) {
            tx.conn()?
                .execute(statement.as_str())
                .await
                .map_err(DbError::transaction_open)?;
        }
        Ok(tx)
    }

    pub(crate) fn conn(&mut self) -> DbResult<&mut AnyConnection> {
        self.conn.as_deref_mut().ok_or(DbError::TxClosed)
    }

    pub(crate) async fn commit(&mut self) -> DbResult<()> {
        self.finish("COMMIT")
            .await
            .map_err(|e| e.into_db(DbError::commit))
    }

    pub(crate) async fn rollback(&mut self) -> DbResult<()> {
        self.finish("ROLLBACK")
            .await
            .map_err(|e| e.into_db(DbError::rollback))
    }

    async fn finish(&mut self, statement: &str) -> Result<(), FinishError> {
        let result = self
            .conn()
            .map_err(FinishError::Closed)?
            .execute(statement)
            .await;
        match (result, self.conn.take()) {
            // Returned to the pool on drop.
            (Ok(_), Some(_conn)) => Ok(()),
            (Err(e), Some(conn)) => {
                drop(conn.detach());
                Err(FinishError::Driver(e))
            }
            (_, None) => Err(FinishError::Closed(DbError::TxClosed)),
        }
    }
}

/// Commit/rollback failure before it is mapped to the matching [`DbError`].
enum FinishError {
    Closed(DbError),
    Driver(sqlx::Error),
}

impl FinishError {
    fn into_db(self, wrap: fn(sqlx::Error) -> DbError) -> DbError {
        match self {
            FinishError::Closed(e) => e,
            FinishError::Driver(e) => wrap(e),
        }
    }
}

impl Drop for OpenTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!(
                txscope.tx = "dropped",
                "Transaction dropped while open, closing its connection"
            );
            drop(conn.detach());
        }
    }
}

// ============== SqlxTransaction ==============

struct Shared {
    tx: Mutex<OpenTx>,
    dialect: Dialect,
    savepoints: AtomicUsize,
}

/// Transaction handle over the sqlx `Any` driver.
///
/// Statements take the connection with `try_lock`: issuing a statement while
/// a row cursor of the same transaction is still open fails with
/// [`DbError::ConnBusy`] instead of deadlocking.
///
/// `begin` on a transaction opens a savepoint handle that shares the
/// connection. Committing the handle releases the savepoint; rolling it back
/// undoes everything since the savepoint.
pub struct SqlxTransaction {
    shared: Arc<Shared>,
    savepoint: Option<String>,
    closed: AtomicBool,
}

impl SqlxTransaction {
    pub(crate) fn new(tx: OpenTx, dialect: Dialect) -> Self {
        Self {
            shared: Arc::new(Shared {
                tx: Mutex::new(tx),
                dialect,
                savepoints: AtomicUsize::new(0),
            }),
            savepoint: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Savepoint name when this handle is a savepoint.
    pub fn savepoint_name(&self) -> Option<&str> {
        self.savepoint.as_deref()
    }

    /// Whether this handle can still run statements.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DbError::TxClosed)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> DbResult<tokio::sync::MutexGuard<'_, OpenTx>> {
        self.ensure_open()?;
        self.shared.tx.try_lock().map_err(|_| DbError::ConnBusy)
    }

    async fn finish_savepoint(&self, name: &str, statements: &[String]) -> Result<(), FinishError> {
        let mut tx = self.lock().map_err(FinishError::Closed)?;
        self.closed.store(true, Ordering::SeqCst);
        let conn = tx.conn().map_err(FinishError::Closed)?;
        for statement in statements {
            conn.execute(statement.as_str())
                .await
                .map_err(FinishError::Driver)?;
        }
        tracing::debug!(txscope.tx = "savepoint", savepoint = name, "Savepoint finished");
        Ok(())
    }

    async fn fetch_optional(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<Option<Row>> {
        let mut tx = self.lock()?;
        let conn = tx.conn()?;
        scope.run(codec::query_row_on(conn, sql, args)).await
    }

    async fn run_batch(&self, scope: &Scope, batch: Batch) -> DbResult<Vec<DbResult<QueryOutput>>> {
        let mut tx = self.lock()?;
        let conn = tx.conn()?;
        scope
            .run(async { Ok(codec::batch_on(conn, batch.into_queries()).await) })
            .await
    }
}

/// Row cursor that keeps the transaction's connection locked until it is
/// drained or dropped.
fn cursor(
    shared: Arc<Shared>,
    sql: String,
    args: Args,
) -> impl Stream<Item = DbResult<Row>> + Send + 'static {
    try_stream! {
        let mut tx = shared.tx.try_lock().map_err(|_| DbError::ConnBusy)?;
        let conn = tx.conn()?;
        let mut results = codec::bind(&sql, args).fetch(conn);
        let mut columns = None;
        while let Some(row) = results.try_next().await.map_err(DbError::statement)? {
            yield decode_row(&row, &mut columns)?;
        }
    }
}

impl std::fmt::Debug for SqlxTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxTransaction")
            .field("dialect", &self.shared.dialect)
            .field("savepoint", &self.savepoint)
            .field("open", &self.is_open())
            .finish()
    }
}

#[async_trait]
impl QueryRunner for SqlxTransaction {
    async fn exec(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<CommandTag> {
        let mut tx = self.lock()?;
        let conn = tx.conn()?;
        scope.run(codec::exec_on(conn, sql, args)).await
    }

    async fn query(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<Rows> {
        self.ensure_open()?;
        let rows = cursor(self.shared.clone(), sql.to_string(), args);
        scope.run(Rows::primed(Box::pin(rows))).await
    }

    async fn query_row(&self, scope: &Scope, sql: &str, args: Args) -> SingleRow {
        SingleRow::from_optional(self.fetch_optional(scope, sql, args).await)
    }

    async fn begin(&self, scope: &Scope) -> DbResult<Arc<dyn Transaction>> {
        scope.check().map_err(DbError::transaction_open)?;
        let mut tx = self.lock().map_err(DbError::transaction_open)?;
        let n = self.shared.savepoints.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("sp_{n}");
        tx.conn()
            .map_err(DbError::transaction_open)?
            .execute(Dialect::savepoint(&name).as_str())
            .await
            .map_err(DbError::transaction_open)?;
        tracing::debug!(txscope.tx = "savepoint", savepoint = %name, "Savepoint opened");
        Ok(Arc::new(SqlxTransaction {
            shared: self.shared.clone(),
            savepoint: Some(name),
            closed: AtomicBool::new(false),
        }))
    }

    async fn send_batch(&self, scope: &Scope, batch: Batch) -> BatchResults {
        let len = batch.len();
        match self.run_batch(scope, batch).await {
            Ok(results) => BatchResults::new(results),
            Err(e) => BatchResults::failed(e, len),
        }
    }

    async fn copy_from(
        &self,
        scope: &Scope,
        table: &Identifier,
        columns: &[&str],
        source: CopySource,
    ) -> DbResult<u64> {
        let mut tx = self.lock()?;
        let dialect = self.shared.dialect;
        let conn = tx.conn()?;
        scope
            .run(codec::copy_on(conn, dialect, table, columns, source))
            .await
    }
}

#[async_trait]
impl Transaction for SqlxTransaction {
    async fn commit(&self, scope: &Scope) -> DbResult<()> {
        if let Err(e) = scope.check() {
            self.ensure_open()?;
            if let Err(rollback) = self.rollback(&Scope::new()).await {
                tracing::warn!(error = %rollback, "Rollback of cancelled commit failed");
            }
            return Err(e);
        }
        match &self.savepoint {
            Some(name) => self
                .finish_savepoint(name, &[Dialect::release_savepoint(name)])
                .await
                .map_err(|e| e.into_db(DbError::commit)),
            None => {
                let mut tx = self.lock()?;
                self.closed.store(true, Ordering::SeqCst);
                tx.commit().await
            }
        }
    }

    // Runs even when the scope is cancelled.
    async fn rollback(&self, _scope: &Scope) -> DbResult<()> {
        match &self.savepoint {
            Some(name) => self
                .finish_savepoint(
                    name,
                    &[
                        Dialect::rollback_to_savepoint(name),
                        Dialect::release_savepoint(name),
                    ],
                )
                .await
                .map_err(|e| e.into_db(DbError::rollback)),
            None => {
                let mut tx = self.lock()?;
                self.closed.store(true, Ordering::SeqCst);
                tx.rollback().await
            }
        }
    }
}
