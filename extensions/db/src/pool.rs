//! Connection pool over the sqlx `Any` driver.

use crate::codec::{self, decode_row};
use crate::config::PoolConfig;
use crate::dialect::Dialect;
use crate::transaction::{OpenTx, SqlxTransaction};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{Stream, TryStreamExt};
use sqlx::{AnyPool, Connection as _};
use std::sync::Arc;
use txscope_core::{
    Args, Batch, BatchResults, CommandTag, CopySource, DbError, DbResult, Identifier, QueryOutput,
    QueryRunner, Row, Rows, Scope, SingleRow, Transaction, TransactionInitiator, TxOptions,
};

/// Pool configuration and connection failures.
#[derive(Debug, thiserror::Error)]
pub enum DbPoolError {
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Failed to read pool configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pool configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Database connection failed: {0}")]
    Connection(#[source] sqlx::Error),
}

/// Pool occupancy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSize {
    /// Open connections, idle or in use.
    pub size: u32,
    pub idle: usize,
}

/// Pool collaborator backed by `sqlx::AnyPool`.
///
/// Statements run on a connection acquired for that statement alone.
/// Transactions keep one connection until they are committed or rolled back.
#[derive(Clone)]
pub struct SqlxPool {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlxPool {
    /// Connect with default pool settings.
    pub async fn connect(url: &str) -> Result<Self, DbPoolError> {
        PoolConfig::new(url).connect().await
    }

    /// Wrap an existing sqlx pool.
    pub fn from_pool(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The underlying sqlx pool.
    pub fn inner(&self) -> &AnyPool {
        &self.pool
    }

    /// Check that a connection can be acquired and answers.
    pub async fn ping(&self) -> Result<(), DbPoolError> {
        let mut conn = self.pool.acquire().await.map_err(DbPoolError::Connection)?;
        conn.ping().await.map_err(DbPoolError::Connection)
    }

    pub fn size(&self) -> PoolSize {
        PoolSize {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    /// Close every connection. Waits for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(txscope.db.pool = "closed", "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn acquire(&self) -> DbResult<sqlx::pool::PoolConnection<sqlx::Any>> {
        self.pool.acquire().await.map_err(DbError::statement)
    }

    /// Run the batch on one connection inside an implicit transaction that is
    /// committed only when every statement succeeded.
    async fn run_batch(&self, batch: Batch) -> DbResult<Vec<DbResult<QueryOutput>>> {
        let mut tx = OpenTx::begin(&self.pool, self.dialect, &TxOptions::default()).await?;
        let results = codec::batch_on(tx.conn()?, batch.into_queries()).await;
        if results.iter().all(Result::is_ok) {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(results)
    }

    async fn run_copy(
        &self,
        table: &Identifier,
        columns: &[&str],
        source: CopySource,
    ) -> DbResult<u64> {
        let mut tx = OpenTx::begin(&self.pool, self.dialect, &TxOptions::default()).await?;
        match codec::copy_on(tx.conn()?, self.dialect, table, columns, source).await {
            Ok(copied) => {
                tx.commit().await?;
                Ok(copied)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback of failed copy failed");
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for SqlxPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxPool")
            .field("dialect", &self.dialect)
            .field("size", &self.size())
            .finish()
    }
}

/// Row cursor that owns a pooled connection until it is drained or dropped.
fn cursor(pool: AnyPool, sql: String, args: Args) -> impl Stream<Item = DbResult<Row>> + Send + 'static {
    try_stream! {
        let mut conn = pool.acquire().await.map_err(DbError::statement)?;
        let mut results = codec::bind(&sql, args).fetch(&mut *conn);
        let mut columns = None;
        while let Some(row) = results.try_next().await.map_err(DbError::statement)? {
            yield decode_row(&row, &mut columns)?;
        }
    }
}

#[async_trait]
impl QueryRunner for SqlxPool {
    async fn exec(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<CommandTag> {
        scope
            .run(async {
                let mut conn = self.acquire().await?;
                codec::exec_on(&mut conn, sql, args).await
            })
            .await
    }

    async fn query(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<Rows> {
        let rows = cursor(self.pool.clone(), sql.to_string(), args);
        scope.run(Rows::primed(Box::pin(rows))).await
    }

    async fn query_row(&self, scope: &Scope, sql: &str, args: Args) -> SingleRow {
        let row = scope
            .run(async {
                let mut conn = self.acquire().await?;
                codec::query_row_on(&mut conn, sql, args).await
            })
            .await;
        SingleRow::from_optional(row)
    }

    async fn begin(&self, scope: &Scope) -> DbResult<Arc<dyn Transaction>> {
        self.begin_tx(scope, TxOptions::default()).await
    }

    async fn send_batch(&self, scope: &Scope, batch: Batch) -> BatchResults {
        let len = batch.len();
        match scope.run(self.run_batch(batch)).await {
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
        scope.run(self.run_copy(table, columns, source)).await
    }
}

#[async_trait]
impl TransactionInitiator for SqlxPool {
    async fn begin_tx(&self, scope: &Scope, options: TxOptions) -> DbResult<Arc<dyn Transaction>> {
        let tx = scope
            .run(OpenTx::begin(&self.pool, self.dialect, &options))
            .await
            .map_err(|e| match e {
                DbError::TransactionOpen(_) => e,
                other => DbError::transaction_open(other),
            })?;
        Ok(Arc::new(SqlxTransaction::new(tx, self.dialect)))
    }
}
