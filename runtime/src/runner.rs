//! Runner - per-statement routing target.
//!
//! A `Runner` is resolved from the scope on every statement: the transaction
//! attached to the scope when there is one, the pool otherwise.

use async_trait::async_trait;
use std::sync::Arc;
use txscope_core::{
    Args, Batch, BatchResults, CommandTag, CopySource, DbResult, Identifier, Pool, QueryRunner, Rows,
    Scope, SingleRow, Transaction,
};

/// Where a statement will run.
#[derive(Clone)]
pub enum Runner {
    Pool(Arc<dyn Pool>),
    Transaction(Arc<dyn Transaction>),
}

impl Runner {
    /// Resolve the runner for `scope`, falling back to `pool`.
    pub fn resolve(scope: &Scope, pool: &Arc<dyn Pool>) -> Self {
        match scope.transaction() {
            Some(tx) => Runner::Transaction(tx.clone()),
            None => Runner::Pool(pool.clone()),
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Runner::Transaction(_))
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Runner::Pool(_) => f.write_str("Runner::Pool"),
            Runner::Transaction(_) => f.write_str("Runner::Transaction"),
        }
    }
}

#[async_trait]
impl QueryRunner for Runner {
    async fn exec(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<CommandTag> {
        match self {
            Runner::Pool(pool) => pool.exec(scope, sql, args).await,
            Runner::Transaction(tx) => tx.exec(scope, sql, args).await,
        }
    }

    async fn query(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<Rows> {
        match self {
            Runner::Pool(pool) => pool.query(scope, sql, args).await,
            Runner::Transaction(tx) => tx.query(scope, sql, args).await,
        }
    }

    async fn query_row(&self, scope: &Scope, sql: &str, args: Args) -> SingleRow {
        match self {
            Runner::Pool(pool) => pool.query_row(scope, sql, args).await,
            Runner::Transaction(tx) => tx.query_row(scope, sql, args).await,
        }
    }

    async fn begin(&self, scope: &Scope) -> DbResult<Arc<dyn Transaction>> {
        match self {
            Runner::Pool(pool) => pool.begin(scope).await,
            Runner::Transaction(tx) => tx.begin(scope).await,
        }
    }

    async fn send_batch(&self, scope: &Scope, batch: Batch) -> BatchResults {
        match self {
            Runner::Pool(pool) => pool.send_batch(scope, batch).await,
            Runner::Transaction(tx) => tx.send_batch(scope, batch).await,
        }
    }

    async fn copy_from(
        &self,
        scope: &Scope,
        table: &Identifier,
        columns: &[&str],
        source: CopySource,
    ) -> DbResult<u64> {
        match self {
            Runner::Pool(pool) => pool.copy_from(scope, table, columns, source).await,
            Runner::Transaction(tx) => tx.copy_from(scope, table, columns, source).await,
        }
    }
}
