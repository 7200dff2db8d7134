//! Collaborator contracts for pools and transactions.
//!
//! A pool and an open transaction expose the same statement surface
//! ([`QueryRunner`]), which is what lets a caller route a statement to either
//! without knowing which one it got.

use crate::batch::{Batch, BatchResults};
use crate::copy::{CopySource, Identifier};
use crate::error::DbResult;
use crate::options::TxOptions;
use crate::row::{CommandTag, Rows, SingleRow};
use crate::scope::Scope;
use crate::value::Args;
use async_trait::async_trait;
use std::sync::Arc;

/// Statement execution surface shared by pools and transactions.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Run a statement that returns no rows.
    async fn exec(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<CommandTag>;

    /// Run a statement and return a lazy cursor over its rows.
    async fn query(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<Rows>;

    /// Run a statement expected to return one row. Errors surface on scan.
    async fn query_row(&self, scope: &Scope, sql: &str, args: Args) -> SingleRow;

    /// Open a transaction for manual lifecycle control. On a transaction this
    /// opens a nested (savepoint) transaction.
    async fn begin(&self, scope: &Scope) -> DbResult<Arc<dyn Transaction>>;

    /// Send queued statements together. Failures surface when reading results.
    async fn send_batch(&self, scope: &Scope, batch: Batch) -> BatchResults;

    /// Bulk-insert rows from `source` into `table`. Returns the number of rows copied.
    async fn copy_from(
        &self,
        scope: &Scope,
        table: &Identifier,
        columns: &[&str],
        source: CopySource,
    ) -> DbResult<u64>;
}

/// An open transaction.
///
/// After `commit` or `rollback` succeeds, every further call returns
/// [`DbError::TxClosed`](crate::DbError::TxClosed).
#[async_trait]
pub trait Transaction: QueryRunner {
    async fn commit(&self, scope: &Scope) -> DbResult<()>;

    async fn rollback(&self, scope: &Scope) -> DbResult<()>;
}

/// Something that can open a transaction with explicit options.
#[async_trait]
pub trait TransactionInitiator: Send + Sync {
    async fn begin_tx(&self, scope: &Scope, options: TxOptions) -> DbResult<Arc<dyn Transaction>>;
}

/// A shared connection pool: runs statements directly and opens transactions.
pub trait Pool: QueryRunner + TransactionInitiator {}

impl<T: QueryRunner + TransactionInitiator + ?Sized> Pool for T {}
