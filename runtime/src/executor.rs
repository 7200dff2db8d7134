//! Executor - scope-routed, instrumented statement facade.
//!
//! Every statement resolves its [`Runner`] from the scope it was issued with,
//! so repositories call the same methods whether or not a caller higher up the
//! chain has opened a transaction.

use crate::lifecycle;
use crate::runner::Runner;
use crate::transactor::Transactor;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use txscope_core::{
    Args, Batch, BatchResults, CommandTag, CopySource, DbError, DbResult, Identifier, NilTracer,
    Pool, QueryRunner, Rows, Scope, SingleRow, TraceGuard, Tracer, Transaction, TxOptions,
};

/// Descriptor handed to the tracer for batched statements.
pub const BATCH_DESCRIPTOR: &str = "batch";

/// Statement facade over a pool.
///
/// Cloning is cheap; clones share the pool and tracer.
#[derive(Clone)]
pub struct Executor {
    pool: Arc<dyn Pool>,
    tracer: Arc<dyn Tracer>,
}

impl Executor {
    /// Create an executor over `pool` with a no-op tracer.
    pub fn new<P: Pool + 'static>(pool: P) -> Self {
        Self::from_arc(Arc::new(pool))
    }

    /// Create an executor over an already shared pool.
    pub fn from_arc(pool: Arc<dyn Pool>) -> Self {
        Self {
            pool,
            tracer: Arc::new(NilTracer),
        }
    }

    /// Install `tracer`. Only statements issued after this call see it.
    pub fn with_tracer<T: Tracer>(self, tracer: T) -> Self {
        self.with_tracer_arc(Arc::new(tracer))
    }

    pub fn with_tracer_arc(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Arc<dyn Pool> {
        &self.pool
    }

    /// Resolve where a statement issued with `scope` would run.
    pub fn runner(&self, scope: &Scope) -> Runner {
        Runner::resolve(scope, &self.pool)
    }

    async fn traced<F: Future>(&self, descriptor: &str, fut: F) -> F::Output {
        let _finish = TraceGuard::start(self.tracer.as_ref(), descriptor);
        fut.await
    }

    /// Run `unit` inside a new transaction with default options.
    pub async fn within_transaction<F, Fut, T, E>(&self, scope: &Scope, unit: F) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        lifecycle::within_transaction(self.pool.as_ref(), scope, unit).await
    }

    /// Run `unit` inside a new transaction opened with `options`.
    pub async fn within_transaction_with_options<F, Fut, T, E>(
        &self,
        scope: &Scope,
        unit: F,
        options: TxOptions,
    ) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        lifecycle::within_transaction_with_options(self.pool.as_ref(), scope, unit, options).await
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

#[async_trait]
impl QueryRunner for Executor {
    async fn exec(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<CommandTag> {
        self.traced(sql, self.runner(scope).exec(scope, sql, args))
            .await
    }

    async fn query(&self, scope: &Scope, sql: &str, args: Args) -> DbResult<Rows> {
        self.traced(sql, self.runner(scope).query(scope, sql, args))
            .await
    }

    async fn query_row(&self, scope: &Scope, sql: &str, args: Args) -> SingleRow {
        self.traced(sql, self.runner(scope).query_row(scope, sql, args))
            .await
    }

    async fn begin(&self, scope: &Scope) -> DbResult<Arc<dyn Transaction>> {
        self.runner(scope).begin(scope).await
    }

    async fn send_batch(&self, scope: &Scope, batch: Batch) -> BatchResults {
        self.traced(BATCH_DESCRIPTOR, self.runner(scope).send_batch(scope, batch))
            .await
    }

    // Bulk copy is not instrumented.
    async fn copy_from(
        &self,
        scope: &Scope,
        table: &Identifier,
        columns: &[&str],
        source: CopySource,
    ) -> DbResult<u64> {
        self.runner(scope)
            .copy_from(scope, table, columns, source)
            .await
    }
}

#[async_trait]
impl Transactor for Executor {
    async fn within_transaction_with_options<F, Fut, T, E>(
        &self,
        scope: &Scope,
        unit: F,
        options: TxOptions,
    ) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<DbError> + Send,
    {
        lifecycle::within_transaction_with_options(self.pool.as_ref(), scope, unit, options).await
    }
}
