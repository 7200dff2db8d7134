//! Transactor - the abstraction services depend on to group work atomically.

use async_trait::async_trait;
use std::future::Future;
use txscope_core::{DbError, Scope, TxOptions};

/// Runs a unit of work inside a transaction.
///
/// Example:
/// ```rust,ignore
/// shop.transactor
///     .within_transaction(&scope, |tx_scope| async move {
///         payments.create(&tx_scope, customer_id, amount).await?;
///         orders.create(&tx_scope, customer_id, order_id).await?;
///         Ok::<_, DbError>(())
///     })
///     .await?;
/// ```
#[async_trait]
pub trait Transactor: Send + Sync {
    /// Run `unit` inside a transaction opened with default options.
    async fn within_transaction<F, Fut, T, E>(&self, scope: &Scope, unit: F) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<DbError> + Send,
    {
        self.within_transaction_with_options(scope, unit, TxOptions::default())
            .await
    }

    /// Run `unit` inside a transaction opened with `options`.
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
        E: From<DbError> + Send;
}

/// Transactor that opens nothing: the unit of work runs with the caller's
/// scope unchanged. Useful for testing services without a database.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectTransactor;

impl DirectTransactor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transactor for DirectTransactor {
    async fn within_transaction_with_options<F, Fut, T, E>(
        &self,
        scope: &Scope,
        unit: F,
        _options: TxOptions,
    ) -> Result<T, E>
    where
        F: FnOnce(Scope) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<DbError> + Send,
    {
        unit(scope.clone()).await
    }
}
