//! Lifecycle - begin / run / commit-or-rollback orchestration.
//!
//! Every invocation opens exactly one transaction and finishes it exactly once:
//! commit when the unit of work succeeds, rollback when it fails or panics.
//!
//! ## Finalisation rules
//!
//! * A commit or rollback failure replaces the unit of work's own result, so a
//!   unit of work that succeeded locally still fails when its commit fails.
//! * "Transaction already closed" during finalisation is ignored: the unit of
//!   work may have finished the transaction itself.
//!
//! Callers get a single error either way and must inspect its kind to tell a
//! failed unit of work from a failed commit.

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use txscope_core::{DbError, DbResult, Scope, Transaction, TransactionInitiator, TxOptions};

/// Run `unit` inside a transaction opened with default options.
pub async fn within_transaction<I, F, Fut, T, E>(initiator: &I, scope: &Scope, unit: F) -> Result<T, E>
where
    I: TransactionInitiator + ?Sized,
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<DbError>,
{
    within_transaction_with_options(initiator, scope, unit, TxOptions::default()).await
}

/// Run `unit` inside a transaction opened with `options`.
///
/// `unit` receives a scope derived from `scope` with the new transaction
/// attached; statements issued with that scope run inside the transaction.
pub async fn within_transaction_with_options<I, F, Fut, T, E>(
    initiator: &I,
    scope: &Scope,
    unit: F,
    options: TxOptions,
) -> Result<T, E>
where
    I: TransactionInitiator + ?Sized,
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<DbError>,
{
    let tx = initiator.begin_tx(scope, options).await?;
    tracing::debug!(txscope.tx = "begin", ?options, "Transaction opened");

    let tx_scope = scope.with_transaction(tx.clone());
    // The closure itself runs inside the caught future, so a panic raised
    // before it returns its future still rolls back.
    let outcome = AssertUnwindSafe(async move { unit(tx_scope).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(value)) => {
            finish(tx.as_ref(), scope, Finish::Commit).await?;
            Ok(value)
        }
        Ok(Err(err)) => {
            finish(tx.as_ref(), scope, Finish::Rollback).await?;
            Err(err)
        }
        Err(panic) => {
            tracing::error!(txscope.tx = "rollback", "Unit of work panicked, rolling back");
            if let Err(e) = finish(tx.as_ref(), scope, Finish::Rollback).await {
                tracing::warn!(error = %e, "Rollback after panic failed");
            }
            std::panic::resume_unwind(panic)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Finish {
    Commit,
    Rollback,
}

async fn finish(tx: &dyn Transaction, scope: &Scope, action: Finish) -> DbResult<()> {
    let result = match action {
        Finish::Commit => tx.commit(scope).await,
        Finish::Rollback => tx.rollback(scope).await,
    };
    match result {
        Ok(()) => {
            tracing::debug!(txscope.tx = ?action, "Transaction finished");
            Ok(())
        }
        Err(e) if e.is_tx_closed() => {
            tracing::debug!(txscope.tx = ?action, "Transaction was already closed");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(txscope.tx = ?action, error = %e, "Transaction finalisation failed");
            Err(e)
        }
    }
}
