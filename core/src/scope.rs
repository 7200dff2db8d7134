//! # Scope: Request-Local Propagation
//!
//! `Scope` is the explicit context passed down a call chain. It carries typed
//! values, a cancellation token, an optional deadline and, most importantly,
//! the transaction that statements issued with it should run against.
//!
//! Scopes are immutable. Every `with_*` method derives a new scope that shares
//! its parent's layers through `Arc`, so callers always keep the unmodified
//! parent and dropping either never invalidates the other.

use crate::error::{DbError, DbResult};
use crate::runner::Transaction;
use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct Layer {
    key: TypeId,
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Arc<Layer>>,
}

/// Attachment key for the active transaction. `None` hides an outer one.
#[derive(Clone)]
struct ActiveTx(Option<Arc<dyn Transaction>>);

/// Immutable, append-only context chain.
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Layer>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    /// Root scope: no values, never cancelled unless its token is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a scope in which `value::<T>()` resolves to `value`.
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Scope {
        Scope {
            head: Some(Arc::new(Layer {
                key: TypeId::of::<T>(),
                value: Box::new(value),
                parent: self.head.clone(),
            })),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
        }
    }

    /// Innermost value of type `T`, if any layer carries one.
    pub fn value<T: 'static>(&self) -> Option<&T> {
        let mut layer = self.head.as_deref();
        while let Some(current) = layer {
            if current.key == TypeId::of::<T>() {
                return current.value.downcast_ref();
            }
            layer = current.parent.as_deref();
        }
        None
    }

    /// Number of layers in the chain.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut layer = self.head.as_deref();
        while let Some(current) = layer {
            depth += 1;
            layer = current.parent.as_deref();
        }
        depth
    }

    // ============== Transaction attachment ==============

    /// Derive a scope whose statements run against `tx`.
    pub fn with_transaction(&self, tx: Arc<dyn Transaction>) -> Scope {
        self.with_value(ActiveTx(Some(tx)))
    }

    /// Derive a scope that hides any active transaction while keeping values,
    /// cancellation and deadline. Statements issued with it go to the pool.
    pub fn without_transaction(&self) -> Scope {
        if self.transaction().is_none() {
            return self.clone();
        }
        self.with_value(ActiveTx(None))
    }

    /// The transaction visible at this depth, if any.
    pub fn transaction(&self) -> Option<&Arc<dyn Transaction>> {
        self.value::<ActiveTx>().and_then(|active| active.0.as_ref())
    }

    // ============== Cancellation ==============

    /// Derive a scope with its own cancellation token. Cancelling the returned
    /// token cancels the new scope only; cancelling this scope cancels both.
    pub fn with_cancel(&self) -> (Scope, CancellationToken) {
        let token = self.cancel.child_token();
        let scope = Scope {
            head: self.head.clone(),
            cancel: token.clone(),
            deadline: self.deadline,
        };
        (scope, token)
    }

    /// Derive a scope that expires at `deadline` (or earlier, if inherited).
    pub fn with_deadline(&self, deadline: Instant) -> Scope {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Scope {
            head: self.head.clone(),
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    /// Derive a scope that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Scope {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err` if the scope is already cancelled or past its deadline.
    pub fn check(&self) -> DbResult<()> {
        if self.cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DbError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` unless the scope is cancelled or its deadline passes first.
    ///
    /// An already-expired scope fails without polling `fut`.
    pub async fn run<F, T>(&self, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        self.check()?;
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(DbError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => Err(DbError::DeadlineExceeded),
                result = fut => result,
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(DbError::Cancelled),
                result = fut => result,
            },
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("depth", &self.depth())
            .field("transactional", &self.transaction().is_some())
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}
