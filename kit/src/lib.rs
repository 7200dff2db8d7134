//! txscope facade crate.
//!
//! This crate re-exports the core, runtime, db and observe crates with a single entry point.
//! Statements issued through an [`Executor`] run inside whatever transaction
//! the [`Scope`] they were issued with carries.

pub use txscope_core as core;
#[cfg(feature = "db")]
pub use txscope_db as db;
#[cfg(feature = "observe")]
pub use txscope_observe as observe;
pub use txscope_runtime as runtime;

pub use txscope_core::{DbError, DbResult, QueryRunner, Scope, Tracer, TxOptions, args};
#[cfg(feature = "db")]
pub use txscope_db::{PoolConfig, SqlxPool};
#[cfg(feature = "observe")]
pub use txscope_observe::TracingTracer;
pub use txscope_runtime::{DirectTransactor, Executor, Transactor};

pub mod prelude {
    pub use txscope_core::prelude::*;
    #[cfg(feature = "db")]
    pub use txscope_db::prelude::*;
    #[cfg(feature = "observe")]
    pub use txscope_observe::TracingTracer;
    pub use txscope_runtime::prelude::*;
}
