//! # txscope core
//!
//! Driver-agnostic building blocks: the propagated [`Scope`], the statement
//! instrumentation hook, the error taxonomy, result shapes, and the traits a
//! pool and its transactions must implement.

pub mod batch;
pub mod copy;
pub mod error;
pub mod options;
pub mod row;
pub mod runner;
pub mod scope;
pub mod tracer;
pub mod value;

pub use batch::{Batch, BatchResults, QueryOutput, QueuedQuery};
pub use copy::{CopySource, Identifier, copy_from_rows};
pub use error::{BoxError, DbError, DbResult};
pub use options::{AccessMode, IsolationLevel, TxOptions};
pub use row::{CommandTag, FromRow, Row, Rows, SingleRow};
pub use runner::{Pool, QueryRunner, Transaction, TransactionInitiator};
pub use scope::Scope;
pub use tracer::{NilTracer, SpanFinish, TraceGuard, Tracer};
pub use value::{Args, FromValue, Value};

pub mod prelude {
    pub use crate::args;
    pub use crate::batch::{Batch, BatchResults};
    pub use crate::copy::{Identifier, copy_from_rows};
    pub use crate::error::{DbError, DbResult};
    pub use crate::options::{IsolationLevel, TxOptions};
    pub use crate::row::{CommandTag, FromRow, Row, Rows, SingleRow};
    pub use crate::runner::{Pool, QueryRunner, Transaction, TransactionInitiator};
    pub use crate::scope::Scope;
    pub use crate::tracer::{NilTracer, Tracer};
    pub use crate::value::{Args, Value};
}
