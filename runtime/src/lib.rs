//! # txscope runtime
//!
//! Transaction lifecycle orchestration and the scope-routed [`Executor`].

pub mod executor;
pub mod lifecycle;
pub mod runner;
pub mod transactor;

#[cfg(test)]
mod mock;

pub mod prelude {
    pub use crate::executor::Executor;
    pub use crate::lifecycle::{within_transaction, within_transaction_with_options};
    pub use crate::runner::Runner;
    pub use crate::transactor::{DirectTransactor, Transactor};
}

pub use executor::{BATCH_DESCRIPTOR, Executor};
pub use lifecycle::{within_transaction, within_transaction_with_options};
pub use runner::Runner;
pub use transactor::{DirectTransactor, Transactor};
