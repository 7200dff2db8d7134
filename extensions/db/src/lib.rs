//! # txscope Database Integration
//!
//! The concrete pool collaborator for txscope, built on the sqlx `Any`
//! driver (PostgreSQL, MySQL, SQLite), plus pool configuration.
//!
//! ```rust,ignore
//! let pool = PoolConfig::from_env()?.connect().await?;
//! let db = Executor::new(pool);
//! ```

mod codec;
pub mod config;
pub mod dialect;
pub mod pool;
pub mod transaction;

// Re-exports for convenience
pub use config::PoolConfig;
pub use dialect::Dialect;
pub use pool::{DbPoolError, PoolSize, SqlxPool};
pub use transaction::SqlxTransaction;

// Prelude module
pub mod prelude {
    pub use crate::config::PoolConfig;
    pub use crate::pool::{DbPoolError, PoolSize, SqlxPool};
    pub use crate::transaction::SqlxTransaction;
}
