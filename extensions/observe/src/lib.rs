//! # txscope Observe
//!
//! `tracing` integration: a statement hook that opens one span per traced
//! statement, and subscriber setup for development.

use std::time::{Duration, Instant};
use tracing::{Level, info_span};
use tracing_subscriber::EnvFilter;
use txscope_core::{SpanFinish, Tracer};
use uuid::Uuid;

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,txscope=debug";

/// Initialize a simple stdout tracing subscriber for development
pub fn init_stdout_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ============== TracingTracer ==============

/// Statement hook backed by `tracing`.
///
/// Every traced statement gets a `db.statement` span carrying the descriptor
/// (the SQL text, or `batch`) and a fresh statement id. When the statement
/// finishes, an event with the elapsed time is emitted inside that span at
/// the configured level.
#[derive(Debug, Clone, Copy)]
pub struct TracingTracer {
    level: Level,
}

impl TracingTracer {
    pub fn new() -> Self {
        Self { level: Level::DEBUG }
    }

    /// Level of the completion event (`DEBUG` by default).
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for TracingTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for TracingTracer {
    fn trace_data(&self, descriptor: &str) -> SpanFinish {
        let statement_id = Uuid::new_v4();
        let span = info_span!(
            "db.statement",
            txscope.db.statement = %descriptor,
            txscope.db.statement_id = %statement_id
        );
        span.in_scope(|| tracing::trace!("Statement started"));

        let start = Instant::now();
        let level = self.level;
        Box::new(move || {
            let _entered = span.enter();
            finished(level, start.elapsed());
        })
    }
}

fn finished(level: Level, elapsed: Duration) {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    match level {
        Level::ERROR => tracing::error!(elapsed_ms, "Statement finished"),
        Level::WARN => tracing::warn!(elapsed_ms, "Statement finished"),
        Level::INFO => tracing::info!(elapsed_ms, "Statement finished"),
        Level::DEBUG => tracing::debug!(elapsed_ms, "Statement finished"),
        _ => tracing::trace!(elapsed_ms, "Statement finished"),
    }
}
