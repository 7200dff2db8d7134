//! In-memory pool and transaction doubles for the runtime tests.
//!
//! Statements are recorded as text. Pool statements become visible at once;
//! transaction statements become visible on commit and vanish on rollback.
//! Any statement whose SQL contains `fail` returns a statement error.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use txscope_core::{
    Args, Batch, BatchResults, CommandTag, CopySource, DbError, DbResult, Identifier,
    QueryOutput, QueryRunner, Row, Rows, Scope, SingleRow, SpanFinish, Tracer, Transaction,
    TransactionInitiator, TxOptions, Value,
};

#[derive(Default)]
pub(crate) struct State {
    pub visible: Vec<String>,
    pub events: Vec<String>,
    pub opened: usize,
    pub fail_begin: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MockPool {
    pub state: Arc<Mutex<State>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> Vec<String> {
        self.state.lock().visible.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    fn run(&self, who: &str, sql: &str) -> DbResult<CommandTag> {
        let mut state = self.state.lock();
        state.events.push(format!("{who}: {sql}"));
        if sql.contains("fail") {
            return Err(DbError::statement(std::io::Error::other("constraint violation")));
        }
        Ok(CommandTag::new(1, None))
    }
}

fn text_row(text: &str) -> Row {
    Row::new(Arc::from(vec!["entry".to_string()]), vec![Value::from(text)])
}

#[async_trait]
impl QueryRunner for MockPool {
    async fn exec(&self, scope: &Scope, sql: &str, _args: Args) -> DbResult<CommandTag> {
        scope.check()?;
        let tag = self.run("pool", sql)?;
        self.state.lock().visible.push(sql.to_string());
        Ok(tag)
    }

    async fn query(&self, scope: &Scope, sql: &str, _args: Args) -> DbResult<Rows> {
        scope.check()?;
        self.run("pool", sql)?;
        let rows = self.visible().iter().map(|s| text_row(s)).collect();
        Ok(Rows::from_rows(rows))
    }

    async fn query_row(&self, scope: &Scope, sql: &str, args: Args) -> SingleRow {
        match self.query(scope, sql, args).await {
            Ok(rows) => SingleRow::from_optional(rows.fetch_all().await.map(|r| r.into_iter().next())),
            Err(e) => SingleRow::new(Err(e)),
        }
    }

    async fn begin(&self, scope: &Scope) -> DbResult<Arc<dyn Transaction>> {
        self.begin_tx(scope, TxOptions::default()).await
    }

    async fn send_batch(&self, scope: &Scope, batch: Batch) -> BatchResults {
        let mut results = Vec::new();
        for query in batch.into_queries() {
            results.push(self.exec(scope, &query.sql, query.args).await.map(|tag| QueryOutput {
                tag,
                rows: Vec::new(),
            }));
        }
        BatchResults::new(results)
    }

    async fn copy_from(
        &self,
        _scope: &Scope,
        table: &Identifier,
        _columns: &[&str],
        _source: CopySource,
    ) -> DbResult<u64> {
        self.run("pool", &format!("copy {}", table.sanitize()))?;
        Ok(0)
    }
}

#[async_trait]
impl TransactionInitiator for MockPool {
    async fn begin_tx(&self, scope: &Scope, _options: TxOptions) -> DbResult<Arc<dyn Transaction>> {
        scope.check().map_err(DbError::transaction_open)?;
        let mut state = self.state.lock();
        if state.fail_begin {
            return Err(DbError::transaction_open(std::io::Error::other("pool exhausted")));
        }
        state.opened += 1;
        let id = state.opened;
        state.events.push(format!("begin#{id}"));
        Ok(Arc::new(MockTx {
            id,
            pool: self.clone(),
            pending: Mutex::new(Some(Vec::new())),
        }))
    }
}

pub(crate) struct MockTx {
    id: usize,
    pool: MockPool,
    /// `None` once committed or rolled back.
    pending: Mutex<Option<Vec<String>>>,
}

impl MockTx {
    fn close(&self) -> DbResult<Vec<String>> {
        self.pending.lock().take().ok_or(DbError::TxClosed)
    }
}

#[async_trait]
impl QueryRunner for MockTx {
    async fn exec(&self, scope: &Scope, sql: &str, _args: Args) -> DbResult<CommandTag> {
        scope.check()?;
        let mut pending = self.pending.lock();
        let pending = pending.as_mut().ok_or(DbError::TxClosed)?;
        let tag = self.pool.run(&format!("tx#{}", self.id), sql)?;
        pending.push(sql.to_string());
        Ok(tag)
    }

    async fn query(&self, scope: &Scope, sql: &str, _args: Args) -> DbResult<Rows> {
        scope.check()?;
        let pending = self.pending.lock().clone().ok_or(DbError::TxClosed)?;
        self.pool.run(&format!("tx#{}", self.id), sql)?;
        let mut rows: Vec<Row> = self.pool.visible().iter().map(|s| text_row(s)).collect();
        rows.extend(pending.iter().map(|s| text_row(s)));
        Ok(Rows::from_rows(rows))
    }

    async fn query_row(&self, scope: &Scope, sql: &str, args: Args) -> SingleRow {
        match self.query(scope, sql, args).await {
            Ok(rows) => SingleRow::from_optional(rows.fetch_all().await.map(|r| r.into_iter().next())),
            Err(e) => SingleRow::new(Err(e)),
        }
    }

    async fn begin(&self, _scope: &Scope) -> DbResult<Arc<dyn Transaction>> {
        Err(DbError::transaction_open(std::io::Error::other(
            "savepoints are not modelled",
        )))
    }

    async fn send_batch(&self, scope: &Scope, batch: Batch) -> BatchResults {
        let mut results = Vec::new();
        for query in batch.into_queries() {
            results.push(self.exec(scope, &query.sql, query.args).await.map(|tag| QueryOutput {
                tag,
                rows: Vec::new(),
            }));
        }
        BatchResults::new(results)
    }

    async fn copy_from(
        &self,
        _scope: &Scope,
        table: &Identifier,
        _columns: &[&str],
        _source: CopySource,
    ) -> DbResult<u64> {
        self.pool
            .run(&format!("tx#{}", self.id), &format!("copy {}", table.sanitize()))?;
        Ok(0)
    }
}

#[async_trait]
impl Transaction for MockTx {
    async fn commit(&self, _scope: &Scope) -> DbResult<()> {
        let pending = self.close()?;
        let mut state = self.pool.state.lock();
        state.events.push(format!("commit#{}", self.id));
        if state.fail_commit {
            return Err(DbError::commit(std::io::Error::other("could not serialize access")));
        }
        state.visible.extend(pending);
        Ok(())
    }

    async fn rollback(&self, _scope: &Scope) -> DbResult<()> {
        self.close()?;
        let mut state = self.pool.state.lock();
        state.events.push(format!("rollback#{}", self.id));
        if state.fail_rollback {
            return Err(DbError::rollback(std::io::Error::other("connection lost")));
        }
        Ok(())
    }
}

/// Tracer that counts hook calls and completions per descriptor.
#[derive(Clone, Default)]
pub(crate) struct RecordingTracer {
    pub started: Arc<Mutex<Vec<String>>>,
    pub finished: Arc<AtomicUsize>,
}

impl RecordingTracer {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Tracer for RecordingTracer {
    fn trace_data(&self, descriptor: &str) -> SpanFinish {
        self.started.lock().push(descriptor.to_string());
        let finished = self.finished.clone();
        Box::new(move || {
            finished.fetch_add(1, Ordering::SeqCst);
        })
    }
}
