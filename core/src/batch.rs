//! Batched statements and their ordered results.

use crate::error::{DbError, DbResult};
use crate::row::{CommandTag, FromRow, Row, SingleRow};
use crate::value::Args;
use std::collections::VecDeque;

/// A statement waiting in a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedQuery {
    pub sql: String,
    pub args: Args,
}

/// Statements sent together and executed in queue order.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    queries: Vec<QueuedQuery>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement to the batch.
    pub fn queue(&mut self, sql: impl Into<String>, args: Args) -> &mut Self {
        self.queries.push(QueuedQuery {
            sql: sql.into(),
            args,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn queries(&self) -> &[QueuedQuery] {
        &self.queries
    }

    pub fn into_queries(self) -> Vec<QueuedQuery> {
        self.queries
    }
}

/// Everything one batched statement produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub tag: CommandTag,
    pub rows: Vec<Row>,
}

/// Ordered results of a sent batch, read one statement at a time.
#[derive(Debug)]
pub struct BatchResults {
    results: VecDeque<DbResult<QueryOutput>>,
}

impl BatchResults {
    pub fn new(results: Vec<DbResult<QueryOutput>>) -> Self {
        Self {
            results: results.into(),
        }
    }

    /// Results for a batch of `len` statements that failed before any ran:
    /// the first read reports `err`, the rest report [`DbError::BatchAborted`].
    pub fn failed(err: DbError, len: usize) -> Self {
        let mut results = VecDeque::with_capacity(len.max(1));
        results.push_back(Err(err));
        results.extend((1..len).map(|_| Err(DbError::BatchAborted)));
        Self { results }
    }

    fn next_output(&mut self) -> DbResult<QueryOutput> {
        self.results
            .pop_front()
            .unwrap_or(Err(DbError::BatchExhausted))
    }

    /// Read the next result as a command tag.
    pub fn exec(&mut self) -> DbResult<CommandTag> {
        self.next_output().map(|out| out.tag)
    }

    /// Read the next result as rows.
    pub fn query(&mut self) -> DbResult<Vec<Row>> {
        self.next_output().map(|out| out.rows)
    }

    /// Read the next result as a single row.
    pub fn query_row(&mut self) -> SingleRow {
        SingleRow::from_optional(self.next_output().map(|out| out.rows.into_iter().next()))
    }

    /// Read the next result and decode all of its rows.
    pub fn scan_all<T: FromRow>(&mut self) -> DbResult<Vec<T>> {
        self.query()?.iter().map(T::from_row).collect()
    }

    /// Number of results not read yet.
    pub fn remaining(&self) -> usize {
        self.results.len()
    }

    /// Discard unread results, reporting the first failure among them.
    pub fn close(self) -> DbResult<()> {
        for result in self.results {
            result?;
        }
        Ok(())
    }
}
