//! Result shapes: command tags, rows, lazy row cursors and deferred single rows.

use crate::error::{DbError, DbResult};
use crate::value::{FromValue, Value};
use futures_core::Stream;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandTag {
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl CommandTag {
    pub fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Driver-reported id of the last inserted row, when the backend has one.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Fold another tag into this one (used when several statements share a result).
    pub fn merge(&mut self, other: CommandTag) {
        self.rows_affected += other.rows_affected;
        if other.last_insert_id.is_some() {
            self.last_insert_id = other.last_insert_id;
        }
    }
}

/// One decoded result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decode the column at `index`.
    pub fn get<T: FromValue>(&self, index: usize) -> DbResult<T> {
        let column = self
            .columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("#{index}"));
        let value = self.values.get(index).ok_or_else(|| DbError::Decode {
            column: column.clone(),
            expected: std::any::type_name::<T>(),
            found: "missing column",
        })?;
        T::from_value(value).ok_or_else(|| DbError::Decode {
            column,
            expected: std::any::type_name::<T>(),
            found: value.type_name(),
        })
    }

    /// Decode the first column called `name`.
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> DbResult<T> {
        match self.columns.iter().position(|c| c == name) {
            Some(index) => self.get(index),
            None => Err(DbError::Decode {
                column: name.to_string(),
                expected: std::any::type_name::<T>(),
                found: "missing column",
            }),
        }
    }
}

/// Conversion of a whole row into a typed value.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> DbResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(row.clone())
    }
}

macro_rules! impl_from_row_tuple {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty: FromValue),+> FromRow for ($($ty,)+) {
            fn from_row(row: &Row) -> DbResult<Self> {
                Ok(($(row.get::<$ty>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(A => 0);
impl_from_row_tuple!(A => 0, B => 1);
impl_from_row_tuple!(A => 0, B => 1, C => 2);
impl_from_row_tuple!(A => 0, B => 1, C => 2, D => 3);
impl_from_row_tuple!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_from_row_tuple!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);

// ============== Rows ==============

/// Lazy, forward-only cursor over query results.
///
/// The cursor holds the underlying connection until it is drained or dropped,
/// so callers must finish with it before issuing the next statement on the
/// same transaction.
pub struct Rows {
    inner: BoxStream<'static, DbResult<Row>>,
}

impl Rows {
    /// Wrap a row stream without touching it.
    pub fn new(inner: BoxStream<'static, DbResult<Row>>) -> Self {
        Self { inner }
    }

    /// Pull the first item so that a failing statement is reported by the
    /// call that issued it rather than by the first `next()`.
    pub async fn primed(mut inner: BoxStream<'static, DbResult<Row>>) -> DbResult<Self> {
        match inner.next().await {
            None => Ok(Self::empty()),
            Some(Err(e)) => Err(e),
            Some(Ok(first)) => Ok(Self {
                inner: stream::once(async move { Ok(first) }).chain(inner).boxed(),
            }),
        }
    }

    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
        }
    }

    /// Cursor over rows that are already in memory.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            inner: stream::iter(rows.into_iter().map(Ok)).boxed(),
        }
    }

    /// Advance the cursor.
    pub async fn next(&mut self) -> Option<DbResult<Row>> {
        self.inner.next().await
    }

    /// Drain the cursor, stopping at the first error.
    pub async fn fetch_all(mut self) -> DbResult<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.inner.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Drain the cursor, decoding each row.
    pub async fn scan_all<T: FromRow>(mut self) -> DbResult<Vec<T>> {
        let mut out = Vec::new();
        while let Some(row) = self.inner.next().await {
            out.push(T::from_row(&row?)?);
        }
        Ok(out)
    }

    /// Release the cursor and its connection without reading the rest.
    pub fn close(self) {}
}

impl Stream for Rows {
    type Item = DbResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows").finish_non_exhaustive()
    }
}

// ============== SingleRow ==============

/// Result of a single-row query.
///
/// Any failure, including "no rows", is deferred until the row is scanned.
#[derive(Debug)]
pub struct SingleRow {
    result: DbResult<Row>,
}

impl SingleRow {
    pub fn new(result: DbResult<Row>) -> Self {
        Self { result }
    }

    /// Build from an optional row; `None` becomes [`DbError::NoRows`].
    pub fn from_optional(result: DbResult<Option<Row>>) -> Self {
        Self {
            result: result.and_then(|row| row.ok_or(DbError::NoRows)),
        }
    }

    pub fn scan<T: FromRow>(self) -> DbResult<T> {
        T::from_row(&self.result?)
    }

    pub fn into_row(self) -> DbResult<Row> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: Vec<Value>) -> Row {
        let columns: Arc<[String]> = (0..values.len())
            .map(|i| ["customer_id", "amount", "note"][i].to_string())
            .collect();
        Row::new(columns, values)
    }

    #[test]
    fn tuple_scan_and_named_lookup() {
        let r = row(vec![Value::Int(123), Value::Int(12500)]);
        let (customer, amount): (i32, i64) = FromRow::from_row(&r).unwrap();
        assert_eq!((customer, amount), (123, 12500));
        assert_eq!(r.get_by_name::<i64>("amount").unwrap(), 12500);
    }

    #[test]
    fn decode_error_names_the_column() {
        let r = row(vec![Value::Int(1), Value::Text("x".into())]);
        match r.get::<i64>(1) {
            Err(DbError::Decode { column, found, .. }) => {
                assert_eq!(column, "amount");
                assert_eq!(found, "text");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(r.get_by_name::<i64>("missing").is_err());
    }

    #[test]
    fn single_row_defers_no_rows() {
        let single = SingleRow::from_optional(Ok(None));
        assert!(single.scan::<(i64,)>().unwrap_err().is_no_rows());
    }

    #[tokio::test]
    async fn primed_cursor_reports_first_error_and_keeps_first_row() {
        let failing = stream::iter(vec![Err(DbError::NoRows)]).boxed();
        assert!(Rows::primed(failing).await.is_err());

        let rows = vec![
            Ok(row(vec![Value::Int(1)])),
            Ok(row(vec![Value::Int(2)])),
        ];
        let cursor = Rows::primed(stream::iter(rows).boxed()).await.unwrap();
        let ids: Vec<(i64,)> = cursor.scan_all().await.unwrap();
        assert_eq!(ids, vec![(1,), (2,)]);
    }

    #[test]
    fn command_tags_merge() {
        let mut tag = CommandTag::new(1, Some(10));
        tag.merge(CommandTag::new(2, None));
        assert_eq!(tag.rows_affected(), 3);
        assert_eq!(tag.last_insert_id(), Some(10));
    }
}
