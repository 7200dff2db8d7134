//! Bulk copy: target identifiers and row sources.

use crate::error::DbResult;
use crate::value::Value;
use futures_util::stream::{self, BoxStream, StreamExt};

/// Possibly schema-qualified table name, e.g. `["public", "payment"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(Vec<String>);

impl Identifier {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// ANSI-quoted form: every part wrapped in `"`, embedded quotes doubled,
    /// NUL bytes removed, parts joined with `.`.
    pub fn sanitize(&self) -> String {
        self.0
            .iter()
            .map(|part| format!("\"{}\"", part.replace('\0', "").replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl From<&str> for Identifier {
    fn from(table: &str) -> Self {
        Self(vec![table.to_string()])
    }
}

/// Rows fed to a bulk copy, one `Vec<Value>` per row in column order.
pub type CopySource = BoxStream<'static, DbResult<Vec<Value>>>;

/// Copy source over rows that are already in memory.
pub fn copy_from_rows(rows: Vec<Vec<Value>>) -> CopySource {
    stream::iter(rows.into_iter().map(Ok)).boxed()
}
