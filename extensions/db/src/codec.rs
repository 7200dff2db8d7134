//! Conversion between txscope values and sqlx's `Any` driver, plus the
//! statement helpers shared by pooled connections and transactions.

use crate::dialect::Dialect;
use futures_util::{StreamExt, TryStreamExt};
use sqlx::any::{Any, AnyArguments, AnyQueryResult, AnyRow};
use sqlx::query::Query;
use sqlx::{AnyConnection, Column, Either, Row as _};
use std::sync::Arc;
use txscope_core::{
    Args, CommandTag, CopySource, DbError, DbResult, Identifier, QueryOutput, QueuedQuery, Row,
    Value,
};

/// Rows per multi-row `INSERT` issued by a bulk copy.
pub(crate) const COPY_CHUNK_ROWS: usize = 100;

pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Prepare `sql` with `args` bound positionally.
pub(crate) fn bind(sql: &str, args: Args) -> AnyQuery<'_> {
    args.into_iter().fold(sqlx::query(sql), |query, value| match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(v) => query.bind(v),
        Value::Int(v) => query.bind(v),
        Value::Float(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
        Value::Bytes(v) => query.bind(v),
    })
}

pub(crate) fn command_tag(done: &AnyQueryResult) -> CommandTag {
    CommandTag::new(done.rows_affected(), done.last_insert_id())
}

/// Decode a driver row. Column names are computed once per result set and
/// shared by every row through `columns`.
pub(crate) fn decode_row(row: &AnyRow, columns: &mut Option<Arc<[String]>>) -> DbResult<Row> {
    let names = columns
        .get_or_insert_with(|| row.columns().iter().map(|c| c.name().to_string()).collect())
        .clone();
    let values = (0..row.len())
        .map(|index| decode_value(row, index, &names[index]))
        .collect::<DbResult<Vec<_>>>()?;
    Ok(Row::new(names, values))
}

fn decode_value(row: &AnyRow, index: usize, column: &str) -> DbResult<Value> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.map_or(Value::Null, Value::Int));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.map_or(Value::Null, Value::Float));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.map_or(Value::Null, Value::Text));
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(v.map_or(Value::Null, Value::Bytes));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Ok(v.map_or(Value::Null, Value::Bool));
    }
    Err(DbError::Decode {
        column: column.to_string(),
        expected: "int, float, text, bytes or bool",
        found: "unsupported driver type",
    })
}

pub(crate) async fn exec_on(conn: &mut AnyConnection, sql: &str, args: Args) -> DbResult<CommandTag> {
    let done = bind(sql, args)
        .execute(conn)
        .await
        .map_err(DbError::statement)?;
    Ok(command_tag(&done))
}

pub(crate) async fn query_row_on(
    conn: &mut AnyConnection,
    sql: &str,
    args: Args,
) -> DbResult<Option<Row>> {
    let row = bind(sql, args)
        .fetch_optional(conn)
        .await
        .map_err(DbError::statement)?;
    row.map(|row| decode_row(&row, &mut None)).transpose()
}

/// Run one statement and keep everything it produced.
async fn collect_on(conn: &mut AnyConnection, sql: &str, args: Args) -> DbResult<QueryOutput> {
    let mut tag = CommandTag::default();
    let mut rows = Vec::new();
    let mut columns = None;

    #[allow(deprecated)]
    let mut results = bind(sql, args).fetch_many(conn);
    while let Some(item) = results.try_next().await.map_err(DbError::statement)? {
        match item {
            Either::Left(done) => tag.merge(command_tag(&done)),
            Either::Right(row) => rows.push(decode_row(&row, &mut columns)?),
        }
    }
    Ok(QueryOutput { tag, rows })
}

/// Run queued statements in order. After the first failure the remaining
/// statements are not sent and report [`DbError::BatchAborted`].
pub(crate) async fn batch_on(
    conn: &mut AnyConnection,
    queries: Vec<QueuedQuery>,
) -> Vec<DbResult<QueryOutput>> {
    let mut results = Vec::with_capacity(queries.len());
    let mut aborted = false;
    for QueuedQuery { sql, args } in queries {
        if aborted {
            results.push(Err(DbError::BatchAborted));
            continue;
        }
        let output = collect_on(&mut *conn, &sql, args).await;
        aborted = output.is_err();
        results.push(output);
    }
    results
}

/// Insert every row of `source` into `table` with multi-row `INSERT`s.
pub(crate) async fn copy_on(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &Identifier,
    columns: &[&str],
    mut source: CopySource,
) -> DbResult<u64> {
    if columns.is_empty() {
        return Err(DbError::statement("bulk copy needs at least one column"));
    }
    let target = dialect.quote_identifier(table);
    let column_list = columns
        .iter()
        .map(|c| dialect.quote(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut copied = 0;
    let mut chunk = Vec::with_capacity(COPY_CHUNK_ROWS);
    while let Some(row) = source.next().await {
        let row = row?;
        if row.len() != columns.len() {
            return Err(DbError::statement(format!(
                "copy row has {} values but {} columns were named",
                row.len(),
                columns.len()
            )));
        }
        chunk.push(row);
        if chunk.len() == COPY_CHUNK_ROWS {
            let rows = std::mem::take(&mut chunk);
            copied += insert_chunk(&mut *conn, dialect, &target, &column_list, rows).await?;
        }
    }
    if !chunk.is_empty() {
        copied += insert_chunk(&mut *conn, dialect, &target, &column_list, chunk).await?;
    }
    Ok(copied)
}

async fn insert_chunk(
    conn: &mut AnyConnection,
    dialect: Dialect,
    target: &str,
    column_list: &str,
    rows: Vec<Vec<Value>>,
) -> DbResult<u64> {
    let sql = insert_sql(dialect, target, column_list, &rows);
    let args: Args = rows.into_iter().flatten().collect();
    exec_on(conn, &sql, args).await.map(|tag| tag.rows_affected())
}

fn insert_sql(dialect: Dialect, target: &str, column_list: &str, rows: &[Vec<Value>]) -> String {
    let mut next = 0;
    let tuples = rows
        .iter()
        .map(|row| {
            let markers = row
                .iter()
                .map(|_| {
                    next += 1;
                    dialect.placeholder(next)
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("({markers})")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {target} ({column_list}) VALUES {tuples}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_numbers_placeholders_across_rows() {
        let rows = vec![
            vec![Value::Int(1), Value::from("a")],
            vec![Value::Int(2), Value::from("b")],
        ];
        assert_eq!(
            insert_sql(Dialect::Postgres, "\"payment\"", "\"id\", \"note\"", &rows),
            "INSERT INTO \"payment\" (\"id\", \"note\") VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(
            insert_sql(Dialect::MySql, "`payment`", "`id`, `note`", &rows),
            "INSERT INTO `payment` (`id`, `note`) VALUES (?, ?), (?, ?)"
        );
    }
}
