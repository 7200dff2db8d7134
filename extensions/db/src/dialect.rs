//! SQL dialect differences the driver has to paper over.

use crate::pool::DbPoolError;
use txscope_core::{Identifier, TxOptions};

/// Database family behind a connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Detect the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self, DbPoolError> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| DbPoolError::Configuration(format!("missing URL scheme in {url:?}")))?;
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(DbPoolError::Configuration(format!(
                "unsupported database scheme {other:?}"
            ))),
        }
    }

    /// Positional parameter marker for the `n`th argument (1-based).
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Postgres | Self::Sqlite => format!("${n}"),
            Self::MySql => "?".to_string(),
        }
    }

    /// Quote a single identifier part.
    pub fn quote(&self, part: &str) -> String {
        let part = part.replace('\0', "");
        match self {
            Self::MySql => format!("`{}`", part.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", part.replace('"', "\"\"")),
        }
    }

    /// Quote a possibly schema-qualified table name.
    pub fn quote_identifier(&self, ident: &Identifier) -> String {
        match self {
            Self::MySql => ident
                .parts()
                .iter()
                .map(|part| self.quote(part))
                .collect::<Vec<_>>()
                .join("."),
            Self::Postgres | Self::Sqlite => ident.sanitize(),
        }
    }

    /// Statements that open a transaction with `options`, in order.
    ///
    /// PostgreSQL takes the modes on `BEGIN`; MySQL needs `SET TRANSACTION`
    /// before `START TRANSACTION`; SQLite transactions are always
    /// serializable, so options are dropped.
    pub fn begin_statements(&self, options: &TxOptions) -> Vec<String> {
        match self {
            Self::Postgres => match options.modes_sql(true) {
                Some(modes) => vec![format!("BEGIN {modes}")],
                None => vec!["BEGIN".to_string()],
            },
            Self::MySql => match options.modes_sql(false) {
                Some(modes) => vec![
                    format!("SET TRANSACTION {modes}"),
                    "START TRANSACTION".to_string(),
                ],
                None => vec!["START TRANSACTION".to_string()],
            },
            Self::Sqlite => {
                if !options.is_default() {
                    tracing::debug!(?options, "SQLite ignores transaction options");
                }
                vec!["BEGIN".to_string()]
            }
        }
    }

    pub fn savepoint(name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    pub fn release_savepoint(name: &str) -> String {
        format!("RELEASE SAVEPOINT {name}")
    }

    pub fn rollback_to_savepoint(name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }
}
