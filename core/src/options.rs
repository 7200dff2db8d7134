//! Transaction options passed when a transaction is opened.

/// Isolation level requested when a transaction opens.
///
/// Backends that cannot honour a level either upgrade it (PostgreSQL treats
/// `ReadUncommitted` as `ReadCommitted`) or ignore it (SQLite).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Keyword form used after `ISOLATION LEVEL`.
    pub fn to_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Transaction access modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

impl AccessMode {
    pub fn to_sql(&self) -> &'static str {
        match self {
            AccessMode::ReadWrite => "READ WRITE",
            AccessMode::ReadOnly => "READ ONLY",
        }
    }
}

/// Options for opening a transaction. Unset fields keep the driver defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub access_mode: Option<AccessMode>,
    /// PostgreSQL `DEFERRABLE`; only meaningful for serializable read-only transactions.
    pub deferrable: Option<bool>,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = Some(mode);
        self
    }

    pub fn read_only(self) -> Self {
        self.access_mode(AccessMode::ReadOnly)
    }

    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = Some(deferrable);
        self
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Comma-separated transaction modes, e.g.
    /// `ISOLATION LEVEL SERIALIZABLE, READ ONLY`. `None` when nothing is set.
    pub fn modes_sql(&self, with_deferrable: bool) -> Option<String> {
        let mut modes = Vec::new();
        if let Some(level) = self.isolation {
            modes.push(format!("ISOLATION LEVEL {}", level.to_sql()));
        }
        if let Some(mode) = self.access_mode {
            modes.push(mode.to_sql().to_string());
        }
        if with_deferrable {
            match self.deferrable {
                Some(true) => modes.push("DEFERRABLE".to_string()),
                Some(false) => modes.push("NOT DEFERRABLE".to_string()),
                None => {}
            }
        }
        if modes.is_empty() {
            None
        } else {
            Some(modes.join(", "))
        }
    }
}
