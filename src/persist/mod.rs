pub mod sqlite;

use thiserror::Error;

use crate::{core::wallet::LedgerError, op::StoredOp, types::EntrySeq};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

impl From<LedgerError> for PersistError {
    fn from(value: LedgerError) -> Self {
        Self::Message(format!("ledger error: {value}"))
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable destination for journal ops.
///
/// Implementations must store ops atomically per call: either every op in
/// the slice is durable or none is.
pub trait OpSink: Send {
    /// Appends `ops` and returns the highest durable sequence.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<EntrySeq>;
    /// Housekeeping after appends (e.g. a WAL checkpoint). Ops returned
    /// from `append_ops` are durable whether or not this succeeds.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
