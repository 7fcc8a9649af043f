//! Journal operation model and persistence wrappers.

use serde::{Deserialize, Serialize};

use crate::{
    records::{LedgerEntry, TranslationRecord},
    types::EntrySeq,
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// A balance mutation together with its new balance.
    Ledger {
        /// Appended ledger entry.
        entry: LedgerEntry,
        /// Balance of `entry.user_id` after the mutation.
        balance_after: u64,
    },
    /// A completed translation.
    Translation {
        /// Appended translation record.
        record: TranslationRecord,
    },
}

impl Op {
    /// Owner of the affected account.
    pub fn user_id(&self) -> &str {
        match self {
            Self::Ledger { entry, .. } => &entry.user_id,
            Self::Translation { record } => &record.user_id,
        }
    }

    /// Journal kind label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ledger { entry, .. } => entry.kind.as_str(),
            Self::Translation { .. } => "translation",
        }
    }
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Global journal sequence.
    pub seq: EntrySeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: i64,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
