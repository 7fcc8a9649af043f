//! Runtime event stream payloads.

use crate::types::{Credits, EntrySeq, LedgerKind, UserId};

/// Events emitted by the ledger shards after a mutation is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A balance increased.
    Credited {
        /// Account owner.
        user_id: UserId,
        /// Credits added.
        amount: Credits,
        /// Ledger kind.
        kind: LedgerKind,
        /// Journal sequence of the entry.
        seq: EntrySeq,
    },
    /// A balance decreased.
    Debited {
        /// Account owner.
        user_id: UserId,
        /// Credits removed.
        amount: Credits,
        /// Ledger kind.
        kind: LedgerKind,
        /// Journal sequence of the entry.
        seq: EntrySeq,
    },
    /// A translation record was appended.
    TranslationRecorded {
        /// Requesting user.
        user_id: UserId,
        /// Journal sequence of the record.
        seq: EntrySeq,
    },
    /// A journal write failed; `pending` ops are buffered for retry.
    JournalStalled {
        /// Ops waiting to be written.
        pending: usize,
    },
    /// Persistence has reached at least this sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        seq: EntrySeq,
    },
}
