//! Immutable audit records: ledger entries and translation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Credits, EntrySeq, LangPair, LedgerKind, UserId};

/// Record stored in a [`crate::core::history::HistoryLog`].
pub trait HistoryItem {
    /// Owner of the record.
    fn user_id(&self) -> &str;
    /// Journal sequence at which the record was appended.
    fn seq(&self) -> EntrySeq;
    /// Wall-clock time of the underlying event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// One balance mutation. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// Journal sequence.
    pub seq: EntrySeq,
    /// Time of the mutation.
    pub timestamp: DateTime<Utc>,
    /// Account owner.
    pub user_id: UserId,
    /// Signed delta applied to the balance.
    pub amount: i64,
    /// Reason for the mutation.
    pub kind: LedgerKind,
}

impl HistoryItem for LedgerEntry {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn seq(&self) -> EntrySeq {
        self.seq
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One completed translation. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// Unique record id.
    pub id: Uuid,
    /// Journal sequence.
    pub seq: EntrySeq,
    /// Time the translation was recorded.
    pub timestamp: DateTime<Utc>,
    /// Requesting user.
    pub user_id: UserId,
    /// Text submitted for translation.
    pub input_text: String,
    /// Text returned by the provider.
    pub output_text: String,
    /// Source language code.
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
    /// Credits charged.
    pub cost: Credits,
}

impl TranslationRecord {
    /// Language pair of this translation.
    pub fn pair(&self) -> LangPair {
        LangPair::new(self.source_lang.clone(), self.target_lang.clone())
    }
}

impl HistoryItem for TranslationRecord {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn seq(&self) -> EntrySeq {
        self.seq
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Payload used to append a new [`TranslationRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationDraft {
    /// Requesting user.
    pub user_id: UserId,
    /// Text submitted for translation.
    pub input_text: String,
    /// Text returned by the provider.
    pub output_text: String,
    /// Language pair used.
    pub pair: LangPair,
    /// Credits charged.
    pub cost: Credits,
}
