use chrono::Utc;
use uuid::Uuid;

use crate::{
    core::{
        history::HistoryLog,
        seq::SeqSource,
        wallet::{LedgerError, Wallet},
    },
    op::{Op, StoredOp},
    records::{LedgerEntry, TranslationDraft, TranslationRecord},
    types::{Credits, EntrySeq, LedgerKind},
};

/// Authoritative state for one partition of users.
///
/// Owns a [`Wallet`] (balances plus ledger entries) and the translation log.
/// Every mutation also queues a [`StoredOp`] for the journal.
#[derive(Debug, Default)]
pub struct LedgerStore {
    wallet: Wallet,
    translations: HistoryLog<TranslationRecord>,
    pending_ops: Vec<StoredOp>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store drawing journal sequences from a counter shared with other stores.
    pub fn with_seq(seq: SeqSource) -> Self {
        Self {
            wallet: Wallet::with_seq(seq),
            ..Self::default()
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn balance(&self, user_id: &str) -> Credits {
        self.wallet.balance(user_id)
    }

    pub fn can_afford(&self, user_id: &str, amount: Credits) -> bool {
        self.wallet.can_afford(user_id, amount)
    }

    pub fn credit(
        &mut self,
        user_id: &str,
        amount: Credits,
        kind: LedgerKind,
    ) -> Result<(LedgerEntry, StoredOp), LedgerError> {
        let entry = self.wallet.credit(user_id, amount, kind)?;
        let stored = self.journal_entry(&entry);
        Ok((entry, stored))
    }

    /// Atomic check-and-debit.
    pub fn debit(
        &mut self,
        user_id: &str,
        amount: Credits,
        kind: LedgerKind,
    ) -> Result<(LedgerEntry, StoredOp), LedgerError> {
        let entry = self.wallet.debit(user_id, amount, kind)?;
        let stored = self.journal_entry(&entry);
        Ok((entry, stored))
    }

    pub fn record_translation(&mut self, draft: TranslationDraft) -> (TranslationRecord, StoredOp) {
        let record = TranslationRecord {
            id: Uuid::new_v4(),
            seq: self.wallet.seq_source().take(),
            timestamp: Utc::now(),
            user_id: draft.user_id,
            input_text: draft.input_text,
            output_text: draft.output_text,
            source_lang: draft.pair.source,
            target_lang: draft.pair.target,
            cost: draft.cost,
        };
        self.translations.add(record.clone());

        let stored = StoredOp {
            seq: record.seq,
            ts_ms: record.timestamp.timestamp_millis(),
            op: Op::Translation {
                record: record.clone(),
            },
        };
        self.pending_ops.push(stored.clone());
        (record, stored)
    }

    /// Ledger entries for `user_id`, or for everyone, in insertion order.
    pub fn transactions(&self, user_id: Option<&str>) -> Vec<LedgerEntry> {
        match user_id {
            Some(user) => self.wallet.ledger().by_user_cloned(user),
            None => self.wallet.ledger().all_cloned(),
        }
    }

    /// Translation records for `user_id`, or for everyone, in insertion order.
    pub fn translations(&self, user_id: Option<&str>) -> Vec<TranslationRecord> {
        match user_id {
            Some(user) => self.translations.by_user_cloned(user),
            None => self.translations.all_cloned(),
        }
    }

    pub fn translation_log(&self) -> &HistoryLog<TranslationRecord> {
        &self.translations
    }

    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), LedgerError> {
        match stored.op {
            Op::Ledger {
                mut entry,
                balance_after,
            } => {
                entry.seq = stored.seq;
                self.wallet.replay(entry, balance_after)
            }
            Op::Translation { mut record } => {
                record.seq = stored.seq;
                self.wallet.seq_source().observe(record.seq);
                self.translations.add(record);
                Ok(())
            }
        }
    }

    /// Undoes `stored` if it is still the newest change in its log.
    pub fn rollback(&mut self, stored: &StoredOp) -> bool {
        self.pending_ops.retain(|op| op.seq != stored.seq);
        match &stored.op {
            Op::Ledger { .. } => self.wallet.rollback(stored.seq).is_some(),
            Op::Translation { .. } => self.translations.discard_tail(stored.seq).is_some(),
        }
    }

    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    pub fn latest_seq(&self) -> EntrySeq {
        self.wallet.seq_source().latest()
    }

    fn journal_entry(&mut self, entry: &LedgerEntry) -> StoredOp {
        let stored = StoredOp {
            seq: entry.seq,
            ts_ms: entry.timestamp.timestamp_millis(),
            op: Op::Ledger {
                entry: entry.clone(),
                balance_after: self.wallet.balance(&entry.user_id),
            },
        };
        self.pending_ops.push(stored.clone());
        stored
    }
}
