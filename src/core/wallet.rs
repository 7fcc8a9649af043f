use chrono::Utc;
use hashbrown::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    core::{history::HistoryLog, seq::SeqSource},
    records::LedgerEntry,
    types::{Credits, EntrySeq, LedgerKind, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid amount: {0} (must be a positive credit count)")]
    InvalidAmount(Credits),
    #[error("insufficient funds for {user_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        user_id: UserId,
        requested: Credits,
        available: Credits,
    },
    #[error("balance overflow for {user_id}")]
    BalanceOverflow { user_id: UserId },
    #[error("replay failed: {0}")]
    Replay(String),
}

/// Balance of record and sole writer of ledger entries.
///
/// Every successful `credit`/`debit` changes exactly one balance and appends
/// exactly one [`LedgerEntry`]; both happen before the method returns, so no
/// caller sees one without the other.
#[derive(Debug, Default)]
pub struct Wallet {
    balances: HashMap<UserId, Credits>,
    ledger: HistoryLog<LedgerEntry>,
    seq: SeqSource,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seq(seq: SeqSource) -> Self {
        Self {
            seq,
            ..Self::default()
        }
    }

    /// Current balance, 0 for unknown users.
    pub fn balance(&self, user_id: &str) -> Credits {
        self.balances.get(user_id).copied().unwrap_or(0)
    }

    pub fn can_afford(&self, user_id: &str, amount: Credits) -> bool {
        self.balance(user_id) >= amount
    }

    pub fn credit(
        &mut self,
        user_id: &str,
        amount: Credits,
        kind: LedgerKind,
    ) -> Result<LedgerEntry, LedgerError> {
        let delta = signed(amount)?;
        let balance = self
            .balance(user_id)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                user_id: user_id.to_string(),
            })?;
        Ok(self.commit(user_id, delta, balance, kind))
    }

    pub fn debit(
        &mut self,
        user_id: &str,
        amount: Credits,
        kind: LedgerKind,
    ) -> Result<LedgerEntry, LedgerError> {
        let delta = signed(amount)?;
        let available = self.balance(user_id);
        let balance = available
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientFunds {
                user_id: user_id.to_string(),
                requested: amount,
                available,
            })?;
        Ok(self.commit(user_id, -delta, balance, kind))
    }

    pub fn ledger(&self) -> &HistoryLog<LedgerEntry> {
        &self.ledger
    }

    pub fn seq_source(&self) -> &SeqSource {
        &self.seq
    }

    /// Re-applies a journaled entry, checking it lands on `balance_after`.
    pub(crate) fn replay(&mut self, entry: LedgerEntry, balance_after: Credits) -> Result<(), LedgerError> {
        let before = self.balance(&entry.user_id);
        let expected = apply_delta(before, entry.amount).ok_or_else(|| {
            LedgerError::Replay(format!(
                "entry {} (seq {}) would leave {} negative",
                entry.id, entry.seq, entry.user_id
            ))
        })?;
        if expected != balance_after {
            return Err(LedgerError::Replay(format!(
                "entry {} (seq {}) expected balance {balance_after}, replay computed {expected}",
                entry.id, entry.seq
            )));
        }

        self.seq.observe(entry.seq);
        self.balances.insert(entry.user_id.clone(), balance_after);
        self.ledger.add(entry);
        Ok(())
    }

    /// Reverts the most recent entry if it carries `seq`.
    pub(crate) fn rollback(&mut self, seq: EntrySeq) -> Option<LedgerEntry> {
        let entry = self.ledger.discard_tail(seq)?;
        let current = self.balance(&entry.user_id);
        let restored = apply_delta(current, -entry.amount).unwrap_or(0);
        self.balances.insert(entry.user_id.clone(), restored);
        Some(entry)
    }

    fn commit(&mut self, user_id: &str, amount: i64, balance: Credits, kind: LedgerKind) -> LedgerEntry {
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            seq: self.seq.take(),
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            amount,
            kind,
        };
        self.balances.insert(user_id.to_string(), balance);
        self.ledger.add(entry).clone()
    }
}

fn signed(amount: Credits) -> Result<i64, LedgerError> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    i64::try_from(amount).map_err(|_| LedgerError::InvalidAmount(amount))
}

fn apply_delta(balance: Credits, delta: i64) -> Option<Credits> {
    if delta >= 0 {
        balance.checked_add(delta.unsigned_abs())
    } else {
        balance.checked_sub(delta.unsigned_abs())
    }
}
