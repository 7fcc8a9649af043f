use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::types::EntrySeq;

/// Journal sequence counter shared by every shard of a ledger.
///
/// Sequences start at 1; 0 means "nothing journaled yet".
#[derive(Debug, Clone)]
pub struct SeqSource {
    next: Arc<AtomicU64>,
}

impl Default for SeqSource {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl SeqSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: EntrySeq) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(next.max(1))),
        }
    }

    pub fn take(&self) -> EntrySeq {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Ensures later sequences are strictly above `seq`.
    pub fn observe(&self, seq: EntrySeq) {
        self.next.fetch_max(seq.saturating_add(1), Ordering::SeqCst);
    }

    pub fn latest(&self) -> EntrySeq {
        self.next.load(Ordering::SeqCst).saturating_sub(1)
    }
}
