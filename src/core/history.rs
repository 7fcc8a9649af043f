use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    records::HistoryItem,
    types::{EntrySeq, LedgerKind, UserId},
};

/// Upper bound on a single history page.
pub const MAX_PAGE_LIMIT: usize = 200;
/// Page size used when a query does not name one.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Append-only log with an owner index.
///
/// Entries are kept in insertion order; `by_user` stores positions into that
/// order so per-user reads never scan the whole log.
#[derive(Debug, Clone)]
pub struct HistoryLog<T> {
    entries: Vec<T>,
    by_user: HashMap<UserId, Vec<usize>>,
}

impl<T> Default for HistoryLog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_user: HashMap::new(),
        }
    }
}

impl<T: HistoryItem + Clone> HistoryLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` and returns a reference to the stored copy.
    pub fn add(&mut self, entry: T) -> &T {
        let pos = self.entries.len();
        self.by_user
            .entry(entry.user_id().to_string())
            .or_default()
            .push(pos);
        self.entries.push(entry);
        &self.entries[pos]
    }

    pub fn by_user(&self, user_id: &str) -> Vec<&T> {
        self.by_user
            .get(user_id)
            .into_iter()
            .flat_map(|positions| positions.iter())
            .filter_map(|pos| self.entries.get(*pos))
            .collect()
    }

    pub fn by_user_cloned(&self, user_id: &str) -> Vec<T> {
        self.by_user(user_id).into_iter().cloned().collect()
    }

    pub fn all(&self) -> &[T] {
        &self.entries
    }

    pub fn all_cloned(&self) -> Vec<T> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes the tail entry if it carries `seq`.
    ///
    /// Only used to undo an append whose journal write was rejected before
    /// any reader could observe it.
    pub(crate) fn discard_tail(&mut self, seq: EntrySeq) -> Option<T> {
        if self.entries.last().map(HistoryItem::seq) != Some(seq) {
            return None;
        }
        let entry = self.entries.pop()?;
        let pos = self.entries.len();
        if let Some(positions) = self.by_user.get_mut(entry.user_id()) {
            if positions.last() == Some(&pos) {
                positions.pop();
            }
            if positions.is_empty() {
                self.by_user.remove(entry.user_id());
            }
        }
        Some(entry)
    }
}

/// Presentation order for history listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Insertion order.
    OldestFirst,
    /// Reverse insertion order.
    #[default]
    NewestFirst,
}

/// Filter and paging applied at the presentation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Only keep ledger entries of this kind.
    pub kind: Option<LedgerKind>,
    /// Output order.
    pub order: Order,
    /// Page size, clamped to `1..=MAX_PAGE_LIMIT`.
    pub limit: usize,
    /// Entries skipped before the page starts.
    pub offset: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            kind: None,
            order: Order::NewestFirst,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl HistoryQuery {
    /// Every entry in insertion order, unpaged.
    pub fn everything() -> Self {
        Self {
            kind: None,
            order: Order::OldestFirst,
            limit: usize::MAX,
            offset: 0,
        }
    }

    /// Orders and pages `items`, which must be in insertion order.
    pub fn page<T: HistoryItem>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.order == Order::NewestFirst {
            items.reverse();
        }
        let limit = if self.limit == usize::MAX {
            usize::MAX
        } else {
            self.limit.clamp(1, MAX_PAGE_LIMIT)
        };
        items.into_iter().skip(self.offset).take(limit).collect()
    }
}
