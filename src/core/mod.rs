//! In-memory authoritative ledger state.

/// Append-only history logs and presentation queries.
pub mod history;
/// Journal sequence counter.
pub mod seq;
/// Per-partition store combining wallet and translation log.
pub mod store;
/// Balances and ledger entries.
pub mod wallet;
