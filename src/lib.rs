//! Metered translation credits with an append-only audit ledger.
//!
//! Balances live in sharded single-writer tasks; every balance change
//! appends one [`records::LedgerEntry`] and every completed translation one
//! [`records::TranslationRecord`]. Both can be journaled to SQLite.
//!
//! # Examples
//!
//! In-memory usage with [`core::wallet::Wallet`]:
//! ```
//! use creditlog::{core::wallet::Wallet, types::LedgerKind};
//!
//! let mut wallet = Wallet::new();
//! wallet.credit("alice", 10, LedgerKind::Bonus).expect("credit");
//! wallet.debit("alice", 1, LedgerKind::TranslationDebit).expect("debit");
//! assert_eq!(wallet.balance("alice"), 9);
//! assert_eq!(wallet.ledger().by_user("alice").len(), 2);
//! ```
//!
//! Runtime usage with a translation pipeline:
//! ```
//! use std::sync::Arc;
//!
//! use creditlog::{
//!     admin::{AdminOps, Principal},
//!     pipeline::{Pipeline, TranslationRequest},
//!     provider::GlossaryProvider,
//!     runtime::handle::{spawn_in_memory, RuntimeConfig},
//!     types::LangPair,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let ledger = spawn_in_memory(RuntimeConfig::default());
//! let provider = GlossaryProvider::new([LangPair::new("en", "fr")])
//!     .with_phrase(LangPair::new("en", "fr"), "Hello", "Bonjour");
//! let pipeline = Pipeline::new(ledger.clone(), Arc::new(provider));
//!
//! let admin = AdminOps::authorize(ledger.clone(), &Principal::admin("root")).expect("admin");
//! admin.approve_bonus("alice", 10).await.expect("bonus");
//!
//! let outcome = pipeline
//!     .process(TranslationRequest::new("alice", "Hello", "en", "fr"))
//!     .await
//!     .expect("translate");
//! assert_eq!(outcome.output_text, "Bonjour");
//! assert_eq!(ledger.balance("alice").await.expect("balance"), 9);
//! ledger.shutdown().await.expect("shutdown");
//! # }
//! ```

/// End-user account operations.
pub mod account;
/// Capability-checked administrator operations.
pub mod admin;
/// Core in-memory ledger state.
pub mod core;
/// Caller-facing error kinds.
pub mod error;
/// Journal op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Translation request state machine.
pub mod pipeline;
/// Translation provider capability.
pub mod provider;
/// Ledger entries and translation records.
pub mod records;
/// Sharded single-writer runtime handle and events.
pub mod runtime;
/// Layered configuration.
pub mod settings;
/// Shared primitive types and enums.
pub mod types;
