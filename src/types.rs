//! Shared primitive IDs and ledger-related enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Opaque, already-authenticated user identifier.
pub type UserId = String;
/// Non-negative credit count.
pub type Credits = u64;
/// Monotonic journal sequence number shared by every log.
pub type EntrySeq = u64;

/// Reason a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// User-initiated purchase of credits.
    TopUp,
    /// Credits granted by an administrator or at signup.
    Bonus,
    /// Generic debit.
    Debit,
    /// Debit paying for one translation.
    TranslationDebit,
}

impl LedgerKind {
    /// Stable lowercase name, also used as the journal `kind` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopUp => "top_up",
            Self::Bonus => "bonus",
            Self::Debit => "debit",
            Self::TranslationDebit => "translation_debit",
        }
    }
}

impl FromStr for LedgerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "top_up" | "topup" => Ok(Self::TopUp),
            "bonus" => Ok(Self::Bonus),
            "debit" => Ok(Self::Debit),
            "translation_debit" => Ok(Self::TranslationDebit),
            other => Err(format!("unknown ledger kind: {other}")),
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source/target language pair, e.g. `en` → `fr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LangPair {
    /// Source language code.
    pub source: String,
    /// Target language code.
    pub target: String,
}

impl LangPair {
    /// Builds a pair from two language codes.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for LangPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}
