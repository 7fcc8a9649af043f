//! Caller-facing errors.
//!
//! Every failure the pipeline, account and admin operations can produce is
//! folded into [`ServiceError`]. Each variant has its own stable
//! [`code`](ServiceError::code) and [`status`](ServiceError::status) so a
//! transport layer can map it without inspecting messages.
use thiserror::Error;

use crate::{
    core::wallet::LedgerError,
    persist::PersistError,
    provider::ProviderError,
    runtime::handle::RuntimeError,
    types::{Credits, UserId},
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("input text is empty")]
    EmptyInput,
    #[error("insufficient funds for {user_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        user_id: UserId,
        requested: Credits,
        available: Credits,
    },
    #[error("unsupported language pair {source_lang}->{target_lang}")]
    UnsupportedLanguagePair {
        source_lang: String,
        target_lang: String,
    },
    #[error("translation provider failed: {0}")]
    Provider(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("administrator capability required")]
    Forbidden,
}

impl ServiceError {
    /// Stable machine-readable identifier.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::UnsupportedLanguagePair { .. } => "unsupported_language_pair",
            Self::Provider(_) => "provider_error",
            Self::Storage(_) => "storage_error",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::Forbidden => "forbidden",
        }
    }

    /// HTTP-style status for the transport layer.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidAmount(_) => 400,
            Self::InsufficientFunds { .. } => 402,
            Self::Forbidden => 403,
            Self::EmptyInput => 422,
            Self::UnsupportedLanguagePair { .. } => 501,
            Self::Provider(_) => 502,
            Self::Storage(_) => 503,
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InsufficientFunds {
                user_id,
                requested,
                available,
            } => Self::InsufficientFunds {
                user_id,
                requested,
                available,
            },
            LedgerError::InvalidAmount(amount) => {
                Self::InvalidAmount(format!("{amount} is not a positive credit count"))
            }
            LedgerError::BalanceOverflow { user_id } => {
                Self::InvalidAmount(format!("credit would overflow the balance of {user_id}"))
            }
            LedgerError::Replay(msg) => Self::Storage(msg),
        }
    }
}

impl From<RuntimeError> for ServiceError {
    fn from(value: RuntimeError) -> Self {
        match value {
            RuntimeError::Ledger(err) => err.into(),
            RuntimeError::Persist(err) => Self::Storage(err.to_string()),
            RuntimeError::ChannelClosed => Self::Storage("ledger runtime is not running".to_string()),
        }
    }
}

impl From<PersistError> for ServiceError {
    fn from(value: PersistError) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<ProviderError> for ServiceError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::UnsupportedLanguagePair {
                source_lang,
                target_lang,
            } => Self::UnsupportedLanguagePair {
                source_lang,
                target_lang,
            },
            ProviderError::Failed(msg) => Self::Provider(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
