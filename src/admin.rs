//! Privileged operations behind an administrator capability.
//!
//! Authentication happens elsewhere; this module only checks the verified
//! `is_admin` claim carried by a [`Principal`] before handing out
//! [`AdminOps`].

use serde::{Deserialize, Serialize};

use crate::{
    error::{ServiceError, ServiceResult},
    records::{LedgerEntry, TranslationRecord},
    runtime::handle::LedgerHandle,
    types::{Credits, LedgerKind, UserId},
};

/// Authenticated caller identity with its verified claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Principal {
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }
}

/// Operations only an administrator may run.
#[derive(Clone)]
pub struct AdminOps {
    ledger: LedgerHandle,
    actor: UserId,
}

impl AdminOps {
    /// Fails with [`ServiceError::Forbidden`] unless `principal` holds the
    /// admin claim.
    pub fn authorize(ledger: LedgerHandle, principal: &Principal) -> ServiceResult<Self> {
        if !principal.is_admin {
            tracing::warn!(user_id = %principal.user_id, "admin operation refused");
            return Err(ServiceError::Forbidden);
        }
        Ok(Self {
            ledger,
            actor: principal.user_id.clone(),
        })
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub async fn approve_bonus(&self, user_id: &str, amount: Credits) -> ServiceResult<LedgerEntry> {
        let entry = self.ledger.credit(user_id, amount, LedgerKind::Bonus).await?;
        tracing::info!(admin = %self.actor, user_id, amount, "bonus approved");
        Ok(entry)
    }

    pub async fn view_transactions(&self, user_id: Option<&str>) -> ServiceResult<Vec<LedgerEntry>> {
        Ok(self.ledger.transactions(user_id).await?)
    }

    pub async fn view_translations(
        &self,
        user_id: Option<&str>,
    ) -> ServiceResult<Vec<TranslationRecord>> {
        Ok(self.ledger.translations(user_id).await?)
    }

    pub async fn balance(&self, user_id: &str) -> ServiceResult<Credits> {
        Ok(self.ledger.balance(user_id).await?)
    }
}
