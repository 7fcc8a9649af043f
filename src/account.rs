//! End-user account operations.

use crate::{
    core::history::HistoryQuery,
    error::{ServiceError, ServiceResult},
    records::{LedgerEntry, TranslationRecord},
    runtime::handle::LedgerHandle,
    types::{Credits, LedgerKind},
};

/// Credits granted when an account is opened.
pub const DEFAULT_SIGNUP_GRANT: Credits = 10;

#[derive(Clone)]
pub struct AccountOps {
    ledger: LedgerHandle,
    signup_grant: Credits,
}

impl AccountOps {
    pub fn new(ledger: LedgerHandle) -> Self {
        Self {
            ledger,
            signup_grant: DEFAULT_SIGNUP_GRANT,
        }
    }

    pub fn with_signup_grant(mut self, grant: Credits) -> Self {
        self.signup_grant = grant;
        self
    }

    /// Records the signup grant for a freshly created user.
    ///
    /// The identity layer calls this once per user. A zero grant leaves the
    /// ledger untouched; the balance is implicitly 0 either way.
    pub async fn open_account(&self, user_id: &str) -> ServiceResult<Option<LedgerEntry>> {
        if self.signup_grant == 0 {
            return Ok(None);
        }
        let entry = self
            .ledger
            .credit(user_id, self.signup_grant, LedgerKind::Bonus)
            .await?;
        tracing::info!(user_id, grant = self.signup_grant, "account opened");
        Ok(Some(entry))
    }

    pub async fn balance(&self, user_id: &str) -> ServiceResult<Credits> {
        Ok(self.ledger.balance(user_id).await?)
    }

    pub async fn top_up(&self, user_id: &str, amount: Credits) -> ServiceResult<LedgerEntry> {
        if amount == 0 {
            return Err(ServiceError::InvalidAmount(
                "top-up amount must be positive".to_string(),
            ));
        }
        let entry = self.ledger.credit(user_id, amount, LedgerKind::TopUp).await?;
        tracing::info!(user_id, amount, "balance topped up");
        Ok(entry)
    }

    /// The user's own ledger entries, filtered and paged by `query`.
    pub async fn transactions(
        &self,
        user_id: &str,
        query: &HistoryQuery,
    ) -> ServiceResult<Vec<LedgerEntry>> {
        let mut entries = self.ledger.transactions(Some(user_id)).await?;
        if let Some(kind) = query.kind {
            entries.retain(|entry| entry.kind == kind);
        }
        Ok(query.page(entries))
    }

    /// The user's own translations, paged by `query`.
    pub async fn translations(
        &self,
        user_id: &str,
        query: &HistoryQuery,
    ) -> ServiceResult<Vec<TranslationRecord>> {
        let records = self.ledger.translations(Some(user_id)).await?;
        Ok(query.page(records))
    }
}
