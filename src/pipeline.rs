//! Translation request pipeline.
//!
//! A request moves through
//! `Created → Validated → Affordable → Debited → Translated → Recorded → Completed`
//! and stops at `Failed` on the first error. The debit is committed before
//! the provider runs and is never reversed by the pipeline: a provider
//! failure, an unsupported pair, or a caller dropping the future after the
//! debit all leave the charge in place. Re-submitting a request charges
//! again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ServiceError, ServiceResult},
    provider::TranslationProvider,
    records::TranslationDraft,
    runtime::handle::LedgerHandle,
    types::{Credits, LangPair, LedgerKind, UserId},
};

/// Default price of one translation.
pub const DEFAULT_TRANSLATION_COST: Credits = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub user_id: UserId,
    pub input_text: String,
    pub source_lang: String,
    pub target_lang: String,
    /// Overrides the pipeline's default cost.
    pub cost: Option<Credits>,
}

impl TranslationRequest {
    pub fn new(
        user_id: impl Into<UserId>,
        input_text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            input_text: input_text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            cost: None,
        }
    }

    pub fn with_cost(mut self, cost: Credits) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn pair(&self) -> LangPair {
        LangPair::new(self.source_lang.clone(), self.target_lang.clone())
    }
}

/// Why a request ended in [`RequestState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    EmptyInput,
    InvalidAmount,
    InsufficientFunds,
    UnsupportedLanguagePair,
    ProviderError,
    StorageError,
    Forbidden,
}

impl From<&ServiceError> for FailureReason {
    fn from(value: &ServiceError) -> Self {
        match value {
            ServiceError::EmptyInput => Self::EmptyInput,
            ServiceError::InvalidAmount(_) => Self::InvalidAmount,
            ServiceError::InsufficientFunds { .. } => Self::InsufficientFunds,
            ServiceError::UnsupportedLanguagePair { .. } => Self::UnsupportedLanguagePair,
            ServiceError::Provider(_) => Self::ProviderError,
            ServiceError::Storage(_) => Self::StorageError,
            ServiceError::Forbidden => Self::Forbidden,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    Validated,
    Affordable,
    Debited,
    Translated,
    Recorded,
    Completed,
    Failed(FailureReason),
}

/// Successful result handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationOutcome {
    pub output_text: String,
    pub cost: Credits,
    pub timestamp: DateTime<Utc>,
    pub record_id: Uuid,
    pub debit_entry_id: Uuid,
}

/// Every state a request passed through, plus its result.
#[derive(Debug)]
pub struct RequestReport {
    pub states: Vec<RequestState>,
    pub result: ServiceResult<TranslationOutcome>,
}

impl RequestReport {
    pub fn final_state(&self) -> Option<RequestState> {
        self.states.last().copied()
    }

    /// True when the request got far enough to charge the user.
    pub fn debited(&self) -> bool {
        self.states.contains(&RequestState::Debited)
    }
}

struct Trace<'a> {
    user_id: &'a str,
    states: Vec<RequestState>,
}

impl<'a> Trace<'a> {
    fn new(user_id: &'a str) -> Self {
        Self {
            user_id,
            states: vec![RequestState::Created],
        }
    }

    fn advance(&mut self, state: RequestState) {
        tracing::debug!(user_id = self.user_id, state = ?state, "translation request transition");
        self.states.push(state);
    }
}

/// Orchestrates validation, charging, translation and record-keeping.
#[derive(Clone)]
pub struct Pipeline {
    ledger: LedgerHandle,
    provider: Arc<dyn TranslationProvider>,
    default_cost: Credits,
}

impl Pipeline {
    pub fn new(ledger: LedgerHandle, provider: Arc<dyn TranslationProvider>) -> Self {
        Self {
            ledger,
            provider,
            default_cost: DEFAULT_TRANSLATION_COST,
        }
    }

    pub fn with_default_cost(mut self, cost: Credits) -> Self {
        self.default_cost = cost;
        self
    }

    pub fn default_cost(&self) -> Credits {
        self.default_cost
    }

    pub async fn process(&self, request: TranslationRequest) -> ServiceResult<TranslationOutcome> {
        self.run(request).await.result
    }

    /// Like [`Pipeline::process`] but also returns the visited states.
    pub async fn run(&self, request: TranslationRequest) -> RequestReport {
        let mut trace = Trace::new(&request.user_id);
        let result = self.drive(&request, &mut trace).await;
        if let Err(err) = &result {
            tracing::warn!(
                user_id = %request.user_id,
                code = err.code(),
                error = %err,
                "translation request failed"
            );
            trace.advance(RequestState::Failed(FailureReason::from(err)));
        }
        RequestReport {
            states: trace.states,
            result,
        }
    }

    async fn drive(
        &self,
        request: &TranslationRequest,
        trace: &mut Trace<'_>,
    ) -> ServiceResult<TranslationOutcome> {
        let user_id = request.user_id.as_str();
        let cost = request.cost.unwrap_or(self.default_cost);

        if request.input_text.trim().is_empty() {
            return Err(ServiceError::EmptyInput);
        }
        if cost == 0 {
            return Err(ServiceError::InvalidAmount(
                "translation cost must be positive".to_string(),
            ));
        }
        trace.advance(RequestState::Validated);

        if !self.ledger.can_afford(user_id, cost).await? {
            let available = self.ledger.balance(user_id).await?;
            return Err(ServiceError::InsufficientFunds {
                user_id: user_id.to_string(),
                requested: cost,
                available,
            });
        }
        trace.advance(RequestState::Affordable);

        // Re-checks the balance atomically; a concurrent request may have
        // spent it since the affordability check.
        let debit = self
            .ledger
            .debit(user_id, cost, LedgerKind::TranslationDebit)
            .await?;
        trace.advance(RequestState::Debited);

        let pair = request.pair();
        let provider = Arc::clone(&self.provider);
        let text = request.input_text.clone();
        let provider_pair = pair.clone();
        let translated = tokio::task::spawn_blocking(move || provider.translate(&text, &provider_pair))
            .await
            .map_err(|e| ServiceError::Provider(format!("provider task failed: {e}")))?;
        let output_text = match translated {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    user_id,
                    debit_seq = debit.seq,
                    pair = %pair,
                    "provider failed after debit; charge stands"
                );
                return Err(err.into());
            }
        };
        trace.advance(RequestState::Translated);

        let record = self
            .ledger
            .record_translation(TranslationDraft {
                user_id: user_id.to_string(),
                input_text: request.input_text.clone(),
                output_text,
                pair,
                cost,
            })
            .await?;
        trace.advance(RequestState::Recorded);

        tracing::info!(
            user_id,
            cost,
            record_id = %record.id,
            pair = %record.pair(),
            "translation completed"
        );
        trace.advance(RequestState::Completed);

        Ok(TranslationOutcome {
            output_text: record.output_text,
            cost,
            timestamp: record.timestamp,
            record_id: record.id,
            debit_entry_id: debit.id,
        })
    }
}
