use std::{sync::Arc, time::Duration};

use creditlog::{
    admin::{AdminOps, Principal},
    error::ServiceError,
    pipeline::{FailureReason, Pipeline, RequestState, TranslationRequest},
    provider::{GlossaryProvider, ProviderError, TranslationProvider},
    runtime::handle::{LedgerHandle, RuntimeConfig, spawn_in_memory},
    types::{LangPair, LedgerKind},
};

fn provider() -> GlossaryProvider {
    GlossaryProvider::new([LangPair::new("en", "fr"), LangPair::new("fr", "en")])
        .with_phrase(LangPair::new("en", "fr"), "Hello", "Bonjour")
        .with_phrase(LangPair::new("fr", "en"), "Bonjour", "Hello")
}

fn setup() -> (LedgerHandle, Pipeline) {
    let ledger = spawn_in_memory(RuntimeConfig::default());
    let pipeline = Pipeline::new(ledger.clone(), Arc::new(provider()));
    (ledger, pipeline)
}

async fn grant(ledger: &LedgerHandle, user: &str, amount: u64) {
    AdminOps::authorize(ledger.clone(), &Principal::admin("root"))
        .expect("admin")
        .approve_bonus(user, amount)
        .await
        .expect("bonus");
}

struct BrokenProvider;

impl TranslationProvider for BrokenProvider {
    fn supports(&self, _pair: &LangPair) -> bool {
        true
    }

    fn translate(&self, _text: &str, _pair: &LangPair) -> Result<String, ProviderError> {
        Err(ProviderError::Failed("model crashed".to_string()))
    }
}

struct SlowProvider {
    delay: Duration,
}

impl TranslationProvider for SlowProvider {
    fn supports(&self, _pair: &LangPair) -> bool {
        true
    }

    fn translate(&self, text: &str, _pair: &LangPair) -> Result<String, ProviderError> {
        std::thread::sleep(self.delay);
        Ok(text.to_uppercase())
    }
}

#[tokio::test]
async fn successful_translation_debits_once_and_records_once() {
    let (ledger, pipeline) = setup();
    grant(&ledger, "u", 10).await;

    let report = pipeline
        .run(TranslationRequest::new("u", "Hello", "en", "fr"))
        .await;
    assert_eq!(
        report.states,
        vec![
            RequestState::Created,
            RequestState::Validated,
            RequestState::Affordable,
            RequestState::Debited,
            RequestState::Translated,
            RequestState::Recorded,
            RequestState::Completed,
        ]
    );
    let outcome = report.result.expect("outcome");
    assert_eq!(outcome.output_text, "Bonjour");
    assert_eq!(outcome.cost, 1);

    assert_eq!(ledger.balance("u").await.unwrap(), 9);
    let entries = ledger.transactions(Some("u")).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].amount, -1);
    assert_eq!(entries[1].kind, LedgerKind::TranslationDebit);
    assert_eq!(entries[1].id, outcome.debit_entry_id);

    let records = ledger.translations(Some("u")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].input_text, "Hello");
    assert_eq!(records[0].output_text, "Bonjour");
    assert_eq!(records[0].cost, 1);
    assert_eq!(records[0].id, outcome.record_id);
    assert_eq!(records[0].timestamp, outcome.timestamp);

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn empty_balance_fails_before_any_side_effect() {
    let (ledger, pipeline) = setup();

    let report = pipeline
        .run(TranslationRequest::new("u", "Hello", "en", "fr"))
        .await;
    assert_eq!(
        report.final_state(),
        Some(RequestState::Failed(FailureReason::InsufficientFunds))
    );
    assert!(!report.debited());
    assert!(matches!(
        report.result,
        Err(ServiceError::InsufficientFunds {
            requested: 1,
            available: 0,
            ..
        })
    ));

    assert_eq!(ledger.balance("u").await.unwrap(), 0);
    assert!(ledger.transactions(Some("u")).await.unwrap().is_empty());
    assert!(ledger.translations(Some("u")).await.unwrap().is_empty());
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn unsupported_pair_keeps_the_debit_and_records_nothing() {
    let (ledger, pipeline) = setup();
    grant(&ledger, "u", 1).await;

    let report = pipeline
        .run(TranslationRequest::new("u", "Hello", "en", "de"))
        .await;
    assert!(report.debited());
    assert_eq!(
        report.final_state(),
        Some(RequestState::Failed(FailureReason::UnsupportedLanguagePair))
    );
    let err = report.result.unwrap_err();
    assert_eq!(err.code(), "unsupported_language_pair");

    assert_eq!(ledger.balance("u").await.unwrap(), 0);
    let amounts: Vec<_> = ledger
        .transactions(Some("u"))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.amount)
        .collect();
    assert_eq!(amounts, vec![1, -1]);
    assert!(ledger.translations(Some("u")).await.unwrap().is_empty());
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn provider_failure_is_reported_and_not_refunded() {
    let ledger = spawn_in_memory(RuntimeConfig::default());
    let pipeline = Pipeline::new(ledger.clone(), Arc::new(BrokenProvider));
    grant(&ledger, "u", 3).await;

    let err = pipeline
        .process(TranslationRequest::new("u", "Hello", "en", "fr"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Provider(ref msg) if msg.contains("model crashed")));
    assert_eq!(ledger.balance("u").await.unwrap(), 2);
    assert!(ledger.translations(None).await.unwrap().is_empty());
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn whitespace_input_fails_before_touching_the_wallet() {
    let (ledger, pipeline) = setup();
    grant(&ledger, "u", 5).await;

    for text in ["", "   ", "\n\t"] {
        let report = pipeline
            .run(TranslationRequest::new("u", text, "en", "fr"))
            .await;
        assert_eq!(
            report.states,
            vec![
                RequestState::Created,
                RequestState::Failed(FailureReason::EmptyInput)
            ]
        );
        assert!(matches!(report.result, Err(ServiceError::EmptyInput)));
    }

    assert_eq!(ledger.balance("u").await.unwrap(), 5);
    assert_eq!(ledger.transactions(Some("u")).await.unwrap().len(), 1);
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn resubmitting_a_request_charges_twice() {
    let (ledger, pipeline) = setup();
    grant(&ledger, "u", 10).await;

    let request = TranslationRequest::new("u", "Hello", "en", "fr");
    pipeline.process(request.clone()).await.unwrap();
    pipeline.process(request).await.unwrap();

    assert_eq!(ledger.balance("u").await.unwrap(), 8);
    assert_eq!(ledger.translations(Some("u")).await.unwrap().len(), 2);
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn per_request_cost_override_and_zero_cost() {
    let (ledger, pipeline) = setup();
    let pipeline = pipeline.with_default_cost(2);
    grant(&ledger, "u", 10).await;

    let outcome = pipeline
        .process(TranslationRequest::new("u", "Hello", "en", "fr"))
        .await
        .unwrap();
    assert_eq!(outcome.cost, 2);

    let outcome = pipeline
        .process(TranslationRequest::new("u", "Bonjour", "fr", "en").with_cost(5))
        .await
        .unwrap();
    assert_eq!(outcome.cost, 5);
    assert_eq!(ledger.balance("u").await.unwrap(), 3);

    let err = pipeline
        .process(TranslationRequest::new("u", "Hello", "en", "fr").with_cost(0))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_amount");
    assert_eq!(ledger.balance("u").await.unwrap(), 3);
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn slow_provider_does_not_block_the_users_shard() {
    let ledger = spawn_in_memory(RuntimeConfig::default());
    let pipeline = Pipeline::new(
        ledger.clone(),
        Arc::new(SlowProvider {
            delay: Duration::from_millis(400),
        }),
    );
    grant(&ledger, "u", 5).await;

    let slow = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            pipeline
                .process(TranslationRequest::new("u", "hello", "en", "fr"))
                .await
        }
    });

    let mut events = ledger.subscribe();
    loop {
        let evt = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event")
            .expect("recv");
        if matches!(evt, creditlog::runtime::events::LedgerEvent::Debited { .. }) {
            break;
        }
    }

    let balance = tokio::time::timeout(Duration::from_millis(150), ledger.balance("u"))
        .await
        .expect("shard answered while provider was busy")
        .unwrap();
    assert_eq!(balance, 4);

    let outcome = slow.await.unwrap().unwrap();
    assert_eq!(outcome.output_text, "HELLO");
    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_requests_never_overdraw() {
    let (ledger, pipeline) = setup();
    grant(&ledger, "u", 3).await;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            pipeline
                .process(TranslationRequest::new("u", "Hello", "en", "fr"))
                .await
        }));
    }

    let mut ok = 0;
    let mut broke = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(ServiceError::InsufficientFunds { .. }) => broke += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ok, 3);
    assert_eq!(broke, 7);
    assert_eq!(ledger.balance("u").await.unwrap(), 0);
    assert_eq!(ledger.translations(Some("u")).await.unwrap().len(), 3);
    ledger.shutdown().await.unwrap();
}
