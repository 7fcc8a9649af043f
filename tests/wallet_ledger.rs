use creditlog::{
    core::{
        seq::SeqSource,
        store::LedgerStore,
        wallet::{LedgerError, Wallet},
    },
    op::Op,
    records::TranslationDraft,
    types::{LangPair, LedgerKind},
};

fn draft(user: &str, input: &str, output: &str) -> TranslationDraft {
    TranslationDraft {
        user_id: user.to_string(),
        input_text: input.to_string(),
        output_text: output.to_string(),
        pair: LangPair::new("en", "fr"),
        cost: 1,
    }
}

#[test]
fn bonus_on_empty_account_creates_one_entry() {
    let mut wallet = Wallet::new();
    assert_eq!(wallet.balance("u"), 0);

    let entry = wallet.credit("u", 10, LedgerKind::Bonus).unwrap();

    assert_eq!(wallet.balance("u"), 10);
    assert_eq!(entry.amount, 10);
    assert_eq!(entry.kind, LedgerKind::Bonus);
    assert_eq!(wallet.ledger().by_user_cloned("u"), vec![entry]);
}

#[test]
fn each_mutation_applies_delta_once_and_appends_once() {
    let mut wallet = Wallet::new();
    wallet.credit("u", 7, LedgerKind::TopUp).unwrap();
    wallet.debit("u", 3, LedgerKind::Debit).unwrap();
    wallet.debit("u", 4, LedgerKind::TranslationDebit).unwrap();

    assert_eq!(wallet.balance("u"), 0);
    let amounts: Vec<_> = wallet.ledger().by_user("u").iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![7, -3, -4]);

    assert!(matches!(
        wallet.debit("u", 1, LedgerKind::Debit),
        Err(LedgerError::InsufficientFunds { available: 0, .. })
    ));
    assert_eq!(wallet.ledger().len(), 3);
}

#[test]
fn entry_ids_are_unique_and_seqs_increase() {
    let mut wallet = Wallet::new();
    let a = wallet.credit("a", 1, LedgerKind::TopUp).unwrap();
    let b = wallet.credit("b", 1, LedgerKind::TopUp).unwrap();
    let c = wallet.debit("a", 1, LedgerKind::Debit).unwrap();

    assert_ne!(a.id, b.id);
    assert_ne!(b.id, c.id);
    assert!(a.seq < b.seq && b.seq < c.seq);
    assert_eq!(wallet.ledger().by_user_cloned("a"), vec![a, c]);
}

#[test]
fn stores_sharing_a_sequence_never_reuse_numbers() {
    let seq = SeqSource::new();
    let mut left = LedgerStore::with_seq(seq.clone());
    let mut right = LedgerStore::with_seq(seq.clone());

    let (a, _) = left.credit("a", 1, LedgerKind::TopUp).unwrap();
    let (b, _) = right.credit("b", 1, LedgerKind::TopUp).unwrap();
    let (c, _) = left.record_translation(draft("a", "Hello", "Bonjour"));

    assert_eq!((a.seq, b.seq, c.seq), (1, 2, 3));
    assert_eq!(seq.latest(), 3);
}

#[test]
fn store_queues_one_journal_op_per_mutation() {
    let mut store = LedgerStore::new();
    store.credit("u", 5, LedgerKind::Bonus).unwrap();
    let _ = store.debit("u", 9, LedgerKind::Debit).unwrap_err();
    store.debit("u", 2, LedgerKind::TranslationDebit).unwrap();
    store.record_translation(draft("u", "Hello", "Bonjour"));

    let ops = store.drain_pending_ops();
    assert_eq!(ops.len(), 3);
    assert!(matches!(ops[0].op, Op::Ledger { balance_after: 5, .. }));
    assert!(matches!(ops[1].op, Op::Ledger { balance_after: 3, .. }));
    assert!(matches!(ops[2].op, Op::Translation { .. }));
    assert!(store.drain_pending_ops().is_empty());
}

#[test]
fn translation_log_queries_by_owner_in_order() {
    let mut store = LedgerStore::new();
    store.record_translation(draft("a", "Hello", "Bonjour"));
    store.record_translation(draft("b", "Cat", "Chat"));
    store.record_translation(draft("a", "Dog", "Chien"));

    let outputs: Vec<_> = store
        .translations(Some("a"))
        .into_iter()
        .map(|r| r.output_text)
        .collect();
    assert_eq!(outputs, vec!["Bonjour", "Chien"]);
    assert_eq!(store.translations(None).len(), 3);
    assert!(store.translations(Some("c")).is_empty());
}

#[test]
fn replaying_journal_ops_rebuilds_identical_state() {
    let mut store = LedgerStore::new();
    store.credit("a", 10, LedgerKind::Bonus).unwrap();
    store.debit("a", 1, LedgerKind::TranslationDebit).unwrap();
    store.record_translation(draft("a", "Hello", "Bonjour"));
    store.credit("b", 3, LedgerKind::TopUp).unwrap();

    let mut replayed = LedgerStore::new();
    for op in store.drain_pending_ops() {
        replayed.apply_replayed_op(op).unwrap();
    }

    assert_eq!(replayed.balance("a"), 9);
    assert_eq!(replayed.balance("b"), 3);
    assert_eq!(replayed.transactions(None), store.transactions(None));
    assert_eq!(replayed.translations(None), store.translations(None));
    assert_eq!(replayed.latest_seq(), store.latest_seq());

    let (next, _) = replayed.credit("a", 1, LedgerKind::TopUp).unwrap();
    assert_eq!(next.seq, store.latest_seq() + 1);
}
