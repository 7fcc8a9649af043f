use hashbrown::HashMap;
use proptest::prelude::*;

use creditlog::{
    core::{store::LedgerStore, wallet::LedgerError},
    records::LedgerEntry,
    types::{EntrySeq, LedgerKind},
};

#[derive(Debug, Clone)]
enum Action {
    Credit { user: u8, amount: u16, bonus: bool },
    Debit { user: u8, amount: u16 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..6, 0u16..50, any::<bool>())
            .prop_map(|(user, amount, bonus)| Action::Credit { user, amount, bonus }),
        (0u8..6, 0u16..80).prop_map(|(user, amount)| Action::Debit { user, amount }),
    ]
}

fn user_name(user: u8) -> String {
    format!("user-{user}")
}

fn full_scan_by_user(store: &LedgerStore, user: &str) -> Vec<EntrySeq> {
    store
        .transactions(None)
        .into_iter()
        .filter(|e| e.user_id == user)
        .map(|e| e.seq)
        .collect()
}

fn by_user_seqs(store: &LedgerStore, user: &str) -> Vec<EntrySeq> {
    store
        .transactions(Some(user))
        .into_iter()
        .map(|e| e.seq)
        .collect()
}

fn ledger_sum(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(|e| e.amount).sum()
}

proptest! {
    #[test]
    fn random_sequences_keep_balances_non_negative_and_entries_exact(actions in prop::collection::vec(action_strategy(), 1..200)) {
        let mut store = LedgerStore::new();
        let mut model: HashMap<String, u64> = HashMap::new();

        for action in actions {
            let before_len = store.transactions(None).len();
            match action {
                Action::Credit { user, amount, bonus } => {
                    let user = user_name(user);
                    let kind = if bonus { LedgerKind::Bonus } else { LedgerKind::TopUp };
                    match store.credit(&user, u64::from(amount), kind) {
                        Ok((entry, _)) => {
                            prop_assert!(amount > 0);
                            prop_assert_eq!(entry.amount, i64::from(amount));
                            *model.entry(user.clone()).or_default() += u64::from(amount);
                            prop_assert_eq!(store.transactions(None).len(), before_len + 1);
                        }
                        Err(LedgerError::InvalidAmount(0)) => {
                            prop_assert_eq!(amount, 0);
                            prop_assert_eq!(store.transactions(None).len(), before_len);
                        }
                        Err(other) => {
                            prop_assert!(false, "unexpected credit error: {other:?}");
                        }
                    }
                }
                Action::Debit { user, amount } => {
                    let user = user_name(user);
                    let held = model.get(&user).copied().unwrap_or(0);
                    match store.debit(&user, u64::from(amount), LedgerKind::Debit) {
                        Ok((entry, _)) => {
                            prop_assert!(amount > 0 && u64::from(amount) <= held);
                            prop_assert_eq!(entry.amount, -i64::from(amount));
                            model.insert(user.clone(), held - u64::from(amount));
                            prop_assert_eq!(store.transactions(None).len(), before_len + 1);
                        }
                        Err(LedgerError::InsufficientFunds { available, .. }) => {
                            prop_assert!(u64::from(amount) > held);
                            prop_assert_eq!(available, held);
                            prop_assert_eq!(store.transactions(None).len(), before_len);
                        }
                        Err(LedgerError::InvalidAmount(0)) => {
                            prop_assert_eq!(amount, 0);
                        }
                        Err(other) => {
                            prop_assert!(false, "unexpected debit error: {other:?}");
                        }
                    }
                }
            }

            for user in 0u8..6 {
                let name = user_name(user);
                let expected = model.get(&name).copied().unwrap_or(0);
                prop_assert_eq!(store.balance(&name), expected);
                prop_assert_eq!(
                    ledger_sum(&store.transactions(Some(&name))),
                    i64::try_from(expected).unwrap_or(i64::MAX)
                );
                prop_assert_eq!(by_user_seqs(&store, &name), full_scan_by_user(&store, &name));
            }
        }
    }
}
