mod common;

use ledger_recon::models::{AccountType, EventType, TransferRequest};
use ledger_recon::services::{AccountService, LedgerConfig, LedgerService};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn overdraft_config() -> LedgerConfig {
    LedgerConfig {
        allow_overdraft: true,
        ..LedgerConfig::default()
    }
}

fn request(source: Uuid, dest: Uuid, amount: Decimal) -> TransferRequest {
    TransferRequest {
        source_account_id: source,
        destination_account_id: dest,
        amount,
        currency: "USD".to_string(),
        metadata: serde_json::json!({}),
    }
}

#[tokio::test]
async fn account_creation_seeds_zero_balance() {
    let pool = common::setup_test_db().await;
    let accounts = AccountService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), LedgerConfig::default());

    let account = accounts
        .create("USD", AccountType::Asset, Some(serde_json::json!({"owner": "alice"})))
        .await
        .expect("Failed to create account");

    assert_eq!(account.currency, "USD");
    assert!(accounts.exists(account.id).await.unwrap());

    let balance = ledger
        .account_balance(account.id)
        .await
        .unwrap()
        .expect("Balance row missing");
    assert_eq!(balance.available_balance, Decimal::ZERO);
    assert_eq!(balance.pending_balance, Decimal::ZERO);
    assert_eq!(balance.version, 0);
}

#[tokio::test]
async fn account_creation_rejects_bad_currency() {
    let pool = common::setup_test_db().await;
    let accounts = AccountService::new(pool);

    let result = accounts.create("DOLLARS", AccountType::Asset, None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn transfer_chain_settles_and_conserves_value() {
    let pool = common::setup_test_db().await;
    let accounts = AccountService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), overdraft_config());

    let alice = accounts.create("USD", AccountType::Asset, None).await.unwrap();
    let bob = accounts.create("USD", AccountType::Asset, None).await.unwrap();
    let float = accounts.create("USD", AccountType::Liability, None).await.unwrap();

    // Fund Alice from the float, then shuffle between Alice and Bob.
    let r1 = ledger.transfer(request(float.id, alice.id, dec!(500))).await.unwrap();
    let r2 = ledger.transfer(request(alice.id, bob.id, dec!(100))).await.unwrap();
    let r3 = ledger.transfer(request(bob.id, alice.id, dec!(50))).await.unwrap();
    assert!(r1.success && r2.success && r3.success);

    let alice_balance = ledger.account_balance(alice.id).await.unwrap().unwrap();
    let bob_balance = ledger.account_balance(bob.id).await.unwrap().unwrap();
    let float_balance = ledger.account_balance(float.id).await.unwrap().unwrap();

    assert_eq!(alice_balance.available_balance, dec!(450));
    assert_eq!(bob_balance.available_balance, dec!(50));
    assert_eq!(float_balance.available_balance, dec!(-500));

    // Three transactions, each a distinct debit/credit pair.
    let transaction_ids: Vec<Uuid> = [&r1, &r2, &r3]
        .iter()
        .map(|r| r.transaction_id.unwrap())
        .collect();
    assert_eq!(
        transaction_ids.iter().collect::<std::collections::HashSet<_>>().len(),
        3
    );

    for txn_id in transaction_ids {
        let events = ledger.transaction_events(txn_id).await.unwrap();
        assert_eq!(events.len(), 2);

        let debits: Decimal = events
            .iter()
            .filter(|e| e.event_type == EventType::Debit)
            .map(|e| e.amount)
            .sum();
        let credits: Decimal = events
            .iter()
            .filter(|e| e.event_type == EventType::Credit)
            .map(|e| e.amount)
            .sum();
        assert_eq!(debits, credits);

        let debit = events.iter().find(|e| e.event_type == EventType::Debit).unwrap();
        assert!(debit.source_account_id.is_some());
        assert!(debit.destination_account_id.is_none());
        let credit = events.iter().find(|e| e.event_type == EventType::Credit).unwrap();
        assert!(credit.destination_account_id.is_some());
        assert!(credit.source_account_id.is_none());
    }
}

#[tokio::test]
async fn balance_equals_credits_minus_debits() {
    let pool = common::setup_test_db().await;
    let accounts = AccountService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), overdraft_config());

    let a = accounts.create("USD", AccountType::Asset, None).await.unwrap();
    let b = accounts.create("USD", AccountType::Asset, None).await.unwrap();

    ledger.transfer(request(a.id, b.id, dec!(30))).await.unwrap();
    ledger.transfer(request(b.id, a.id, dec!(12.25))).await.unwrap();
    ledger.transfer(request(a.id, b.id, dec!(7.75))).await.unwrap();

    for account_id in [a.id, b.id] {
        let (credits, debits): (Option<Decimal>, Option<Decimal>) = sqlx::query_as(
            r#"
            SELECT
                SUM(amount) FILTER (WHERE event_type = 'CREDIT' AND destination_account_id = $1),
                SUM(amount) FILTER (WHERE event_type = 'DEBIT' AND source_account_id = $1)
            FROM ledger_events
            WHERE (source_account_id = $1 OR destination_account_id = $1)
              AND status = 'SETTLED'
            "#,
        )
        .bind(account_id)
        .fetch_one(&pool)
        .await
        .unwrap();

        let expected = credits.unwrap_or_default() - debits.unwrap_or_default();
        let balance = ledger.account_balance(account_id).await.unwrap().unwrap();
        assert_eq!(balance.available_balance, expected);
    }
}

#[tokio::test]
async fn insufficient_funds_rejects_without_side_effects() {
    let pool = common::setup_test_db().await;
    let accounts = AccountService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), LedgerConfig::default());

    let alice = accounts.create("USD", AccountType::Asset, None).await.unwrap();
    let bob = accounts.create("USD", AccountType::Asset, None).await.unwrap();

    let outcome = ledger
        .transfer(request(alice.id, bob.id, dec!(10000)))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.errors, vec!["Insufficient funds".to_string()]);
    assert!(outcome.transaction_id.is_none());

    // Atomicity: no events were written and neither balance moved.
    let events = ledger.account_events(alice.id, 100).await.unwrap();
    assert!(events.is_empty());
    let alice_balance = ledger.account_balance(alice.id).await.unwrap().unwrap();
    let bob_balance = ledger.account_balance(bob.id).await.unwrap().unwrap();
    assert_eq!(alice_balance.available_balance, Decimal::ZERO);
    assert_eq!(bob_balance.available_balance, Decimal::ZERO);
    assert_eq!(alice_balance.version, 0);
}

#[tokio::test]
async fn self_transfer_is_rejected() {
    let pool = common::setup_test_db().await;
    let accounts = AccountService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), LedgerConfig::default());

    let alice = accounts.create("USD", AccountType::Asset, None).await.unwrap();

    let outcome = ledger
        .transfer(request(alice.id, alice.id, dec!(10)))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.errors.iter().any(|e| e.contains("same")));
    assert!(ledger.account_events(alice.id, 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn validation_errors_accumulate() {
    let pool = common::setup_test_db().await;
    let ledger = LedgerService::new(pool, LedgerConfig::default());

    // Negative amount against two unknown accounts: three violations.
    let outcome = ledger
        .transfer(request(Uuid::new_v4(), Uuid::new_v4(), dec!(-1)))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.errors.len() >= 3);
    assert!(outcome.errors.iter().any(|e| e.contains("positive")));
    assert!(outcome.errors.iter().any(|e| e.contains("Source account")));
    assert!(outcome.errors.iter().any(|e| e.contains("Destination account")));
}

#[tokio::test]
async fn currency_mismatch_is_reported() {
    let pool = common::setup_test_db().await;
    let accounts = AccountService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), overdraft_config());

    let eur = accounts.create("EUR", AccountType::Asset, None).await.unwrap();
    let usd = accounts.create("USD", AccountType::Asset, None).await.unwrap();

    let outcome = ledger.transfer(request(eur.id, usd.id, dec!(10))).await.unwrap();

    assert!(!outcome.success);
    assert!(outcome
        .errors
        .iter()
        .any(|e| e.contains("source account currency")));
}

#[tokio::test]
async fn overdraft_flag_skips_funds_check() {
    let pool = common::setup_test_db().await;
    let accounts = AccountService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), overdraft_config());

    let a = accounts.create("USD", AccountType::Liability, None).await.unwrap();
    let b = accounts.create("USD", AccountType::Asset, None).await.unwrap();

    let outcome = ledger.transfer(request(a.id, b.id, dec!(250))).await.unwrap();
    assert!(outcome.success);

    let a_balance = ledger.account_balance(a.id).await.unwrap().unwrap();
    assert_eq!(a_balance.available_balance, dec!(-250));
}
