//! Money-movement scenarios, written once and run against every backend.

use std::collections::HashSet;

use shopbank::{
    app::AppState,
    error::AppError,
    models::{transaction::TransactionType, user::Role},
};
use tokio::task::JoinSet;

use super::{account, balance_of, product, stock_of, user};

pub async fn deposit_adds_to_balance_and_logs_one_entry(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let a = account(&state, alice, 10_000).await;

    let receipt = state
        .transactions
        .execute_deposit(alice, a.id, 5_000)
        .await
        .unwrap();

    assert_eq!(receipt.account.balance, 15_000);
    assert_eq!(balance_of(&state, a.id).await.balance, 15_000);
    assert_eq!(receipt.transaction.transaction_type, TransactionType::Deposit);
    assert_eq!(receipt.transaction.total_amount, 5_000);
    assert_eq!(receipt.transaction.product_id, None);

    let statement = state
        .transactions
        .account_statement(alice, a.id)
        .await
        .unwrap();
    assert_eq!(statement.len(), 2);
    assert_eq!(statement[0].id, receipt.transaction.id);
}

pub async fn transfer_moves_money_and_logs_a_linked_pair(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let bob = user(&state.store, "bob", Role::User).await;
    let a = account(&state, alice, 10_000).await;
    let b = account(&state, bob, 0).await;

    let receipt = state
        .transactions
        .execute_transfer(alice, a.id, b.id, 3_000)
        .await
        .unwrap();

    assert_eq!(balance_of(&state, a.id).await.balance, 7_000);
    assert_eq!(balance_of(&state, b.id).await.balance, 3_000);
    assert_eq!(receipt.from_account.balance, 7_000);

    let (out, credit) = (&receipt.transfer_out, &receipt.transfer_in);
    assert_eq!(out.transaction_type, TransactionType::TransferOut);
    assert_eq!(credit.transaction_type, TransactionType::TransferIn);
    assert_eq!((out.account_id, out.user_id), (a.id, alice));
    assert_eq!((credit.account_id, credit.user_id), (b.id, bob));
    assert_eq!(out.total_amount, 3_000);
    assert_eq!(credit.total_amount, 3_000);
    assert!(out.group_id.is_some());
    assert_eq!(out.group_id, credit.group_id);
    assert_eq!(out.counterparty_account_id, Some(b.id));
    assert_eq!(credit.counterparty_account_id, Some(a.id));

    // The recipient sees the credit in their own history
    let bob_history = state.transactions.purchase_history(bob).await.unwrap();
    assert_eq!(bob_history.len(), 1);
    assert_eq!(bob_history[0].id, credit.id);
}

pub async fn overdrawing_transfer_changes_nothing(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let bob = user(&state.store, "bob", Role::User).await;
    let a = account(&state, alice, 1_000).await;
    let b = account(&state, bob, 0).await;

    let err = state
        .transactions
        .execute_transfer(alice, a.id, b.id, 1_500)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientFunds), "{err:?}");
    assert_eq!(balance_of(&state, a.id).await.balance, 1_000);
    assert_eq!(balance_of(&state, b.id).await.balance, 0);

    let a_log = state.store.list_transactions_by_account(a.id).await.unwrap();
    let b_log = state.store.list_transactions_by_account(b.id).await.unwrap();
    assert_eq!(a_log.len(), 1, "only the funding deposit");
    assert!(b_log.is_empty());
}

pub async fn purchase_debits_account_and_decrements_stock(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let a = account(&state, alice, 10_000).await;
    let p = product(&state.store, 2_000, 5).await;

    let receipt = state
        .transactions
        .execute_purchase(alice, a.id, p.id, 3)
        .await
        .unwrap();

    assert_eq!(receipt.account.balance, 4_000);
    assert_eq!(receipt.product.stock, 2);
    assert_eq!(stock_of(&state, p.id).await, 2);

    let entry = &receipt.transaction;
    assert_eq!(entry.transaction_type, TransactionType::Purchase);
    assert_eq!(entry.product_id, Some(p.id));
    assert_eq!(entry.quantity, Some(3));
    assert_eq!(entry.unit_price, Some(2_000));
    assert_eq!(entry.total_amount, 6_000);
}

pub async fn failed_purchase_changes_nothing(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let a = account(&state, alice, 1_000).await;
    let cheap_but_scarce = product(&state.store, 100, 2).await;
    let pricey = product(&state.store, 5_000, 10).await;

    let err = state
        .transactions
        .execute_purchase(alice, a.id, cheap_but_scarce.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OutOfStock), "{err:?}");

    let err = state
        .transactions
        .execute_purchase(alice, a.id, pricey.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds), "{err:?}");

    assert_eq!(balance_of(&state, a.id).await.balance, 1_000);
    assert_eq!(stock_of(&state, cheap_but_scarce.id).await, 2);
    assert_eq!(stock_of(&state, pricey.id).await, 10);
    assert_eq!(state.transactions.purchase_history(alice).await.unwrap().len(), 1);
}

pub async fn last_unit_is_sold_exactly_once(state: AppState) {
    let p = product(&state.store, 2_000, 1).await;
    let alice = user(&state.store, "alice", Role::User).await;
    let bob = user(&state.store, "bob", Role::User).await;
    let a = account(&state, alice, 10_000).await;
    let b = account(&state, bob, 10_000).await;

    let (first, second) = tokio::join!(
        state.transactions.execute_purchase(alice, a.id, p.id, 1),
        state.transactions.execute_purchase(bob, b.id, p.id, 1),
    );

    let outcomes = [first, second];
    let sold = outcomes.iter().filter(|r| r.is_ok()).count();
    let rejected = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::OutOfStock)))
        .count();
    assert_eq!((sold, rejected), (1, 1));

    assert_eq!(stock_of(&state, p.id).await, 0);
    let total_left = balance_of(&state, a.id).await.balance + balance_of(&state, b.id).await.balance;
    assert_eq!(total_left, 20_000 - 2_000);
}

pub async fn concurrent_purchases_never_oversell(state: AppState) {
    const STOCK: i32 = 5;
    const BUYERS: usize = 20;

    let p = product(&state.store, 300, STOCK).await;
    let mut buyers = Vec::new();
    for _ in 0..BUYERS {
        let id = user(&state.store, "buyer", Role::User).await;
        buyers.push((id, account(&state, id, 1_000).await.id));
    }

    let mut tasks = JoinSet::new();
    for (buyer, account_id) in buyers.clone() {
        let service = state.transactions.clone();
        tasks.spawn(async move { service.execute_purchase(buyer, account_id, p.id, 1).await });
    }

    let mut sold = 0;
    let mut out_of_stock = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            Ok(_) => sold += 1,
            Err(AppError::OutOfStock) => out_of_stock += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    assert_eq!(sold, STOCK as usize);
    assert_eq!(out_of_stock, BUYERS - STOCK as usize);
    assert_eq!(stock_of(&state, p.id).await, 0);

    let mut spent = 0;
    for (_, account_id) in &buyers {
        spent += 1_000 - balance_of(&state, *account_id).await.balance;
    }
    assert_eq!(spent, 300 * i64::from(STOCK));
}

pub async fn concurrent_purchases_never_overdraw(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let a = account(&state, alice, 1_000).await;
    let p = product(&state.store, 300, 100).await;

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let service = state.transactions.clone();
        tasks.spawn(async move { service.execute_purchase(alice, a.id, p.id, 1).await });
    }

    let mut sold = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            Ok(_) => sold += 1,
            Err(AppError::InsufficientFunds) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    assert_eq!(sold, 3);
    assert_eq!(balance_of(&state, a.id).await.balance, 100);
    assert_eq!(stock_of(&state, p.id).await, 97);
}

pub async fn concurrent_deposits_are_never_lost(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let a = account(&state, alice, 0).await;

    let mut tasks = JoinSet::new();
    for i in 1..=50_i64 {
        let service = state.transactions.clone();
        tasks.spawn(async move { service.execute_deposit(alice, a.id, i).await });
    }
    while let Some(outcome) = tasks.join_next().await {
        outcome.unwrap().unwrap();
    }

    // 1 + 2 + ... + 50
    assert_eq!(balance_of(&state, a.id).await.balance, 1_275);

    let log = state.store.list_transactions_by_account(a.id).await.unwrap();
    assert_eq!(log.len(), 50);
    assert_eq!(log.iter().map(|t| t.total_amount).sum::<i64>(), 1_275);
}

pub async fn opposite_transfers_do_not_deadlock(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let bob = user(&state.store, "bob", Role::User).await;
    let a = account(&state, alice, 10_000).await;
    let b = account(&state, bob, 10_000).await;

    let mut tasks = JoinSet::new();
    for _ in 0..40 {
        let service = state.transactions.clone();
        tasks.spawn(async move { service.execute_transfer(alice, a.id, b.id, 100).await });
        let service = state.transactions.clone();
        tasks.spawn(async move { service.execute_transfer(bob, b.id, a.id, 100).await });
    }
    while let Some(outcome) = tasks.join_next().await {
        outcome.unwrap().unwrap();
    }

    assert_eq!(balance_of(&state, a.id).await.balance, 10_000);
    assert_eq!(balance_of(&state, b.id).await.balance, 10_000);

    // Every transfer left exactly one entry on each side
    let a_log = state.store.list_transactions_by_account(a.id).await.unwrap();
    let groups: HashSet<_> = a_log.iter().filter_map(|t| t.group_id).collect();
    assert_eq!(a_log.len(), 1 + 80);
    assert_eq!(groups.len(), 80);
}

pub async fn mixed_load_conserves_money(state: AppState) {
    enum Moved {
        Internal,
        In(i64),
        Out(i64),
    }

    let alice = user(&state.store, "alice", Role::User).await;
    let bob = user(&state.store, "bob", Role::User).await;
    let a = account(&state, alice, 5_000).await;
    let b = account(&state, bob, 5_000).await;
    let p = product(&state.store, 250, 1_000).await;

    let mut tasks = JoinSet::new();
    for i in 0..30 {
        let service = state.transactions.clone();
        tasks.spawn(async move {
            match i % 3 {
                0 => service
                    .execute_transfer(alice, a.id, b.id, 700)
                    .await
                    .map(|_| Moved::Internal),
                1 => service
                    .execute_purchase(bob, b.id, p.id, 2)
                    .await
                    .map(|r| Moved::Out(r.transaction.total_amount)),
                _ => service
                    .execute_deposit(alice, a.id, 100)
                    .await
                    .map(|r| Moved::In(r.transaction.total_amount)),
            }
        });
    }

    let mut spent = 0;
    let mut deposited = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            Ok(Moved::Internal) => {}
            Ok(Moved::In(amount)) => deposited += amount,
            Ok(Moved::Out(amount)) => spent += amount,
            Err(AppError::InsufficientFunds) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    let a_now = balance_of(&state, a.id).await.balance;
    let b_now = balance_of(&state, b.id).await.balance;
    assert!(a_now >= 0 && b_now >= 0);
    assert_eq!(a_now + b_now, 10_000 + deposited - spent);

    let sold = 1_000 - stock_of(&state, p.id).await;
    assert_eq!(i64::from(sold) * 250, spent);
}

pub async fn ownership_is_enforced(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let mallory = user(&state.store, "mallory", Role::User).await;
    let a = account(&state, alice, 5_000).await;
    let m = account(&state, mallory, 0).await;
    let p = product(&state.store, 100, 10).await;

    let deposit = state.transactions.execute_deposit(mallory, a.id, 100).await;
    let transfer = state
        .transactions
        .execute_transfer(mallory, a.id, m.id, 100)
        .await;
    let purchase = state
        .transactions
        .execute_purchase(mallory, a.id, p.id, 1)
        .await;
    let statement = state.transactions.account_statement(mallory, a.id).await;

    assert!(matches!(deposit, Err(AppError::Forbidden)));
    assert!(matches!(transfer, Err(AppError::Forbidden)));
    assert!(matches!(purchase, Err(AppError::Forbidden)));
    assert!(matches!(statement, Err(AppError::Forbidden)));
    assert_eq!(balance_of(&state, a.id).await.balance, 5_000);
    assert_eq!(stock_of(&state, p.id).await, 10);
}

pub async fn history_is_newest_first_and_private(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let bob = user(&state.store, "bob", Role::User).await;
    let a1 = account(&state, alice, 0).await;
    let a2 = account(&state, alice, 0).await;
    let b = account(&state, bob, 0).await;
    let p = product(&state.store, 100, 10).await;

    for (account_id, amount) in [(a1.id, 1_000), (a2.id, 2_000), (a1.id, 3_000)] {
        state
            .transactions
            .execute_deposit(alice, account_id, amount)
            .await
            .unwrap();
    }
    state
        .transactions
        .execute_purchase(alice, a2.id, p.id, 2)
        .await
        .unwrap();
    state
        .transactions
        .execute_deposit(bob, b.id, 9_999)
        .await
        .unwrap();

    let history = state.transactions.purchase_history(alice).await.unwrap();
    let amounts: Vec<i64> = history.iter().map(|t| t.total_amount).collect();
    assert_eq!(amounts, vec![200, 3_000, 2_000, 1_000]);
    assert!(history.iter().all(|t| t.user_id == alice));
    assert!(
        history
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at)
    );

    // Reading twice gives the same answer
    let again = state.transactions.purchase_history(alice).await.unwrap();
    assert_eq!(history, again);
}

pub async fn invalid_input_is_rejected_before_touching_state(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let bob = user(&state.store, "bob", Role::User).await;
    let a = account(&state, alice, 1_000).await;
    let b = account(&state, bob, 0).await;
    let p = product(&state.store, 100, 10).await;
    let tx = &state.transactions;

    assert!(matches!(
        tx.execute_deposit(alice, a.id, 0).await,
        Err(AppError::InvalidAmount)
    ));
    assert!(matches!(
        tx.execute_deposit(alice, a.id, -50).await,
        Err(AppError::InvalidAmount)
    ));
    assert!(matches!(
        tx.execute_transfer(alice, a.id, b.id, 0).await,
        Err(AppError::InvalidAmount)
    ));
    assert!(matches!(
        tx.execute_transfer(alice, a.id, a.id, 10).await,
        Err(AppError::InvalidRequest(_))
    ));
    assert!(matches!(
        tx.execute_purchase(alice, a.id, p.id, 0).await,
        Err(AppError::InvalidQuantity)
    ));
    assert!(matches!(
        tx.execute_purchase(alice, a.id, p.id, -1).await,
        Err(AppError::InvalidQuantity)
    ));

    assert_eq!(balance_of(&state, a.id).await.balance, 1_000);
    assert_eq!(stock_of(&state, p.id).await, 10);
}

pub async fn missing_rows_are_not_found(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let a = account(&state, alice, 1_000).await;
    let missing = uuid::Uuid::new_v4();
    let tx = &state.transactions;

    assert!(matches!(
        tx.execute_deposit(alice, missing, 10).await,
        Err(AppError::AccountNotFound)
    ));
    assert!(matches!(
        tx.execute_transfer(alice, a.id, missing, 10).await,
        Err(AppError::AccountNotFound)
    ));
    assert!(matches!(
        tx.execute_transfer(alice, missing, a.id, 10).await,
        Err(AppError::AccountNotFound)
    ));
    assert!(matches!(
        tx.execute_purchase(alice, a.id, missing, 1).await,
        Err(AppError::ProductNotFound)
    ));
    assert!(matches!(
        tx.account_statement(alice, missing).await,
        Err(AppError::AccountNotFound)
    ));
    assert_eq!(balance_of(&state, a.id).await.balance, 1_000);
}

pub async fn balance_overflow_is_rejected(state: AppState) {
    let alice = user(&state.store, "alice", Role::User).await;
    let bob = user(&state.store, "bob", Role::User).await;
    let a = account(&state, alice, 1_000).await;
    let b = account(&state, bob, 0).await;

    let err = state
        .transactions
        .execute_deposit(alice, a.id, i64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount), "{err:?}");

    // Fill the destination, then a transfer credit would overflow it
    state
        .transactions
        .execute_deposit(bob, b.id, i64::MAX - 10)
        .await
        .unwrap();
    let err = state
        .transactions
        .execute_transfer(alice, a.id, b.id, 500)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount), "{err:?}");

    assert_eq!(balance_of(&state, a.id).await.balance, 1_000);
    assert_eq!(balance_of(&state, b.id).await.balance, i64::MAX - 10);
    let a_log = state.store.list_transactions_by_account(a.id).await.unwrap();
    assert_eq!(a_log.len(), 1, "only the funding deposit");
}
