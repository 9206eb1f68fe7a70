mod common;

use canteen_ledger::application::webhook::ReconcileOutcome;
use canteen_ledger::domain::actor::{Actor, UserId};
use canteen_ledger::domain::money::{Amount, Money};
use canteen_ledger::domain::ports::LedgerStore;
use canteen_ledger::domain::webhook::WebhookStatus;
use canteen_ledger::error::LedgerError;
use common::{ledger, snapshot};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_sequential_redelivery_credits_once() {
    let (ledger, gateway) = ledger();
    ledger.engine.deposit(UserId(1), dec!(10.00)).await.unwrap();
    let opened = ledger
        .checkout
        .open_checkout(Actor::customer(1u64), UserId(1), dec!(25.00))
        .await
        .unwrap();

    let payload = gateway.complete_session(&opened.session.session_id, "evt_1").unwrap();
    let signature = gateway.sign(payload.as_bytes()).unwrap();

    let first = ledger
        .webhooks
        .handle_webhook_event(payload.as_bytes(), &signature)
        .await
        .unwrap();
    assert!(first.handled);
    assert_eq!(first.outcome, ReconcileOutcome::Credited);
    assert_eq!(first.balance.unwrap().current_balance, Money::new(dec!(35.00)));
    let row = ledger.engine.store().webhook_event("evt_1").await.unwrap().unwrap();
    assert_eq!(row.status, WebhookStatus::Completed);
    assert!(row.processed_at.is_some());
    assert!(row.error_message.is_none());

    let second = ledger
        .webhooks
        .handle_webhook_event(payload.as_bytes(), &signature)
        .await
        .unwrap();
    assert!(second.handled);
    assert_eq!(second.outcome, ReconcileOutcome::Duplicate);
    let unchanged = ledger.engine.store().webhook_event("evt_1").await.unwrap().unwrap();
    assert_eq!(unchanged.processed_at, row.processed_at);
    assert_eq!(snapshot(&ledger, 1).await.current_balance, Money::new(dec!(35.00)));
}

#[tokio::test]
async fn test_failed_event_can_be_retried() {
    let (ledger, gateway) = ledger();
    let payload = gateway.completed_event("evt_late", "cs_late");
    let signature = gateway.sign(payload.as_bytes()).unwrap();

    let failed = ledger
        .webhooks
        .handle_webhook_event(payload.as_bytes(), &signature)
        .await;
    assert!(matches!(failed, Err(LedgerError::SessionNotFound(_))));
    let row = ledger.engine.store().webhook_event("evt_late").await.unwrap().unwrap();
    assert_eq!(row.status, WebhookStatus::Failed);
    assert!(row.error_message.is_some());

    ledger
        .engine
        .record_pending_deposit(UserId(2), Amount::new(dec!(12.50)).unwrap(), "cs_late".to_string())
        .await
        .unwrap();

    let retried = ledger
        .webhooks
        .handle_webhook_event(payload.as_bytes(), &signature)
        .await
        .unwrap();
    assert_eq!(retried.outcome, ReconcileOutcome::Credited);
    let row = ledger.engine.store().webhook_event("evt_late").await.unwrap().unwrap();
    assert_eq!(row.status, WebhookStatus::Completed);
    assert_eq!(snapshot(&ledger, 2).await.current_balance, Money::new(dec!(12.50)));
}

#[tokio::test]
async fn test_bad_signature_leaves_no_trace() {
    let (ledger, gateway) = ledger();
    let opened = ledger
        .checkout
        .open_checkout(Actor::customer(1u64), UserId(1), dec!(5))
        .await
        .unwrap();
    let payload = gateway.complete_session(&opened.session.session_id, "evt_forged").unwrap();

    let result = ledger
        .webhooks
        .handle_webhook_event(payload.as_bytes(), "v1=deadbeef")
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidSignature(_))));
    assert!(ledger.engine.store().webhook_event("evt_forged").await.unwrap().is_none());
    assert_eq!(snapshot(&ledger, 1).await.current_balance, Money::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_delivery_credits_once() {
    let (ledger, gateway) = ledger();
    let opened = ledger
        .checkout
        .open_checkout(Actor::customer(1u64), UserId(1), dec!(20))
        .await
        .unwrap();
    let payload = gateway.complete_session(&opened.session.session_id, "evt_race").unwrap();
    let signature = gateway.sign(payload.as_bytes()).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        let payload = payload.clone();
        let signature = signature.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .webhooks
                .handle_webhook_event(payload.as_bytes(), &signature)
                .await
        }));
    }

    let mut credited = 0;
    for handle in handles {
        let receipt = handle.await.unwrap().unwrap();
        match receipt.outcome {
            ReconcileOutcome::Credited => credited += 1,
            ReconcileOutcome::Duplicate => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(credited, 1);
    assert_eq!(snapshot(&ledger, 1).await.current_balance, Money::new(dec!(20)));
}

#[tokio::test]
async fn test_polling_before_payment_changes_nothing() {
    let (ledger, gateway) = ledger();
    let opened = ledger
        .checkout
        .open_checkout(Actor::customer(3u64), UserId(3), dec!(8))
        .await
        .unwrap();
    let session_id = opened.session.session_id;

    assert_eq!(
        ledger.webhooks.reconcile_session(&session_id).await.unwrap(),
        ReconcileOutcome::Ignored
    );
    gateway.complete_session(&session_id, "evt_poll").unwrap();
    assert_eq!(
        ledger.webhooks.reconcile_session(&session_id).await.unwrap(),
        ReconcileOutcome::Credited
    );
    assert_eq!(
        ledger.webhooks.reconcile_session(&session_id).await.unwrap(),
        ReconcileOutcome::AlreadyCredited
    );
    assert_eq!(snapshot(&ledger, 3).await.current_balance, Money::new(dec!(8)));
}
