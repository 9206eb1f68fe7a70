use super::balance_engine::BalanceEngine;
use super::unit_of_work::UnitOfWork;
use crate::domain::balance::BalanceSnapshot;
use crate::domain::ports::{PaymentGatewayRef, RowKey};
use crate::domain::webhook::{CHECKOUT_SESSION_COMPLETED, GatewayEvent, PaymentState, WebhookEvent};
use crate::error::Result;
use tracing::{debug, error, info, warn};

/// What became of a delivered event or a polled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The matched deposit was credited by this call.
    Credited,
    /// The matched deposit had already been credited.
    AlreadyCredited,
    /// The event id was already processed to completion.
    Duplicate,
    /// Acknowledged without touching the ledger.
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookReceipt {
    pub event_id: String,
    /// The delivery was accepted and needs no redelivery.
    pub handled: bool,
    pub outcome: ReconcileOutcome,
    /// Balance after the credit, when one happened.
    pub balance: Option<BalanceSnapshot>,
}

impl WebhookReceipt {
    fn new(event_id: &str, outcome: ReconcileOutcome, balance: Option<BalanceSnapshot>) -> Self {
        Self {
            event_id: event_id.to_string(),
            handled: true,
            outcome,
            balance,
        }
    }
}

/// Applies payment provider notifications to the ledger exactly once.
///
/// Deliveries are deduplicated by event id. The event row lock is held for
/// the whole delivery, so concurrent copies of one event run one after the
/// other and every copy after the first sees a completed row.
#[derive(Clone)]
pub struct WebhookReconciler {
    engine: BalanceEngine,
    gateway: PaymentGatewayRef,
}

impl WebhookReconciler {
    pub fn new(engine: BalanceEngine, gateway: PaymentGatewayRef) -> Self {
        Self { engine, gateway }
    }

    /// Verifies and processes one raw delivery.
    ///
    /// A signature failure is returned before any row is written. A failure
    /// while applying the event marks its row FAILED and is returned, leaving
    /// the event id open for redelivery.
    pub async fn handle_webhook_event(&self, payload: &[u8], signature: &str) -> Result<WebhookReceipt> {
        let event = self.gateway.verify_signature(payload, signature).inspect_err(|err| {
            warn!(error = %err, "webhook rejected at signature check");
        })?;
        self.process(event).await
    }

    /// Asks the gateway about a checkout session and credits it when paid.
    ///
    /// Shares the deposit confirmation with the webhook path, so polling and
    /// delivery may race without crediting twice.
    pub async fn reconcile_session(&self, session_id: &str) -> Result<ReconcileOutcome> {
        let status = self.gateway.session_status(session_id).await?;
        if status.state != PaymentState::Paid {
            debug!(session_id, state = ?status.state, "session not paid yet");
            return Ok(ReconcileOutcome::Ignored);
        }
        let confirmed = self.engine.confirm_deposit(session_id, status.payment_intent).await?;
        Ok(match confirmed {
            Some(_) => ReconcileOutcome::Credited,
            None => ReconcileOutcome::AlreadyCredited,
        })
    }

    async fn process(&self, event: GatewayEvent) -> Result<WebhookReceipt> {
        let store = self.engine.store();
        let _event_lock = store.lock_row(RowKey::WebhookEvent(event.id.clone())).await?;

        let mut record = match store.webhook_event(&event.id).await? {
            Some(record) => record,
            None => WebhookEvent::new(&event),
        };
        if record.is_completed() {
            debug!(event_id = %event.id, "webhook event already processed");
            return Ok(WebhookReceipt::new(&event.id, ReconcileOutcome::Duplicate, None));
        }

        record.mark_processing();
        self.save(record.clone()).await?;

        match self.apply(&event).await {
            Ok((outcome, balance)) => {
                record.mark_completed();
                self.save(record).await?;
                info!(event_id = %event.id, event_type = %event.event_type, outcome = ?outcome, "webhook event processed");
                Ok(WebhookReceipt::new(&event.id, outcome, balance))
            }
            Err(err) => {
                error!(event_id = %event.id, event_type = %event.event_type, error = %err, "webhook event failed");
                record.mark_failed(err.to_string());
                if let Err(save_err) = self.save(record).await {
                    error!(event_id = %event.id, error = %save_err, "could not record webhook failure");
                }
                Err(err)
            }
        }
    }

    async fn apply(&self, event: &GatewayEvent) -> Result<(ReconcileOutcome, Option<BalanceSnapshot>)> {
        if event.event_type != CHECKOUT_SESSION_COMPLETED {
            warn!(event_id = %event.id, event_type = %event.event_type, "unhandled webhook event type");
            return Ok((ReconcileOutcome::Ignored, None));
        }

        let session = event.checkout_session()?;
        match self.engine.confirm_deposit(&session.id, session.payment_intent).await? {
            Some(receipt) => Ok((ReconcileOutcome::Credited, Some(receipt.balance))),
            None => Ok((ReconcileOutcome::AlreadyCredited, None)),
        }
    }

    /// Writes the event row. The caller holds its lock.
    async fn save(&self, record: WebhookEvent) -> Result<()> {
        let mut uow = UnitOfWork::begin(self.engine.store().clone());
        uow.put_webhook_event(record);
        uow.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::domain::actor::UserId;
    use crate::domain::money::{Amount, Money};
    use crate::domain::ports::PaymentGateway;
    use crate::domain::webhook::WebhookStatus;
    use crate::error::LedgerError;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use crate::infrastructure::sandbox_gateway::SandboxGateway;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;

    fn reconciler() -> (WebhookReconciler, Arc<SandboxGateway>) {
        let gateway = Arc::new(SandboxGateway::new("whsec_test"));
        let engine = BalanceEngine::new(Arc::new(InMemoryLedgerStore::new()), LedgerConfig::default());
        (WebhookReconciler::new(engine, gateway.clone()), gateway)
    }

    #[tokio::test]
    async fn test_invalid_signature_writes_nothing() {
        let (reconciler, _) = reconciler();
        let payload = json!({"id": "evt_1", "type": "checkout.session.completed"}).to_string();
        let result = reconciler.handle_webhook_event(payload.as_bytes(), "v1=deadbeef").await;
        assert!(matches!(result, Err(LedgerError::InvalidSignature(_))));
        assert!(reconciler.engine.store().webhook_event("evt_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_event_is_acknowledged() {
        let (reconciler, gateway) = reconciler();
        let payload = json!({"id": "evt_2", "type": "customer.created", "data": {"object": {}}}).to_string();
        let signature = gateway.sign(payload.as_bytes()).unwrap();

        let receipt = reconciler.handle_webhook_event(payload.as_bytes(), &signature).await.unwrap();
        assert!(receipt.handled);
        assert_eq!(receipt.outcome, ReconcileOutcome::Ignored);
        let record = reconciler.engine.store().webhook_event("evt_2").await.unwrap().unwrap();
        assert_eq!(record.status, WebhookStatus::Completed);
        assert!(record.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_session_marks_event_failed() {
        let (reconciler, gateway) = reconciler();
        let payload = gateway.completed_event("evt_3", "cs_missing");
        let signature = gateway.sign(payload.as_bytes()).unwrap();

        let result = reconciler.handle_webhook_event(payload.as_bytes(), &signature).await;
        assert!(matches!(result, Err(LedgerError::SessionNotFound(_))));
        let record = reconciler.engine.store().webhook_event("evt_3").await.unwrap().unwrap();
        assert_eq!(record.status, WebhookStatus::Failed);
        assert!(record.error_message.unwrap().contains("cs_missing"));
    }

    #[tokio::test]
    async fn test_polling_and_delivery_credit_once() {
        let (reconciler, gateway) = reconciler();
        let session = gateway
            .create_session(UserId(4), Amount::new(dec!(12.50)).unwrap(), "usd")
            .await
            .unwrap();
        reconciler
            .engine
            .record_pending_deposit(UserId(4), Amount::new(dec!(12.50)).unwrap(), session.session_id.clone())
            .await
            .unwrap();

        assert_eq!(
            reconciler.reconcile_session(&session.session_id).await.unwrap(),
            ReconcileOutcome::Ignored
        );
        let payload = gateway.complete_session(&session.session_id, "evt_4").unwrap();
        assert_eq!(
            reconciler.reconcile_session(&session.session_id).await.unwrap(),
            ReconcileOutcome::Credited
        );

        let signature = gateway.sign(payload.as_bytes()).unwrap();
        let receipt = reconciler.handle_webhook_event(payload.as_bytes(), &signature).await.unwrap();
        assert_eq!(receipt.outcome, ReconcileOutcome::AlreadyCredited);
        let balance = reconciler.engine.store().balance(UserId(4)).await.unwrap().unwrap();
        assert_eq!(balance.current_balance(), Money::new(dec!(12.50)));
    }
}
