use super::balance_engine::BalanceEngine;
use crate::domain::actor::{Actor, UserId};
use crate::domain::ports::PaymentGatewayRef;
use crate::domain::transaction::LedgerTransaction;
use crate::domain::webhook::CheckoutSession;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use tracing::info;

/// A checkout the customer still has to pay at the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedCheckout {
    pub session: CheckoutSession,
    pub transaction: LedgerTransaction,
}

/// Wallet top-ups paid through the external provider.
#[derive(Clone)]
pub struct CheckoutService {
    engine: BalanceEngine,
    gateway: PaymentGatewayRef,
}

impl CheckoutService {
    pub fn new(engine: BalanceEngine, gateway: PaymentGatewayRef) -> Self {
        Self { engine, gateway }
    }

    /// Opens a provider session for `user_id` and records the pending deposit
    /// the provider's confirmation will later complete.
    pub async fn open_checkout(&self, actor: Actor, user_id: UserId, amount: Decimal) -> Result<OpenedCheckout> {
        if !actor.is_staff && !actor.owns(user_id) {
            return Err(LedgerError::Forbidden(
                "you can only top up your own wallet".to_string(),
            ));
        }
        let amount = self.engine.deposit_amount(amount)?;
        let session = self
            .gateway
            .create_session(user_id, amount, &self.engine.config().currency)
            .await?;
        let receipt = self
            .engine
            .record_pending_deposit(user_id, amount, session.session_id.clone())
            .await?;
        let transaction = receipt
            .transaction
            .ok_or_else(|| LedgerError::Storage("pending deposit was not recorded".to_string()))?;

        info!(user_id = %user_id, amount = %amount, session_id = %session.session_id, "checkout opened");
        Ok(OpenedCheckout { session, transaction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::domain::money::Money;
    use crate::domain::transaction::{TransactionStatus, TransactionType};
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use crate::infrastructure::sandbox_gateway::SandboxGateway;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn service() -> CheckoutService {
        let engine = BalanceEngine::new(Arc::new(InMemoryLedgerStore::new()), LedgerConfig::default());
        CheckoutService::new(engine, Arc::new(SandboxGateway::new("whsec")))
    }

    #[tokio::test]
    async fn test_open_checkout_records_pending_deposit() {
        let service = service();
        let opened = service.open_checkout(Actor::customer(3u64), UserId(3), dec!(25)).await.unwrap();
        assert_eq!(opened.transaction.transaction_type(), TransactionType::Deposit);
        assert_eq!(opened.transaction.status(), TransactionStatus::Pending);
        assert_eq!(opened.transaction.checkout_session_id(), Some(opened.session.session_id.as_str()));

        let balance = service.engine.store().balance(UserId(3)).await.unwrap().unwrap();
        assert_eq!(balance.current_balance(), Money::ZERO);
    }

    #[tokio::test]
    async fn test_open_checkout_checks_actor_and_limit() {
        let service = service();
        assert!(matches!(
            service.open_checkout(Actor::customer(4u64), UserId(3), dec!(25)).await,
            Err(LedgerError::Forbidden(_))
        ));
        assert!(matches!(
            service.open_checkout(Actor::staff(4u64), UserId(3), dec!(10000.01)).await,
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(service.open_checkout(Actor::staff(4u64), UserId(3), dec!(10000)).await.is_ok());
    }
}
