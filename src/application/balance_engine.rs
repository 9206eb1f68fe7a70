use super::unit_of_work::UnitOfWork;
use crate::config::LedgerConfig;
use crate::domain::actor::UserId;
use crate::domain::balance::BalanceSnapshot;
use crate::domain::money::Amount;
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::ports::LedgerStoreRef;
use crate::domain::transaction::{LedgerTransaction, TransactionStatus};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// What a ledger operation hands back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    pub balance: BalanceSnapshot,
    pub transaction: Option<LedgerTransaction>,
    pub order: Option<Order>,
}

/// The only code path that mutates balances or writes balance-affecting rows.
///
/// Each operation is one [`UnitOfWork`]: the order row (when there is one) and
/// then the balance row are locked before anything is read, and either every
/// write lands or none does. Nothing is retried here.
#[derive(Clone)]
pub struct BalanceEngine {
    store: LedgerStoreRef,
    config: LedgerConfig,
}

impl BalanceEngine {
    pub fn new(store: LedgerStoreRef, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &LedgerStoreRef {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Validates a deposit amount: positive after quantization and within the limit.
    pub fn deposit_amount(&self, value: Decimal) -> Result<Amount> {
        let amount = Amount::new(value)?;
        if amount.money() > self.config.max_deposit {
            return Err(LedgerError::InvalidAmount {
                amount: value,
                reason: format!("maximum deposit is {}", self.config.max_deposit),
            });
        }
        Ok(amount)
    }

    /// Credits `amount` to the user's balance with a completed DEPOSIT row.
    pub async fn deposit(&self, user_id: UserId, amount: Decimal) -> Result<LedgerReceipt> {
        let amount = self.deposit_amount(amount)?;

        let mut uow = UnitOfWork::begin(self.store.clone());
        let mut balance = uow.lock_balance(user_id).await?;
        balance.credit(amount);
        let tx = LedgerTransaction::deposit(balance.id(), amount, balance.current_balance());
        uow.put_balance(balance.clone());
        uow.put_transaction(tx.clone());
        uow.commit().await?;

        info!(user_id = %user_id, amount = %amount, current = %balance.current_balance(), "deposit committed");
        Ok(LedgerReceipt {
            balance: balance.snapshot(),
            transaction: Some(tx),
            order: None,
        })
    }

    /// Records a top-up the payment provider has not confirmed yet.
    ///
    /// The balance is untouched; the row only carries the session id the
    /// later confirmation is matched on.
    pub async fn record_pending_deposit(
        &self,
        user_id: UserId,
        amount: Amount,
        session_id: String,
    ) -> Result<LedgerReceipt> {
        let mut uow = UnitOfWork::begin(self.store.clone());
        let balance = uow.lock_balance(user_id).await?;
        let tx = LedgerTransaction::pending_deposit(balance.id(), amount, balance.current_balance(), session_id);
        uow.put_transaction(tx.clone());
        uow.commit().await?;

        info!(user_id = %user_id, amount = %amount, session_id = tx.checkout_session_id(), "pending deposit recorded");
        Ok(LedgerReceipt {
            balance: balance.snapshot(),
            transaction: Some(tx),
            order: None,
        })
    }

    /// Completes the pending gateway deposit opened for `session_id` and
    /// credits its owner.
    ///
    /// Returns `None` when the deposit is no longer pending, which makes a
    /// repeated confirmation of the same session harmless. Lock order is
    /// transaction row, then balance row.
    pub async fn confirm_deposit(
        &self,
        session_id: &str,
        payment_intent_id: Option<String>,
    ) -> Result<Option<LedgerReceipt>> {
        let mut uow = UnitOfWork::begin(self.store.clone());
        let mut tx = uow.lock_transaction_by_session(session_id).await?;
        if tx.status() != TransactionStatus::Pending {
            debug!(session_id, tx_id = %tx.id(), status = %tx.status(), "deposit already settled");
            return Ok(None);
        }

        let mut balance = uow.lock_balance_by_id(tx.balance_id()).await?;
        balance.credit(tx.amount());
        tx.confirm_deposit(payment_intent_id, balance.current_balance());
        uow.put_balance(balance.clone());
        uow.put_transaction(tx.clone());
        uow.commit().await?;

        info!(session_id, user_id = %balance.user_id(), amount = %tx.amount(), current = %balance.current_balance(), "gateway deposit credited");
        Ok(Some(LedgerReceipt {
            balance: balance.snapshot(),
            transaction: Some(tx),
            order: None,
        }))
    }

    /// Reserves the order total against the owner's available funds.
    pub async fn hold(&self, order_id: OrderId) -> Result<LedgerReceipt> {
        let mut uow = UnitOfWork::begin(self.store.clone());
        let mut order = uow.lock_order(order_id).await?;
        order.ensure_status(&[OrderStatus::Pending], "hold")?;

        let mut balance = uow.lock_balance(order.user_id()).await?;
        if let Err(err) = balance.reserve(order.total_amount()) {
            warn!(order_id = %order_id, user_id = %order.user_id(), error = %err, "hold rejected");
            return Err(err);
        }
        let tx = LedgerTransaction::hold(balance.id(), order_id, order.total_amount(), balance.current_balance());
        order.advance(OrderStatus::Confirmed, "hold")?;

        uow.put_balance(balance.clone());
        uow.put_transaction(tx.clone());
        uow.put_order(order.clone());
        uow.commit().await?;

        info!(order_id = %order_id, user_id = %order.user_id(), amount = %order.total(), on_hold = %balance.on_hold(), "hold placed");
        Ok(LedgerReceipt {
            balance: balance.snapshot(),
            transaction: Some(tx),
            order: Some(order),
        })
    }

    /// Turns the order's hold into a payment.
    ///
    /// The pending HOLD row is rewritten in place into a completed PAYMENT, so a
    /// reservation and its capture stay one ledger row.
    pub async fn capture(&self, order_id: OrderId) -> Result<LedgerReceipt> {
        let mut uow = UnitOfWork::begin(self.store.clone());
        let mut order = uow.lock_order(order_id).await?;
        order.ensure_status(
            &[OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Preparing],
            "capture",
        )?;

        let mut balance = uow.lock_balance(order.user_id()).await?;
        let mut tx = uow
            .pending_hold(order_id)
            .await?
            .ok_or(LedgerError::MissingHold(order_id))?;
        balance.settle(tx.amount())?;
        tx.capture(balance.current_balance());
        order.advance(OrderStatus::Paid, "capture")?;

        uow.put_balance(balance.clone());
        uow.put_transaction(tx.clone());
        uow.put_order(order.clone());
        uow.commit().await?;

        info!(order_id = %order_id, user_id = %order.user_id(), amount = %tx.amount(), current = %balance.current_balance(), "payment captured");
        Ok(LedgerReceipt {
            balance: balance.snapshot(),
            transaction: Some(tx),
            order: Some(order),
        })
    }

    /// Cancels an uncaptured order and frees its reservation.
    ///
    /// `precondition` runs against the locked order before anything changes; it
    /// is where callers plug in rules the engine does not own, such as deadlines.
    /// No ledger row is created: the HOLD row is marked cancelled.
    pub async fn release<F>(&self, order_id: OrderId, precondition: F) -> Result<LedgerReceipt>
    where
        F: FnOnce(&Order) -> Result<()> + Send,
    {
        let mut uow = UnitOfWork::begin(self.store.clone());
        let mut order = uow.lock_order(order_id).await?;
        order.ensure_status(
            &[OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Preparing],
            "release",
        )?;
        precondition(&order)?;

        let mut balance = uow.lock_balance(order.user_id()).await?;
        let released = match uow.pending_hold(order_id).await? {
            Some(mut hold) => {
                balance.release(hold.amount())?;
                hold.cancel();
                uow.put_balance(balance.clone());
                uow.put_transaction(hold.clone());
                Some(hold)
            }
            // a pending order never reserved anything
            None if order.status() == OrderStatus::Pending => None,
            None => return Err(LedgerError::MissingHold(order_id)),
        };
        order.advance(OrderStatus::Cancelled, "release")?;
        uow.put_order(order.clone());
        uow.commit().await?;

        info!(
            order_id = %order_id,
            user_id = %order.user_id(),
            released = %released.as_ref().map(|hold| hold.amount().to_string()).unwrap_or_else(|| "0.00".to_string()),
            on_hold = %balance.on_hold(),
            "hold released"
        );
        Ok(LedgerReceipt {
            balance: balance.snapshot(),
            transaction: None,
            order: Some(order),
        })
    }

    /// Gives the total of a paid or completed order back to its owner.
    pub async fn refund(&self, order_id: OrderId) -> Result<LedgerReceipt> {
        let mut uow = UnitOfWork::begin(self.store.clone());
        let mut order = uow.lock_order(order_id).await?;
        order.ensure_status(&[OrderStatus::Paid, OrderStatus::Completed], "refund")?;

        let mut balance = uow.lock_balance(order.user_id()).await?;
        balance.credit(order.total_amount());
        let tx = LedgerTransaction::refund(balance.id(), order_id, order.total_amount(), balance.current_balance());
        order.advance(OrderStatus::Cancelled, "refund")?;

        uow.put_balance(balance.clone());
        uow.put_transaction(tx.clone());
        uow.put_order(order.clone());
        uow.commit().await?;

        info!(order_id = %order_id, user_id = %order.user_id(), amount = %tx.amount(), current = %balance.current_balance(), "order refunded");
        Ok(LedgerReceipt {
            balance: balance.snapshot(),
            transaction: Some(tx),
            order: Some(order),
        })
    }
}
