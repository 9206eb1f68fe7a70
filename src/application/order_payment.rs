use super::balance_engine::{BalanceEngine, LedgerReceipt};
use super::unit_of_work::UnitOfWork;
use crate::domain::actor::Actor;
use crate::domain::order::{NewOrder, Order, OrderId, OrderStatus};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Latest instant at which `order` may still be cancelled by its owner.
pub fn cancellation_deadline(order: &Order, cutoff: Duration) -> Result<DateTime<Utc>> {
    order
        .scheduled_window_start()
        .checked_sub_signed(cutoff)
        .ok_or_else(|| {
            LedgerError::InvalidConfig(format!(
                "cancellation cutoff of {} minutes puts the deadline of order {} out of range",
                cutoff.num_minutes(),
                order.id()
            ))
        })
}

/// Fails with `DeadlinePassed` once `now` is later than the cancellation deadline.
pub fn ensure_cancellable(order: &Order, now: DateTime<Utc>, cutoff: Duration) -> Result<()> {
    let deadline = cancellation_deadline(order, cutoff)?;
    if now > deadline {
        return Err(LedgerError::DeadlinePassed {
            order_id: order.id(),
            deadline,
        });
    }
    Ok(())
}

/// Drives an order through its lifecycle and keeps the ledger in step with it.
///
/// Authorization and deadlines are decided here; every money movement is
/// delegated to the [`BalanceEngine`].
#[derive(Clone)]
pub struct OrderPaymentService {
    engine: BalanceEngine,
}

impl OrderPaymentService {
    pub fn new(engine: BalanceEngine) -> Self {
        Self { engine }
    }

    /// Records an order handed over by the catalog as PENDING.
    pub async fn register_order(&self, new: NewOrder) -> Result<Order> {
        let order = Order::from_new(new)?;
        let mut uow = UnitOfWork::begin(self.engine.store().clone());
        uow.lock_new_order(order.id()).await?;
        uow.put_order(order.clone());
        uow.commit().await?;
        info!(order_id = %order.id(), user_id = %order.user_id(), total = %order.total(), "order registered");
        Ok(order)
    }

    /// Places the actor's own order by reserving its total.
    pub async fn place_order(&self, actor: Actor, order_id: OrderId) -> Result<LedgerReceipt> {
        let order = self.order(order_id).await?;
        if !actor.owns(order.user_id()) {
            return Err(self.forbidden(actor, order_id, "only the owner can place an order"));
        }
        self.engine.hold(order_id).await
    }

    /// Kitchen picks up a confirmed order. Funds stay on hold.
    pub async fn start_preparing(&self, actor: Actor, order_id: OrderId) -> Result<Order> {
        self.require_staff(actor, order_id, "prepare")?;
        self.advance(order_id, &[OrderStatus::Confirmed], OrderStatus::Preparing, "prepare")
            .await
    }

    pub async fn capture(&self, actor: Actor, order_id: OrderId) -> Result<LedgerReceipt> {
        self.require_staff(actor, order_id, "capture")?;
        self.engine.capture(order_id).await
    }

    /// Marks a paid order as handed out. No money moves.
    pub async fn complete(&self, actor: Actor, order_id: OrderId) -> Result<Order> {
        self.require_staff(actor, order_id, "complete")?;
        self.advance(order_id, &[OrderStatus::Paid], OrderStatus::Completed, "complete")
            .await
    }

    pub async fn refund(&self, actor: Actor, order_id: OrderId) -> Result<LedgerReceipt> {
        self.require_staff(actor, order_id, "refund")?;
        self.engine.refund(order_id).await
    }

    /// Customer cancellation before the preparation deadline.
    ///
    /// Ownership and the deadline are checked against the locked order row,
    /// so a concurrent status change cannot slip between check and release.
    ///
    /// # Arguments
    ///
    /// * `actor` - Must own the order; staff get no exemption.
    /// * `now` - The instant the request was made, compared to the deadline.
    pub async fn cancel(&self, actor: Actor, order_id: OrderId, now: DateTime<Utc>) -> Result<LedgerReceipt> {
        let cutoff = self.engine.config().cancellation_cutoff()?;
        let result = self
            .engine
            .release(order_id, |order| {
                if !actor.owns(order.user_id()) {
                    return Err(LedgerError::Forbidden(
                        "you can only cancel your own order".to_string(),
                    ));
                }
                ensure_cancellable(order, now, cutoff)
            })
            .await;
        if let Err(err) = &result {
            warn!(order_id = %order_id, user_id = %actor.user_id, code = err.code(), "cancellation rejected");
        }
        result
    }

    async fn order(&self, order_id: OrderId) -> Result<Order> {
        self.engine
            .store()
            .order(order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(order_id))
    }

    async fn advance(
        &self,
        order_id: OrderId,
        allowed: &[OrderStatus],
        next: OrderStatus,
        operation: &'static str,
    ) -> Result<Order> {
        let mut uow = UnitOfWork::begin(self.engine.store().clone());
        let mut order = uow.lock_order(order_id).await?;
        order.ensure_status(allowed, operation)?;
        order.advance(next, operation)?;
        uow.put_order(order.clone());
        uow.commit().await?;
        info!(order_id = %order_id, status = %next, "order advanced");
        Ok(order)
    }

    fn require_staff(&self, actor: Actor, order_id: OrderId, operation: &str) -> Result<()> {
        if actor.is_staff {
            Ok(())
        } else {
            Err(self.forbidden(actor, order_id, &format!("only staff can {operation} orders")))
        }
    }

    fn forbidden(&self, actor: Actor, order_id: OrderId, reason: &str) -> LedgerError {
        warn!(order_id = %order_id, user_id = %actor.user_id, reason, "forbidden");
        LedgerError::Forbidden(reason.to_string())
    }
}
