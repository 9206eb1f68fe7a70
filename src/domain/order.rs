use super::actor::UserId;
use super::money::{Amount, Money};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an order, assigned by the ordering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Paid => "paid",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Paid)
                | (Pending, Cancelled)
                | (Confirmed, Preparing)
                | (Confirmed, Paid)
                | (Confirmed, Cancelled)
                | (Preparing, Paid)
                | (Preparing, Cancelled)
                | (Paid, Completed)
                | (Paid, Cancelled)
                | (Completed, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The order data handed over by the ordering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Decimal,
    /// Start of the menu window the order is served in.
    pub scheduled_window_start: DateTime<Utc>,
}

/// An order as seen by the ledger. Only `status` is owned here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    total_amount: Amount,
    status: OrderStatus,
    scheduled_window_start: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    pub(crate) fn from_new(new: NewOrder) -> Result<Self> {
        let total_amount = Amount::new(new.total_amount)?;
        let now = Utc::now();
        Ok(Self {
            id: new.id,
            user_id: new.user_id,
            total_amount,
            status: OrderStatus::Pending,
            scheduled_window_start: new.scheduled_window_start,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn total_amount(&self) -> Amount {
        self.total_amount
    }

    pub fn total(&self) -> Money {
        self.total_amount.money()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn scheduled_window_start(&self) -> DateTime<Utc> {
        self.scheduled_window_start
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Fails with `InvalidOrderState` unless the order is in one of `allowed`.
    pub(crate) fn ensure_status(&self, allowed: &[OrderStatus], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(LedgerError::InvalidOrderState {
                order_id: self.id,
                status: self.status,
                operation,
            })
        }
    }

    pub(crate) fn advance(&mut self, next: OrderStatus, operation: &'static str) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidOrderState {
                order_id: self.id,
                status: self.status,
                operation,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
