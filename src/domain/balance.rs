use super::actor::UserId;
use super::money::{Amount, Money};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceId(pub Uuid);

impl BalanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BalanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BalanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's wallet: the funds they own and the part reserved for open orders.
///
/// Fields are private. They only change through the balance engine, which runs
/// every mutation inside a locked unit of work. After any committed operation
/// `on_hold <= current_balance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    id: BalanceId,
    user_id: UserId,
    current_balance: Money,
    on_hold: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Read-only view of a balance handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub user_id: UserId,
    pub current_balance: Money,
    pub on_hold: Money,
    pub available: Money,
}

impl BalanceSnapshot {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            current_balance: Money::ZERO,
            on_hold: Money::ZERO,
            available: Money::ZERO,
        }
    }
}

impl AccountBalance {
    pub(crate) fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: BalanceId::new(),
            user_id,
            current_balance: Money::ZERO,
            on_hold: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> BalanceId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn current_balance(&self) -> Money {
        self.current_balance
    }

    pub fn on_hold(&self) -> Money {
        self.on_hold
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Funds usable for new holds.
    pub fn available(&self) -> Money {
        self.current_balance - self.on_hold
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            user_id: self.user_id,
            current_balance: self.current_balance,
            on_hold: self.on_hold,
            available: self.available(),
        }
    }

    /// Adds funds to the balance (deposits, refunds, confirmed top-ups).
    pub(crate) fn credit(&mut self, amount: Amount) {
        self.current_balance += amount.money();
        self.touch();
    }

    /// Reserves funds for an order without spending them.
    pub(crate) fn reserve(&mut self, amount: Amount) -> Result<()> {
        let available = self.available();
        if available < amount.money() {
            return Err(LedgerError::InsufficientFunds {
                available,
                required: amount.money(),
            });
        }
        self.on_hold += amount.money();
        self.touch();
        Ok(())
    }

    /// Gives a reservation back to the available funds.
    pub(crate) fn release(&mut self, amount: Amount) -> Result<()> {
        self.ensure_held(amount)?;
        self.on_hold -= amount.money();
        self.touch();
        Ok(())
    }

    /// Turns a reservation into an actual debit.
    pub(crate) fn settle(&mut self, amount: Amount) -> Result<()> {
        self.ensure_held(amount)?;
        self.on_hold -= amount.money();
        self.current_balance -= amount.money();
        self.touch();
        Ok(())
    }

    fn ensure_held(&self, amount: Amount) -> Result<()> {
        if self.on_hold < amount.money() || self.current_balance < amount.money() {
            return Err(LedgerError::HoldMismatch {
                user_id: self.user_id,
                on_hold: self.on_hold,
                required: amount.money(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount(value: rust_decimal::Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[test]
    fn test_new_balance_is_empty() {
        let balance = AccountBalance::new(UserId(7));
        assert_eq!(balance.snapshot(), BalanceSnapshot::empty(UserId(7)));
    }

    #[test]
    fn test_reserve_respects_available() {
        let mut balance = AccountBalance::new(UserId(1));
        balance.credit(amount(dec!(50.00)));
        balance.reserve(amount(dec!(30.00))).unwrap();
        assert_eq!(balance.available(), Money::new(dec!(20.00)));

        let result = balance.reserve(amount(dec!(20.01)));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { available, .. }) if available == Money::new(dec!(20.00))
        ));
        assert_eq!(balance.on_hold(), Money::new(dec!(30.00)));

        balance.reserve(amount(dec!(20.00))).unwrap();
        assert_eq!(balance.available(), Money::ZERO);
    }

    #[test]
    fn test_settle_debits_both_sides() {
        let mut balance = AccountBalance::new(UserId(1));
        balance.credit(amount(dec!(100.00)));
        balance.reserve(amount(dec!(40.00))).unwrap();
        balance.settle(amount(dec!(40.00))).unwrap();
        assert_eq!(balance.current_balance(), Money::new(dec!(60.00)));
        assert_eq!(balance.on_hold(), Money::ZERO);
    }

    #[test]
    fn test_release_more_than_held_is_rejected() {
        let mut balance = AccountBalance::new(UserId(1));
        balance.credit(amount(dec!(10.00)));
        balance.reserve(amount(dec!(5.00))).unwrap();
        assert!(matches!(
            balance.release(amount(dec!(6.00))),
            Err(LedgerError::HoldMismatch { .. })
        ));
        balance.release(amount(dec!(5.00))).unwrap();
        assert_eq!(balance.on_hold(), Money::ZERO);
        assert_eq!(balance.current_balance(), Money::new(dec!(10.00)));
    }
}
