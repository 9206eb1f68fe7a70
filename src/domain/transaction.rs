use super::balance::BalanceId;
use super::money::{Amount, Money};
use super::order::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Payment,
    Refund,
    Hold,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Payment => "payment",
            TransactionType::Refund => "refund",
            TransactionType::Hold => "hold",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment-gateway references carried by externally originated deposits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReference {
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
}

/// One ledger row.
///
/// Rows are immutable once written, except for the controlled transitions
/// below: a pending HOLD becomes a completed PAYMENT at capture or is
/// cancelled at release, and a pending gateway DEPOSIT is completed when the
/// provider confirms it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    id: TransactionId,
    balance_id: BalanceId,
    order_id: Option<OrderId>,
    r#type: TransactionType,
    amount: Amount,
    remaining_balance: Money,
    status: TransactionStatus,
    #[serde(default)]
    gateway: GatewayReference,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LedgerTransaction {
    fn new(
        balance_id: BalanceId,
        order_id: Option<OrderId>,
        r#type: TransactionType,
        amount: Amount,
        remaining_balance: Money,
        status: TransactionStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            balance_id,
            order_id,
            r#type,
            amount,
            remaining_balance,
            status,
            gateway: GatewayReference::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn deposit(balance_id: BalanceId, amount: Amount, remaining_balance: Money) -> Self {
        Self::new(
            balance_id,
            None,
            TransactionType::Deposit,
            amount,
            remaining_balance,
            TransactionStatus::Completed,
        )
    }

    /// A deposit waiting for the payment provider to confirm `session_id`.
    pub(crate) fn pending_deposit(
        balance_id: BalanceId,
        amount: Amount,
        remaining_balance: Money,
        session_id: String,
    ) -> Self {
        let mut tx = Self::new(
            balance_id,
            None,
            TransactionType::Deposit,
            amount,
            remaining_balance,
            TransactionStatus::Pending,
        );
        tx.gateway.checkout_session_id = Some(session_id);
        tx
    }

    pub(crate) fn hold(
        balance_id: BalanceId,
        order_id: OrderId,
        amount: Amount,
        remaining_balance: Money,
    ) -> Self {
        Self::new(
            balance_id,
            Some(order_id),
            TransactionType::Hold,
            amount,
            remaining_balance,
            TransactionStatus::Pending,
        )
    }

    pub(crate) fn refund(
        balance_id: BalanceId,
        order_id: OrderId,
        amount: Amount,
        remaining_balance: Money,
    ) -> Self {
        Self::new(
            balance_id,
            Some(order_id),
            TransactionType::Refund,
            amount,
            remaining_balance,
            TransactionStatus::Completed,
        )
    }

    /// Rewrites a pending HOLD into the completed PAYMENT it turned into.
    pub(crate) fn capture(&mut self, remaining_balance: Money) {
        debug_assert!(self.is_pending_hold());
        self.r#type = TransactionType::Payment;
        self.status = TransactionStatus::Completed;
        self.remaining_balance = remaining_balance;
        self.updated_at = Utc::now();
    }

    pub(crate) fn cancel(&mut self) {
        self.status = TransactionStatus::Cancelled;
        self.updated_at = Utc::now();
    }

    /// Marks a pending gateway deposit as paid.
    pub(crate) fn confirm_deposit(&mut self, payment_intent_id: Option<String>, remaining_balance: Money) {
        self.status = TransactionStatus::Completed;
        self.gateway.payment_intent_id = payment_intent_id;
        self.remaining_balance = remaining_balance;
        self.updated_at = Utc::now();
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn balance_id(&self) -> BalanceId {
        self.balance_id
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.r#type
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn remaining_balance(&self) -> Money {
        self.remaining_balance
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn gateway(&self) -> &GatewayReference {
        &self.gateway
    }

    pub fn checkout_session_id(&self) -> Option<&str> {
        self.gateway.checkout_session_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_pending_hold(&self) -> bool {
        self.r#type == TransactionType::Hold && self.status == TransactionStatus::Pending
    }

    /// Amount as it affects the owner, negative for money leaving or reserved.
    pub fn signed_amount(&self) -> Money {
        match self.r#type {
            TransactionType::Payment | TransactionType::Hold => Money::ZERO - self.amount.money(),
            TransactionType::Deposit | TransactionType::Refund => self.amount.money(),
        }
    }
}
