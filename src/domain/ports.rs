use super::actor::UserId;
use super::balance::{AccountBalance, BalanceId};
use super::money::Amount;
use super::order::{Order, OrderId};
use super::transaction::{LedgerTransaction, TransactionId};
use super::webhook::{CheckoutSession, GatewayEvent, SessionStatus, WebhookEvent};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Identity of a lockable row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Order(OrderId),
    Balance(UserId),
    Transaction(TransactionId),
    WebhookEvent(String),
}

/// Exclusive lock on one row, released on drop.
pub type RowGuard = tokio::sync::OwnedMutexGuard<()>;

/// Rows written by one unit of work, applied all-or-nothing by [`LedgerStore::commit`].
#[derive(Debug, Clone)]
pub struct WriteBatch {
    pub(crate) balances: Vec<AccountBalance>,
    pub(crate) orders: Vec<Order>,
    pub(crate) transactions: Vec<LedgerTransaction>,
    pub(crate) webhook_events: Vec<WebhookEvent>,
}

impl WriteBatch {
    pub(crate) fn new() -> Self {
        Self {
            balances: Vec::new(),
            orders: Vec::new(),
            transactions: Vec::new(),
            webhook_events: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
            && self.orders.is_empty()
            && self.transactions.is_empty()
            && self.webhook_events.is_empty()
    }
}

/// Durable storage for balances, orders, ledger rows and webhook events.
///
/// Reads return committed state. Callers that intend to write a row must hold
/// its [`RowKey`] lock from before the read until `commit` returns.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Waits for exclusive access to `key`.
    async fn lock_row(&self, key: RowKey) -> Result<RowGuard>;

    async fn balance(&self, user_id: UserId) -> Result<Option<AccountBalance>>;
    async fn balance_by_id(&self, balance_id: BalanceId) -> Result<Option<AccountBalance>>;
    async fn all_balances(&self) -> Result<Vec<AccountBalance>>;
    async fn order(&self, order_id: OrderId) -> Result<Option<Order>>;
    async fn transaction(&self, tx_id: TransactionId) -> Result<Option<LedgerTransaction>>;
    /// Every ledger row of one balance, in no particular order.
    async fn transactions_for_balance(&self, balance_id: BalanceId) -> Result<Vec<LedgerTransaction>>;
    /// The HOLD row of `order_id` that is still pending, if any.
    async fn pending_hold(&self, order_id: OrderId) -> Result<Option<LedgerTransaction>>;
    async fn transaction_by_session(&self, session_id: &str) -> Result<Option<LedgerTransaction>>;
    async fn webhook_event(&self, event_id: &str) -> Result<Option<WebhookEvent>>;

    /// Upserts every row in `batch` atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// The external payment provider, reduced to what the ledger consumes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, user_id: UserId, amount: Amount, currency: &str) -> Result<CheckoutSession>;

    /// Authenticates a raw webhook body against its signature header.
    fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent>;

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
