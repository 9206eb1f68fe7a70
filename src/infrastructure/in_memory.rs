use super::locks::RowLocks;
use crate::domain::actor::UserId;
use crate::domain::balance::{AccountBalance, BalanceId};
use crate::domain::order::{Order, OrderId};
use crate::domain::ports::{LedgerStore, RowGuard, RowKey, WriteBatch};
use crate::domain::transaction::{LedgerTransaction, TransactionId};
use crate::domain::webhook::WebhookEvent;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    balances: HashMap<UserId, AccountBalance>,
    orders: HashMap<OrderId, Order>,
    transactions: HashMap<TransactionId, LedgerTransaction>,
    webhook_events: HashMap<String, WebhookEvent>,
    owners: HashMap<BalanceId, UserId>,
    by_balance: HashMap<BalanceId, Vec<TransactionId>>,
    by_order: HashMap<OrderId, Vec<TransactionId>>,
    by_session: HashMap<String, TransactionId>,
}

impl Tables {
    fn upsert_transaction(&mut self, tx: LedgerTransaction) {
        let id = tx.id();
        if !self.transactions.contains_key(&id) {
            self.by_balance.entry(tx.balance_id()).or_default().push(id);
            if let Some(order_id) = tx.order_id() {
                self.by_order.entry(order_id).or_default().push(id);
            }
            if let Some(session_id) = tx.checkout_session_id() {
                self.by_session.insert(session_id.to_string(), id);
            }
        }
        self.transactions.insert(id, tx);
    }
}

/// A thread-safe in-memory ledger store.
///
/// Tables sit behind one `RwLock`, so a commit is applied under a single write
/// guard and readers never observe half of a batch. Row locks come from a
/// shared [`RowLocks`] table. Ideal for tests and single-run batch jobs.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
    locks: RowLocks,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn lock_row(&self, key: RowKey) -> Result<RowGuard> {
        Ok(self.locks.lock(key).await)
    }

    async fn balance(&self, user_id: UserId) -> Result<Option<AccountBalance>> {
        let tables = self.tables.read().await;
        Ok(tables.balances.get(&user_id).cloned())
    }

    async fn balance_by_id(&self, balance_id: BalanceId) -> Result<Option<AccountBalance>> {
        let tables = self.tables.read().await;
        Ok(tables
            .owners
            .get(&balance_id)
            .and_then(|user_id| tables.balances.get(user_id))
            .cloned())
    }

    async fn all_balances(&self) -> Result<Vec<AccountBalance>> {
        let tables = self.tables.read().await;
        Ok(tables.balances.values().cloned().collect())
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&order_id).cloned())
    }

    async fn transaction(&self, tx_id: TransactionId) -> Result<Option<LedgerTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables.transactions.get(&tx_id).cloned())
    }

    async fn transactions_for_balance(&self, balance_id: BalanceId) -> Result<Vec<LedgerTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_balance
            .get(&balance_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.transactions.get(id).cloned())
            .collect())
    }

    async fn pending_hold(&self, order_id: OrderId) -> Result<Option<LedgerTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_order
            .get(&order_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.transactions.get(id))
            .find(|tx| tx.is_pending_hold())
            .cloned())
    }

    async fn transaction_by_session(&self, session_id: &str) -> Result<Option<LedgerTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_session
            .get(session_id)
            .and_then(|id| tables.transactions.get(id))
            .cloned())
    }

    async fn webhook_event(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        let tables = self.tables.read().await;
        Ok(tables.webhook_events.get(event_id).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut tables = self.tables.write().await;
        for balance in batch.balances {
            tables.owners.insert(balance.id(), balance.user_id());
            tables.balances.insert(balance.user_id(), balance);
        }
        for order in batch.orders {
            tables.orders.insert(order.id(), order);
        }
        for tx in batch.transactions {
            tables.upsert_transaction(tx);
        }
        for event in batch.webhook_events {
            tables.webhook_events.insert(event.event_id.clone(), event);
        }
        Ok(())
    }
}
