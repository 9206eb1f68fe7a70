use crate::domain::actor::UserId;
use crate::domain::balance::{AccountBalance, BalanceId};
use crate::domain::order::{Order, OrderId};
use crate::domain::ports::{LedgerStoreRef, RowGuard, RowKey, WriteBatch};
use crate::domain::transaction::{LedgerTransaction, TransactionId};
use crate::domain::webhook::WebhookEvent;
use crate::error::{LedgerError, Result};
use std::collections::HashMap;

/// One atomic unit of ledger work.
///
/// Every row is locked before it is first read and stays locked until the unit
/// commits or is dropped. Writes are staged and reach the store in a single
/// [`WriteBatch`]; dropping the unit without committing discards them.
///
/// Lock order is order row, then balance row (webhook credits: transaction row,
/// then balance row).
pub(crate) struct UnitOfWork {
    store: LedgerStoreRef,
    guards: HashMap<RowKey, RowGuard>,
    balances: HashMap<UserId, AccountBalance>,
    orders: HashMap<OrderId, Order>,
    transactions: HashMap<TransactionId, LedgerTransaction>,
    webhook_events: HashMap<String, WebhookEvent>,
    dirty: Vec<RowKey>,
}

impl UnitOfWork {
    pub(crate) fn begin(store: LedgerStoreRef) -> Self {
        Self {
            store,
            guards: HashMap::new(),
            balances: HashMap::new(),
            orders: HashMap::new(),
            transactions: HashMap::new(),
            webhook_events: HashMap::new(),
            dirty: Vec::new(),
        }
    }

    async fn acquire(&mut self, key: RowKey) -> Result<()> {
        if !self.guards.contains_key(&key) {
            let guard = self.store.lock_row(key.clone()).await?;
            self.guards.insert(key, guard);
        }
        Ok(())
    }

    fn mark_dirty(&mut self, key: RowKey) {
        if !self.dirty.contains(&key) {
            self.dirty.push(key);
        }
    }

    pub(crate) async fn lock_order(&mut self, order_id: OrderId) -> Result<Order> {
        self.acquire(RowKey::Order(order_id)).await?;
        if let Some(order) = self.orders.get(&order_id) {
            return Ok(order.clone());
        }
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(order_id))?;
        self.orders.insert(order_id, order.clone());
        Ok(order)
    }

    /// Locks the id of an order that is about to be created.
    pub(crate) async fn lock_new_order(&mut self, order_id: OrderId) -> Result<()> {
        self.acquire(RowKey::Order(order_id)).await?;
        if self.orders.contains_key(&order_id) || self.store.order(order_id).await?.is_some() {
            return Err(LedgerError::OrderAlreadyExists(order_id));
        }
        Ok(())
    }

    /// Locks the user's balance, creating an empty one on first access.
    pub(crate) async fn lock_balance(&mut self, user_id: UserId) -> Result<AccountBalance> {
        self.acquire(RowKey::Balance(user_id)).await?;
        if let Some(balance) = self.balances.get(&user_id) {
            return Ok(balance.clone());
        }
        let balance = match self.store.balance(user_id).await? {
            Some(balance) => balance,
            None => {
                self.mark_dirty(RowKey::Balance(user_id));
                AccountBalance::new(user_id)
            }
        };
        self.balances.insert(user_id, balance.clone());
        Ok(balance)
    }

    /// Locks the balance that owns a ledger row.
    pub(crate) async fn lock_balance_by_id(&mut self, balance_id: BalanceId) -> Result<AccountBalance> {
        // the owner of a balance never changes, so the unlocked lookup is stable
        let user_id = self
            .store
            .balance_by_id(balance_id)
            .await?
            .ok_or_else(|| LedgerError::Storage(format!("balance {balance_id} not found")))?
            .user_id();
        self.lock_balance(user_id).await
    }

    pub(crate) async fn lock_transaction(&mut self, tx_id: TransactionId) -> Result<LedgerTransaction> {
        self.acquire(RowKey::Transaction(tx_id)).await?;
        if let Some(tx) = self.transactions.get(&tx_id) {
            return Ok(tx.clone());
        }
        let tx = self
            .store
            .transaction(tx_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(tx_id))?;
        self.transactions.insert(tx_id, tx.clone());
        Ok(tx)
    }

    /// Locks the ledger row opened for a gateway checkout session.
    pub(crate) async fn lock_transaction_by_session(&mut self, session_id: &str) -> Result<LedgerTransaction> {
        // session ids never move between rows, so the unlocked lookup is stable
        let tx_id = self
            .store
            .transaction_by_session(session_id)
            .await?
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))?
            .id();
        self.lock_transaction(tx_id).await
    }

    /// The pending HOLD of an order whose row this unit already holds.
    pub(crate) async fn pending_hold(&mut self, order_id: OrderId) -> Result<Option<LedgerTransaction>> {
        debug_assert!(self.guards.contains_key(&RowKey::Order(order_id)));
        if let Some(tx) = self
            .transactions
            .values()
            .find(|tx| tx.order_id() == Some(order_id) && tx.is_pending_hold())
        {
            return Ok(Some(tx.clone()));
        }
        match self.store.pending_hold(order_id).await? {
            // staged in this unit and no longer pending
            Some(tx) if self.transactions.contains_key(&tx.id()) => Ok(None),
            Some(tx) => {
                self.transactions.insert(tx.id(), tx.clone());
                Ok(Some(tx))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn put_balance(&mut self, balance: AccountBalance) {
        let user_id = balance.user_id();
        self.balances.insert(user_id, balance);
        self.mark_dirty(RowKey::Balance(user_id));
    }

    pub(crate) fn put_order(&mut self, order: Order) {
        let order_id = order.id();
        self.orders.insert(order_id, order);
        self.mark_dirty(RowKey::Order(order_id));
    }

    pub(crate) fn put_transaction(&mut self, tx: LedgerTransaction) {
        let tx_id = tx.id();
        self.transactions.insert(tx_id, tx);
        self.mark_dirty(RowKey::Transaction(tx_id));
    }

    /// Stages a webhook event row. The caller holds that row's lock itself.
    pub(crate) fn put_webhook_event(&mut self, event: WebhookEvent) {
        let key = RowKey::WebhookEvent(event.event_id.clone());
        self.webhook_events.insert(event.event_id.clone(), event);
        self.mark_dirty(key);
    }

    /// Writes every staged row in one batch, then releases the locks.
    pub(crate) async fn commit(mut self) -> Result<()> {
        let mut batch = WriteBatch::new();
        for key in std::mem::take(&mut self.dirty) {
            match key {
                RowKey::Balance(user_id) => batch.balances.extend(self.balances.remove(&user_id)),
                RowKey::Order(order_id) => batch.orders.extend(self.orders.remove(&order_id)),
                RowKey::Transaction(tx_id) => batch.transactions.extend(self.transactions.remove(&tx_id)),
                RowKey::WebhookEvent(event_id) => {
                    batch.webhook_events.extend(self.webhook_events.remove(&event_id))
                }
            }
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        tracing::trace!(locks = self.guards.len(), "unit of work committed");
        Ok(())
    }
}
