use super::locks::RowLocks;
use crate::domain::actor::UserId;
use crate::domain::balance::{AccountBalance, BalanceId};
use crate::domain::order::{Order, OrderId};
use crate::domain::ports::{LedgerStore, RowGuard, RowKey, WriteBatch};
use crate::domain::transaction::{LedgerTransaction, TransactionId};
use crate::domain::webhook::WebhookEvent;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Balances keyed by user id.
pub const CF_BALANCES: &str = "balances";
/// Balance id to owning user id.
pub const CF_BALANCE_OWNERS: &str = "balance_owners";
pub const CF_ORDERS: &str = "orders";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_WEBHOOK_EVENTS: &str = "webhook_events";
/// Index `balance_id ++ tx_id`, empty values.
pub const CF_BALANCE_TRANSACTIONS: &str = "balance_transactions";
/// Index `order_id ++ tx_id`, empty values.
pub const CF_ORDER_TRANSACTIONS: &str = "order_transactions";
/// Gateway session id to transaction id.
pub const CF_SESSION_TRANSACTIONS: &str = "session_transactions";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_BALANCES,
    CF_BALANCE_OWNERS,
    CF_ORDERS,
    CF_TRANSACTIONS,
    CF_WEBHOOK_EVENTS,
    CF_BALANCE_TRANSACTIONS,
    CF_ORDER_TRANSACTIONS,
    CF_SESSION_TRANSACTIONS,
];

impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

fn index_key(prefix: &[u8], tx_id: TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 16);
    key.extend_from_slice(prefix);
    key.extend_from_slice(tx_id.0.as_bytes());
    key
}

fn tx_id_from_index(key: &[u8]) -> Result<TransactionId> {
    let suffix = key
        .len()
        .checked_sub(16)
        .map(|start| &key[start..])
        .ok_or_else(|| LedgerError::Storage("truncated index key".to_string()))?;
    uuid::Uuid::from_slice(suffix)
        .map(TransactionId)
        .map_err(|err| LedgerError::Storage(format!("corrupt index key: {err}")))
}

/// A persistent ledger store backed by RocksDB.
///
/// Every table and secondary index lives in its own column family and values
/// are JSON. A [`WriteBatch`] from the application becomes one RocksDB write
/// batch, so a commit either lands completely or not at all, also across a
/// crash. Row locks are in-process: one process owns the database directory.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    locks: RowLocks,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            locks: RowLocks::default(),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf_name)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut rocksdb::WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf_name)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Transaction ids indexed under `prefix`.
    fn indexed_transactions(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<TransactionId>> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf_name)?, IteratorMode::From(prefix, Direction::Forward));
        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            ids.push(tx_id_from_index(&key)?);
        }
        Ok(ids)
    }

    fn load_transactions(&self, ids: Vec<TransactionId>) -> Result<Vec<LedgerTransaction>> {
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tx) = self.get_json(CF_TRANSACTIONS, id.0.as_bytes())? {
                rows.push(tx);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn lock_row(&self, key: RowKey) -> Result<RowGuard> {
        Ok(self.locks.lock(key).await)
    }

    async fn balance(&self, user_id: UserId) -> Result<Option<AccountBalance>> {
        self.get_json(CF_BALANCES, &user_id.0.to_be_bytes())
    }

    async fn balance_by_id(&self, balance_id: BalanceId) -> Result<Option<AccountBalance>> {
        let owner = self.db.get_pinned_cf(self.cf(CF_BALANCE_OWNERS)?, balance_id.0.as_bytes())?;
        match owner {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| LedgerError::Storage(format!("corrupt owner of balance {balance_id}")))?;
                self.get_json(CF_BALANCES, &raw)
            }
            None => Ok(None),
        }
    }

    async fn all_balances(&self) -> Result<Vec<AccountBalance>> {
        let mut balances = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_BALANCES)?, IteratorMode::Start) {
            let (_key, value) = item?;
            balances.push(serde_json::from_slice(&value)?);
        }
        Ok(balances)
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, &order_id.0.to_be_bytes())
    }

    async fn transaction(&self, tx_id: TransactionId) -> Result<Option<LedgerTransaction>> {
        self.get_json(CF_TRANSACTIONS, tx_id.0.as_bytes())
    }

    async fn transactions_for_balance(&self, balance_id: BalanceId) -> Result<Vec<LedgerTransaction>> {
        let ids = self.indexed_transactions(CF_BALANCE_TRANSACTIONS, balance_id.0.as_bytes())?;
        self.load_transactions(ids)
    }

    async fn pending_hold(&self, order_id: OrderId) -> Result<Option<LedgerTransaction>> {
        let ids = self.indexed_transactions(CF_ORDER_TRANSACTIONS, &order_id.0.to_be_bytes())?;
        Ok(self
            .load_transactions(ids)?
            .into_iter()
            .find(|tx| tx.is_pending_hold()))
    }

    async fn transaction_by_session(&self, session_id: &str) -> Result<Option<LedgerTransaction>> {
        let id = self
            .db
            .get_pinned_cf(self.cf(CF_SESSION_TRANSACTIONS)?, session_id.as_bytes())?;
        match id {
            Some(bytes) => {
                let tx_id = tx_id_from_index(&bytes)?;
                self.get_json(CF_TRANSACTIONS, tx_id.0.as_bytes())
            }
            None => Ok(None),
        }
    }

    async fn webhook_event(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        self.get_json(CF_WEBHOOK_EVENTS, event_id.as_bytes())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut write = rocksdb::WriteBatch::default();
        for balance in &batch.balances {
            let user_key = balance.user_id().0.to_be_bytes();
            self.put_json(&mut write, CF_BALANCES, &user_key, balance)?;
            write.put_cf(self.cf(CF_BALANCE_OWNERS)?, balance.id().0.as_bytes(), user_key);
        }
        for order in &batch.orders {
            self.put_json(&mut write, CF_ORDERS, &order.id().0.to_be_bytes(), order)?;
        }
        for tx in &batch.transactions {
            self.put_json(&mut write, CF_TRANSACTIONS, tx.id().0.as_bytes(), tx)?;
            write.put_cf(
                self.cf(CF_BALANCE_TRANSACTIONS)?,
                index_key(tx.balance_id().0.as_bytes(), tx.id()),
                b"",
            );
            if let Some(order_id) = tx.order_id() {
                write.put_cf(
                    self.cf(CF_ORDER_TRANSACTIONS)?,
                    index_key(&order_id.0.to_be_bytes(), tx.id()),
                    b"",
                );
            }
            if let Some(session_id) = tx.checkout_session_id() {
                write.put_cf(self.cf(CF_SESSION_TRANSACTIONS)?, session_id.as_bytes(), tx.id().0.as_bytes());
            }
        }
        for event in &batch.webhook_events {
            self.put_json(&mut write, CF_WEBHOOK_EVENTS, event.event_id.as_bytes(), event)?;
        }
        self.db.write(write)?;
        Ok(())
    }
}
