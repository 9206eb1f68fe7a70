use crate::config::LedgerConfig;
use crate::domain::actor::UserId;
use crate::domain::balance::BalanceSnapshot;
use crate::domain::order::OrderId;
use crate::domain::ports::LedgerStoreRef;
use crate::domain::transaction::{LedgerTransaction, TransactionId, TransactionStatus, TransactionType};
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub order_id: Option<OrderId>,
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Self::default()
        }
    }

    fn matches(&self, tx: &LedgerTransaction) -> bool {
        self.order_id.is_none_or(|order_id| tx.order_id() == Some(order_id))
            && self.kind.is_none_or(|kind| tx.transaction_type() == kind)
            && self.status.is_none_or(|status| tx.status() == status)
    }
}

/// One page of a listing. Pages are numbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page
            .checked_mul(self.page_size)
            .is_some_and(|seen| seen < self.total)
    }
}

/// Read-only views of balances and ledger rows for presentation layers.
///
/// Nothing here locks or creates rows.
#[derive(Clone)]
pub struct LedgerHistory {
    store: LedgerStoreRef,
    page_size: usize,
}

impl LedgerHistory {
    pub fn new(store: LedgerStoreRef, config: &LedgerConfig) -> Self {
        Self {
            store,
            page_size: config.page_size.max(1),
        }
    }

    /// The user's balance, or a zero snapshot if they never had one.
    pub async fn balance_snapshot(&self, user_id: UserId) -> Result<BalanceSnapshot> {
        Ok(self
            .store
            .balance(user_id)
            .await?
            .map(|balance| balance.snapshot())
            .unwrap_or_else(|| BalanceSnapshot::empty(user_id)))
    }

    /// The user's ledger rows matching `filter`, newest first.
    pub async fn transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
        page: usize,
    ) -> Result<Page<LedgerTransaction>> {
        let page = page.max(1);
        let mut rows = match self.store.balance(user_id).await? {
            Some(balance) => self.store.transactions_for_balance(balance.id()).await?,
            None => Vec::new(),
        };
        rows.retain(|tx| filter.matches(tx));
        rows.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().0.cmp(&a.id().0))
        });

        let total = rows.len();
        // past the end when the offset does not fit
        let offset = (page - 1).checked_mul(self.page_size).unwrap_or(total);
        let items = rows.into_iter().skip(offset).take(self.page_size).collect();
        Ok(Page {
            items,
            page,
            page_size: self.page_size,
            total,
        })
    }

    /// One of the user's ledger rows. Rows of other users are reported as missing.
    pub async fn transaction(&self, user_id: UserId, tx_id: TransactionId) -> Result<LedgerTransaction> {
        let balance = self.store.balance(user_id).await?;
        match (balance, self.store.transaction(tx_id).await?) {
            (Some(balance), Some(tx)) if tx.balance_id() == balance.id() => Ok(tx),
            _ => Err(LedgerError::TransactionNotFound(tx_id)),
        }
    }
}
