//! Application layer: the ledger's use cases on top of the storage and gateway ports.
//!
//! Every balance mutation goes through the [`balance_engine::BalanceEngine`];
//! the other services add authorization, order lifecycle and webhook
//! idempotency around it.

pub mod balance_engine;
pub mod checkout;
pub mod history;
pub mod order_payment;
pub(crate) mod unit_of_work;
pub mod webhook;

use crate::config::LedgerConfig;
use crate::domain::ports::{LedgerStoreRef, PaymentGatewayRef};
use balance_engine::BalanceEngine;
use checkout::CheckoutService;
use history::LedgerHistory;
use order_payment::OrderPaymentService;
use webhook::WebhookReconciler;

/// All ledger services wired to one store and one gateway.
#[derive(Clone)]
pub struct Ledger {
    pub engine: BalanceEngine,
    pub orders: OrderPaymentService,
    pub webhooks: WebhookReconciler,
    pub checkout: CheckoutService,
    pub history: LedgerHistory,
}

impl Ledger {
    pub fn new(store: LedgerStoreRef, gateway: PaymentGatewayRef, config: LedgerConfig) -> Self {
        let history = LedgerHistory::new(store.clone(), &config);
        let engine = BalanceEngine::new(store, config);
        Self {
            orders: OrderPaymentService::new(engine.clone()),
            webhooks: WebhookReconciler::new(engine.clone(), gateway.clone()),
            checkout: CheckoutService::new(engine.clone(), gateway),
            history,
            engine,
        }
    }
}
