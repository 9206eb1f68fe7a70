#![allow(dead_code)]

use canteen_ledger::application::Ledger;
use canteen_ledger::config::LedgerConfig;
use canteen_ledger::domain::actor::UserId;
use canteen_ledger::domain::balance::BalanceSnapshot;
use canteen_ledger::domain::order::{NewOrder, Order, OrderId};
use canteen_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use canteen_ledger::infrastructure::sandbox_gateway::SandboxGateway;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn ledger() -> (Ledger, Arc<SandboxGateway>) {
    let gateway = Arc::new(SandboxGateway::new(WEBHOOK_SECRET));
    let ledger = Ledger::new(
        Arc::new(InMemoryLedgerStore::new()),
        gateway.clone(),
        LedgerConfig::default(),
    );
    (ledger, gateway)
}

/// Registers an order served two hours from now.
pub async fn order(ledger: &Ledger, order_id: u64, user_id: u64, total: Decimal) -> Order {
    ledger
        .orders
        .register_order(NewOrder {
            id: OrderId(order_id),
            user_id: UserId(user_id),
            total_amount: total,
            scheduled_window_start: Utc::now() + Duration::hours(2),
        })
        .await
        .unwrap()
}

pub async fn snapshot(ledger: &Ledger, user_id: u64) -> BalanceSnapshot {
    ledger.history.balance_snapshot(UserId(user_id)).await.unwrap()
}

/// Writes `rows` under the standard command header into a temp file.
pub fn command_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,user,order,amount,at,session,event").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}
