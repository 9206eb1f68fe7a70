use super::csv::command_reader::{CommandKind, LedgerCommand};
use crate::application::Ledger;
use crate::domain::actor::{Actor, UserId};
use crate::domain::balance::BalanceSnapshot;
use crate::domain::order::{NewOrder, OrderId};
use crate::error::Result;
use crate::infrastructure::sandbox_gateway::SandboxGateway;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Applies command rows to a [`Ledger`] wired to a [`SandboxGateway`].
///
/// Command files name checkout sessions by an alias of their choice; the
/// replay maps each alias to the id the gateway actually issued.
pub struct CommandReplay {
    ledger: Ledger,
    gateway: Arc<SandboxGateway>,
    sessions: HashMap<String, String>,
}

impl CommandReplay {
    pub fn new(ledger: Ledger, gateway: Arc<SandboxGateway>) -> Self {
        Self {
            ledger,
            gateway,
            sessions: HashMap::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Runs one command. Staff operations act as staff member `user` (0 when empty).
    pub async fn apply(&mut self, command: &LedgerCommand) -> Result<()> {
        let staff = Actor::staff(command.user.unwrap_or_default());
        match command.op {
            CommandKind::Deposit => {
                self.ledger
                    .engine
                    .deposit(UserId(command.user()?), command.amount()?)
                    .await?;
            }
            CommandKind::Order => {
                self.ledger
                    .orders
                    .register_order(NewOrder {
                        id: OrderId(command.order()?),
                        user_id: UserId(command.user()?),
                        total_amount: command.amount()?,
                        scheduled_window_start: command.at()?,
                    })
                    .await?;
            }
            CommandKind::Place => {
                self.ledger
                    .orders
                    .place_order(Actor::customer(command.user()?), OrderId(command.order()?))
                    .await?;
            }
            CommandKind::Prepare => {
                self.ledger
                    .orders
                    .start_preparing(staff, OrderId(command.order()?))
                    .await?;
            }
            CommandKind::Capture => {
                self.ledger.orders.capture(staff, OrderId(command.order()?)).await?;
            }
            CommandKind::Complete => {
                self.ledger.orders.complete(staff, OrderId(command.order()?)).await?;
            }
            CommandKind::Refund => {
                self.ledger.orders.refund(staff, OrderId(command.order()?)).await?;
            }
            CommandKind::Cancel => {
                let now = command.at.unwrap_or_else(Utc::now);
                self.ledger
                    .orders
                    .cancel(Actor::customer(command.user()?), OrderId(command.order()?), now)
                    .await?;
            }
            CommandKind::Checkout => {
                let user = command.user()?;
                let opened = self
                    .ledger
                    .checkout
                    .open_checkout(Actor::customer(user), UserId(user), command.amount()?)
                    .await?;
                self.sessions
                    .insert(command.session()?.to_string(), opened.session.session_id);
            }
            CommandKind::Webhook => {
                let session_id = self.resolve(command.session()?);
                let payload = self.gateway.complete_session(&session_id, command.event()?)?;
                let signature = self.gateway.sign(payload.as_bytes())?;
                let receipt = self
                    .ledger
                    .webhooks
                    .handle_webhook_event(payload.as_bytes(), &signature)
                    .await?;
                debug!(event_id = %receipt.event_id, outcome = ?receipt.outcome, "webhook delivered");
            }
            CommandKind::Sync => {
                let session_id = self.resolve(command.session()?);
                let outcome = self.ledger.webhooks.reconcile_session(&session_id).await?;
                debug!(session_id = %session_id, outcome = ?outcome, "session reconciled");
            }
            CommandKind::Expire => {
                let session_id = self.resolve(command.session()?);
                self.gateway.expire_session(&session_id)?;
            }
        }
        Ok(())
    }

    /// Snapshots of every balance in the store.
    pub async fn balances(&self) -> Result<Vec<BalanceSnapshot>> {
        Ok(self
            .ledger
            .engine
            .store()
            .all_balances()
            .await?
            .iter()
            .map(|balance| balance.snapshot())
            .collect())
    }

    fn resolve(&self, alias: &str) -> String {
        self.sessions
            .get(alias)
            .cloned()
            .unwrap_or_else(|| alias.to_string())
    }
}
