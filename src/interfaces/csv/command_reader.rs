use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Deposit,
    Order,
    Place,
    Prepare,
    Capture,
    Complete,
    Cancel,
    Refund,
    Checkout,
    Webhook,
    Sync,
    Expire,
}

/// One row of a command file: `op, user, order, amount, at, session, event`.
///
/// Columns an operation does not use may be left empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerCommand {
    pub op: CommandKind,
    pub user: Option<u64>,
    pub order: Option<u64>,
    pub amount: Option<Decimal>,
    pub at: Option<DateTime<Utc>>,
    pub session: Option<String>,
    pub event: Option<String>,
}

impl LedgerCommand {
    pub fn user(&self) -> Result<u64> {
        self.user.ok_or_else(|| self.missing("user"))
    }

    pub fn order(&self) -> Result<u64> {
        self.order.ok_or_else(|| self.missing("order"))
    }

    pub fn amount(&self) -> Result<Decimal> {
        self.amount.ok_or_else(|| self.missing("amount"))
    }

    pub fn at(&self) -> Result<DateTime<Utc>> {
        self.at.ok_or_else(|| self.missing("at"))
    }

    pub fn session(&self) -> Result<&str> {
        self.session
            .as_deref()
            .filter(|session| !session.is_empty())
            .ok_or_else(|| self.missing("session"))
    }

    pub fn event(&self) -> Result<&str> {
        self.event
            .as_deref()
            .filter(|event| !event.is_empty())
            .ok_or_else(|| self.missing("event"))
    }

    fn missing(&self, column: &str) -> LedgerError {
        LedgerError::InvalidCommand(format!("{:?} needs a value in column `{column}`", self.op))
    }
}

/// Reads ledger commands from a CSV source.
///
/// Whitespace is trimmed and short rows are accepted, so trailing empty
/// columns can be omitted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands, one result per row.
    pub fn commands(self) -> impl Iterator<Item = Result<LedgerCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
