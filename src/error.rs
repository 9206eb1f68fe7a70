use crate::domain::actor::UserId;
use crate::domain::money::Money;
use crate::domain::order::{OrderId, OrderStatus};
use crate::domain::transaction::TransactionId;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// How a calling layer should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Forbidden,
    External,
    Internal,
}

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("Invalid amount {amount}: {reason}")]
    #[diagnostic(code(ledger::invalid_amount))]
    InvalidAmount { amount: Decimal, reason: String },

    #[error("Insufficient funds: {available} available, {required} required")]
    #[diagnostic(code(ledger::insufficient_funds))]
    InsufficientFunds { available: Money, required: Money },

    #[error("Order {order_id} is {status} and cannot be used for {operation}")]
    #[diagnostic(code(ledger::invalid_order_state))]
    InvalidOrderState {
        order_id: OrderId,
        status: OrderStatus,
        operation: &'static str,
    },

    #[error("Order {0} has no pending hold")]
    #[diagnostic(code(ledger::missing_hold))]
    MissingHold(OrderId),

    #[error("Held funds of user {user_id} ({on_hold}) do not cover {required}")]
    #[diagnostic(code(ledger::hold_mismatch))]
    HoldMismatch {
        user_id: UserId,
        on_hold: Money,
        required: Money,
    },

    #[error("Order {0} not found")]
    #[diagnostic(code(ledger::order_not_found))]
    OrderNotFound(OrderId),

    #[error("Order {0} already exists")]
    #[diagnostic(code(ledger::order_exists))]
    OrderAlreadyExists(OrderId),

    #[error("Transaction {0} not found")]
    #[diagnostic(code(ledger::transaction_not_found))]
    TransactionNotFound(TransactionId),

    #[error("No transaction for checkout session {0}")]
    #[diagnostic(code(ledger::session_not_found))]
    SessionNotFound(String),

    #[error("Cancellation deadline for order {order_id} passed at {deadline}")]
    #[diagnostic(code(ledger::deadline_passed))]
    DeadlinePassed {
        order_id: OrderId,
        deadline: DateTime<Utc>,
    },

    #[error("Forbidden: {0}")]
    #[diagnostic(code(ledger::forbidden))]
    Forbidden(String),

    #[error("Invalid webhook signature: {0}")]
    #[diagnostic(code(ledger::invalid_signature))]
    InvalidSignature(String),

    #[error("Payment gateway error: {0}")]
    #[diagnostic(code(ledger::gateway))]
    Gateway(String),

    #[error("Storage error: {0}")]
    #[diagnostic(code(ledger::storage))]
    Storage(String),

    #[error("Invalid command: {0}")]
    #[diagnostic(code(ledger::invalid_command))]
    InvalidCommand(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(ledger::invalid_config))]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    #[diagnostic(code(ledger::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(ledger::io))]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(ledger::json))]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount { .. } => "invalid_amount",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::InvalidOrderState { .. } => "invalid_order_state",
            LedgerError::MissingHold(_) => "missing_hold",
            LedgerError::HoldMismatch { .. } => "hold_mismatch",
            LedgerError::OrderNotFound(_) => "order_not_found",
            LedgerError::OrderAlreadyExists(_) => "order_exists",
            LedgerError::TransactionNotFound(_) => "transaction_not_found",
            LedgerError::SessionNotFound(_) => "session_not_found",
            LedgerError::DeadlinePassed { .. } => "deadline_passed",
            LedgerError::Forbidden(_) => "forbidden",
            LedgerError::InvalidSignature(_) => "invalid_signature",
            LedgerError::Gateway(_) => "gateway_error",
            LedgerError::Storage(_) => "storage_error",
            LedgerError::InvalidCommand(_) => "invalid_command",
            LedgerError::InvalidConfig(_) => "invalid_config",
            LedgerError::Csv(_) => "csv_error",
            LedgerError::Io(_) => "io_error",
            LedgerError::Json(_) => "json_error",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidCommand(_)
            | LedgerError::InvalidConfig(_)
            | LedgerError::Csv(_) => ErrorKind::Validation,
            LedgerError::InsufficientFunds { .. }
            | LedgerError::InvalidOrderState { .. }
            | LedgerError::MissingHold(_)
            | LedgerError::OrderAlreadyExists(_)
            | LedgerError::DeadlinePassed { .. } => ErrorKind::Conflict,
            LedgerError::OrderNotFound(_)
            | LedgerError::TransactionNotFound(_)
            | LedgerError::SessionNotFound(_) => ErrorKind::NotFound,
            LedgerError::Forbidden(_) => ErrorKind::Forbidden,
            LedgerError::InvalidSignature(_) | LedgerError::Gateway(_) => ErrorKind::External,
            LedgerError::HoldMismatch { .. }
            | LedgerError::Storage(_)
            | LedgerError::Io(_)
            | LedgerError::Json(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show an end user. Internal failures stay generic.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "The operation could not be completed.".to_string(),
            _ => self.to_string(),
        }
    }
}
