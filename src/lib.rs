//! Wallet ledger and order-payment lifecycle for a canteen ordering backend.
//!
//! Balances are reserved when an order is placed, captured or released as the
//! order moves on, refunded after payment, and topped up through payment
//! provider webhooks that are applied exactly once.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod logging;
