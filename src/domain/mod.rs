//! Ledger entities, value objects and the ports the application layer drives.

pub mod actor;
pub mod balance;
pub mod money;
pub mod order;
pub mod ports;
pub mod transaction;
pub mod webhook;
