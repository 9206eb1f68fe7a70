//! Driving adapters: command files in, balance and history reports out.

pub mod csv;
pub mod replay;
