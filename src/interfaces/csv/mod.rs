pub mod balance_writer;
pub mod command_reader;
pub mod history_writer;
