use crate::domain::transaction::LedgerTransaction;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct HistoryRow {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    status: &'static str,
    order: Option<u64>,
    amount: String,
    signed_amount: String,
    remaining_balance: String,
    created_at: String,
}

/// Writes ledger rows as CSV in the order given.
pub struct HistoryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> HistoryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_transactions(&mut self, rows: &[LedgerTransaction]) -> Result<()> {
        for tx in rows {
            self.writer.serialize(HistoryRow {
                id: tx.id().to_string(),
                kind: tx.transaction_type().as_str(),
                status: tx.status().as_str(),
                order: tx.order_id().map(|order_id| order_id.0),
                amount: tx.amount().to_string(),
                signed_amount: tx.signed_amount().to_string(),
                remaining_balance: tx.remaining_balance().to_string(),
                created_at: tx.created_at().to_rfc3339(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
