use crate::domain::balance::BalanceSnapshot;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow {
    user: u64,
    current: String,
    on_hold: String,
    available: String,
}

/// Writes balance snapshots as `user,current,on_hold,available`, sorted by user.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances(&mut self, mut balances: Vec<BalanceSnapshot>) -> Result<()> {
        balances.sort_by_key(|snapshot| snapshot.user_id);
        if balances.is_empty() {
            self.writer.write_record(["user", "current", "on_hold", "available"])?;
        }
        for snapshot in balances {
            self.writer.serialize(BalanceRow {
                user: snapshot.user_id.0,
                current: snapshot.current_balance.to_string(),
                on_hold: snapshot.on_hold.to_string(),
                available: snapshot.available.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
