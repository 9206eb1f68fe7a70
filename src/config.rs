//! Runtime settings of the ledger services.

use crate::domain::money::Money;
use crate::error::{LedgerError, Result};
use chrono::Duration;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Currency code passed to the payment gateway for top-ups.
    pub currency: String,
    /// How long before the menu window starts a customer may still cancel.
    pub cancellation_cutoff_minutes: i64,
    /// Upper bound for a single deposit or top-up.
    pub max_deposit: Money,
    /// Default page size for transaction history.
    pub page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            cancellation_cutoff_minutes: 15,
            max_deposit: Money::new(dec!(10000.00)),
            page_size: 20,
        }
    }
}

impl LedgerConfig {
    /// The cutoff as a duration. Negative or out-of-range minutes are rejected.
    pub fn cancellation_cutoff(&self) -> Result<Duration> {
        if self.cancellation_cutoff_minutes < 0 {
            return Err(LedgerError::InvalidConfig(format!(
                "cancellation cutoff must not be negative, got {} minutes",
                self.cancellation_cutoff_minutes
            )));
        }
        Duration::try_minutes(self.cancellation_cutoff_minutes).ok_or_else(|| {
            LedgerError::InvalidConfig(format!(
                "cancellation cutoff of {} minutes is out of range",
                self.cancellation_cutoff_minutes
            ))
        })
    }

    /// Checks every setting once, before any service is built on top of it.
    pub fn validate(&self) -> Result<()> {
        self.cancellation_cutoff()?;
        if self.max_deposit <= Money::ZERO {
            return Err(LedgerError::InvalidConfig(format!(
                "max deposit must be positive, got {}",
                self.max_deposit
            )));
        }
        if self.page_size == 0 {
            return Err(LedgerError::InvalidConfig("page size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.cancellation_cutoff().unwrap(), Duration::minutes(15));
        assert_eq!(config.max_deposit.to_string(), "10000.00");
        assert_eq!(config.page_size, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cutoff_out_of_range_is_rejected() {
        for minutes in [-1, i64::MAX, i64::MIN] {
            let config = LedgerConfig {
                cancellation_cutoff_minutes: minutes,
                ..LedgerConfig::default()
            };
            assert!(matches!(
                config.cancellation_cutoff(),
                Err(LedgerError::InvalidConfig(_))
            ));
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_validate_rejects_empty_limits() {
        let config = LedgerConfig {
            max_deposit: Money::ZERO,
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::InvalidConfig(_))));
        let config = LedgerConfig {
            page_size: 0,
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::InvalidConfig(_))));
    }
}
