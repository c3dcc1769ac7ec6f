use crate::error::{MarketplaceError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Share of the unpaid active-contract total a single deposit may reach.
pub const DEFAULT_DEPOSIT_LIMIT_PERCENT: Decimal = dec!(25);

/// Rows returned by the best clients report when no limit is given.
pub const DEFAULT_BEST_CLIENTS_LIMIT: usize = 2;

/// Tunables of the marketplace engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceConfig {
    /// A deposit may be at most this percentage of the profile's unpaid
    /// active-contract job total.
    pub deposit_limit_percent: Decimal,
    /// Default `limit` of [`best_clients`](crate::application::engine::MarketplaceEngine::best_clients).
    pub best_clients_limit: usize,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            deposit_limit_percent: DEFAULT_DEPOSIT_LIMIT_PERCENT,
            best_clients_limit: DEFAULT_BEST_CLIENTS_LIMIT,
        }
    }
}

impl MarketplaceConfig {
    pub fn new(deposit_limit_percent: Decimal, best_clients_limit: usize) -> Result<Self> {
        let config = Self {
            deposit_limit_percent,
            best_clients_limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.deposit_limit_percent <= Decimal::ZERO
            || self.deposit_limit_percent > Decimal::ONE_HUNDRED
        {
            return Err(MarketplaceError::validation(format!(
                "deposit limit percent must be in (0, 100], got {}",
                self.deposit_limit_percent
            )));
        }
        if self.best_clients_limit == 0 {
            return Err(MarketplaceError::validation(
                "best clients limit must be at least 1",
            ));
        }
        Ok(())
    }
}
