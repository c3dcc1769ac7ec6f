use super::money::Balance;
use super::profile::ProfileId;
use crate::error::MarketplaceError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// An inclusive time window over job payment dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, MarketplaceError> {
        if start > end {
            return Err(MarketplaceError::validation(format!(
                "Report window starts ({start}) after it ends ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// The profession whose contractors earned the most in a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfessionEarnings {
    pub profession: String,
    pub earned: Balance,
}

/// One row of the best clients report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientPayment {
    pub id: ProfileId,
    pub full_name: String,
    pub paid: Balance,
}
