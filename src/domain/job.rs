use super::contract::ContractId;
use super::money::Amount;
use crate::error::MarketplaceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u32);

impl From<JobId> for u32 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A unit of billable work under a contract.
///
/// The price is fixed at construction and has no setter. Payment state is
/// a single optional timestamp, so a job is paid exactly when it carries a
/// payment date.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Job {
    id: JobId,
    contract_id: ContractId,
    description: String,
    price: Amount,
    payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl Job {
    pub fn new(
        id: JobId,
        contract_id: ContractId,
        description: impl Into<String>,
        price: Amount,
    ) -> Self {
        Self {
            id,
            contract_id,
            description: description.into(),
            price,
            payment_date: None,
            version: 0,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Amount {
        self.price
    }

    pub fn is_paid(&self) -> bool {
        self.payment_date.is_some()
    }

    pub fn payment_date(&self) -> Option<DateTime<Utc>> {
        self.payment_date
    }

    /// Whether the job was paid within `[start, end]`.
    pub fn paid_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.payment_date
            .is_some_and(|paid_at| start <= paid_at && paid_at <= end)
    }

    /// Records the payment. Only the first call succeeds.
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> Result<(), MarketplaceError> {
        if self.is_paid() {
            return Err(MarketplaceError::AlreadyPaid(self.id.0));
        }
        self.payment_date = Some(at);
        Ok(())
    }
}
