use super::money::{Amount, Balance};
use crate::error::MarketplaceError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub u32);

impl From<ProfileId> for u32 {
    fn from(id: ProfileId) -> Self {
        id.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ProfileRole {
    Client,
    Contractor,
}

impl ProfileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Contractor => "contractor",
        }
    }
}

impl fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person on the marketplace, acting either as a client or as a contractor.
///
/// The balance only changes through [`Profile::credit`] and [`Profile::debit`],
/// which deposits and job payments go through.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Profile {
    pub id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub profession: String,
    pub balance: Balance,
    #[serde(rename = "type")]
    pub role: ProfileRole,
    /// Optimistic concurrency counter, bumped by the store on every committed update.
    #[serde(default)]
    pub version: u64,
}

impl Profile {
    pub fn new(
        id: ProfileId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        profession: impl Into<String>,
        role: ProfileRole,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            profession: profession.into(),
            balance: Balance::ZERO,
            role,
            version: 0,
        }
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = balance;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_client(&self) -> bool {
        self.role == ProfileRole::Client
    }

    pub fn is_contractor(&self) -> bool {
        self.role == ProfileRole::Contractor
    }

    /// Fails with `InvalidRole` unless the profile acts as a client.
    pub fn ensure_client(&self, action: &'static str) -> Result<(), MarketplaceError> {
        if self.is_client() {
            Ok(())
        } else {
            Err(MarketplaceError::InvalidRole {
                profile: self.id.0,
                role: self.role.as_str(),
                action,
            })
        }
    }

    /// Adds funds to the balance, leaving it untouched if the sum overflows.
    pub fn credit(&mut self, amount: Amount) -> Result<(), MarketplaceError> {
        self.balance = self.balance.checked_add(amount.into())?;
        Ok(())
    }

    /// Removes funds from the balance if sufficient, leaving it untouched otherwise.
    pub fn debit(&mut self, amount: Amount) -> Result<(), MarketplaceError> {
        let amount = Balance::from(amount);
        if self.balance >= amount {
            self.balance = self.balance.checked_sub(amount)?;
            Ok(())
        } else {
            Err(MarketplaceError::InsufficientBalance {
                required: amount.value(),
                available: self.balance.value(),
            })
        }
    }
}
