use super::profile::{Profile, ProfileId, ProfileRole};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub u32);

impl From<ContractId> for u32 {
    fn from(id: ContractId) -> Self {
        id.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    New,
    InProgress,
    Terminated,
}

/// An agreement between one client and one contractor, grouping jobs.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Contract {
    pub id: ContractId,
    pub terms: String,
    pub status: ContractStatus,
    pub client_id: ProfileId,
    pub contractor_id: ProfileId,
    #[serde(default)]
    pub version: u64,
}

impl Contract {
    pub fn new(
        id: ContractId,
        terms: impl Into<String>,
        status: ContractStatus,
        client_id: ProfileId,
        contractor_id: ProfileId,
    ) -> Self {
        Self {
            id,
            terms: terms.into(),
            status,
            client_id,
            contractor_id,
            version: 0,
        }
    }

    /// Anything not terminated counts as active.
    pub fn is_active(&self) -> bool {
        self.status != ContractStatus::Terminated
    }

    /// Whether `profile` is the client or the contractor of this contract.
    pub fn involves(&self, profile: ProfileId) -> bool {
        self.client_id == profile || self.contractor_id == profile
    }

    /// Whether `profile` sits on this contract in the seat matching its role.
    pub fn belongs_to(&self, profile: &Profile) -> bool {
        match profile.role {
            ProfileRole::Client => self.client_id == profile.id,
            ProfileRole::Contractor => self.contractor_id == profile.id,
        }
    }
}
