use super::contract::{Contract, ContractId};
use super::job::{Job, JobId};
use super::profile::{Profile, ProfileId};
use super::report::ReportWindow;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Entry point to the shared store. Every unit of work goes through a
/// [`StoreTransaction`] obtained from [`MarketplaceStore::begin`].
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn begin(&self) -> Result<StoreTransactionBox>;
}

/// A unit of work against the store.
///
/// Reads observe the committed state overlaid with this transaction's own
/// writes. Writes stay private until [`StoreTransaction::commit`] applies
/// all of them at once; dropping the transaction discards them.
///
/// Commit fails with `Conflict` if any updated record changed since it was
/// read (its `version` moved) or any created id was taken in the meantime.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    async fn find_profile(&self, id: ProfileId) -> Result<Option<Profile>>;
    async fn find_contract(&self, id: ContractId) -> Result<Option<Contract>>;
    async fn find_job(&self, id: JobId) -> Result<Option<Job>>;

    /// Contracts where the profile is either the client or the contractor, by id.
    async fn contracts_involving(&self, profile: ProfileId) -> Result<Vec<Contract>>;
    /// Jobs of one contract, by id.
    async fn jobs_of_contract(&self, contract: ContractId) -> Result<Vec<Job>>;
    /// Jobs whose payment date falls in the window, by id.
    async fn jobs_paid_within(&self, window: ReportWindow) -> Result<Vec<Job>>;

    async fn create_profile(&mut self, profile: Profile) -> Result<()>;
    async fn create_contract(&mut self, contract: Contract) -> Result<()>;
    async fn create_job(&mut self, job: Job) -> Result<()>;

    async fn update_profile(&mut self, profile: Profile) -> Result<()>;
    async fn update_job(&mut self, job: Job) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

pub type StoreHandle = Arc<dyn MarketplaceStore>;
pub type StoreTransactionBox = Box<dyn StoreTransaction>;
