use super::changeset::Changeset;
use crate::domain::contract::{Contract, ContractId};
use crate::domain::job::{Job, JobId};
use crate::domain::ports::{MarketplaceStore, StoreTransaction, StoreTransactionBox};
use crate::domain::profile::{Profile, ProfileId};
use crate::domain::report::ReportWindow;
use crate::error::{MarketplaceError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    profiles: BTreeMap<ProfileId, Profile>,
    contracts: BTreeMap<ContractId, Contract>,
    jobs: BTreeMap<JobId, Job>,
}

/// A thread-safe in-memory marketplace store.
///
/// Uses `Arc<RwLock<..>>` so clones share the same tables. Transactions read
/// under the read lock and commit under the write lock, which doubles as the
/// commit lock serializing validation and apply.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryStore {
    async fn begin(&self) -> Result<StoreTransactionBox> {
        Ok(Box::new(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            changes: Changeset::default(),
        }))
    }
}

pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    changes: Changeset,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_profile(&self, id: ProfileId) -> Result<Option<Profile>> {
        if let Some(profile) = self.changes.profiles.get(id) {
            return Ok(Some(profile.clone()));
        }
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn find_contract(&self, id: ContractId) -> Result<Option<Contract>> {
        if let Some(contract) = self.changes.contracts.get(id) {
            return Ok(Some(contract.clone()));
        }
        Ok(self.tables.read().await.contracts.get(&id).cloned())
    }

    async fn find_job(&self, id: JobId) -> Result<Option<Job>> {
        if let Some(job) = self.changes.jobs.get(id) {
            return Ok(Some(job.clone()));
        }
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn contracts_involving(&self, profile: ProfileId) -> Result<Vec<Contract>> {
        let tables = self.tables.read().await;
        Ok(self.changes.contracts.overlay(
            tables.contracts.values().cloned(),
            |contract| contract.involves(profile),
        ))
    }

    async fn jobs_of_contract(&self, contract: ContractId) -> Result<Vec<Job>> {
        let tables = self.tables.read().await;
        Ok(self
            .changes
            .jobs
            .overlay(tables.jobs.values().cloned(), |job| {
                job.contract_id() == contract
            }))
    }

    async fn jobs_paid_within(&self, window: ReportWindow) -> Result<Vec<Job>> {
        let tables = self.tables.read().await;
        Ok(self
            .changes
            .jobs
            .overlay(tables.jobs.values().cloned(), |job| {
                job.paid_between(window.start(), window.end())
            }))
    }

    async fn create_profile(&mut self, profile: Profile) -> Result<()> {
        if self.tables.read().await.profiles.contains_key(&profile.id) {
            return Err(MarketplaceError::conflict(format!(
                "Profile {} already exists",
                profile.id
            )));
        }
        self.changes.profiles.create(profile)
    }

    async fn create_contract(&mut self, contract: Contract) -> Result<()> {
        if self.tables.read().await.contracts.contains_key(&contract.id) {
            return Err(MarketplaceError::conflict(format!(
                "Contract {} already exists",
                contract.id
            )));
        }
        self.changes.contracts.create(contract)
    }

    async fn create_job(&mut self, job: Job) -> Result<()> {
        if self.tables.read().await.jobs.contains_key(&job.id()) {
            return Err(MarketplaceError::conflict(format!(
                "Job {} already exists",
                job.id()
            )));
        }
        self.changes.jobs.create(job)
    }

    async fn update_profile(&mut self, profile: Profile) -> Result<()> {
        self.changes.profiles.update(profile);
        Ok(())
    }

    async fn update_job(&mut self, job: Job) -> Result<()> {
        self.changes.jobs.update(job);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let changes = std::mem::take(&mut self.changes);
        if changes.is_empty() {
            return Ok(());
        }
        let writes = changes.len();

        let tables = Arc::clone(&self.tables);
        let mut tables = tables.write().await;

        let validated = changes
            .profiles
            .validate(|id| Ok(tables.profiles.get(&id).map(|p| p.version)))
            .and_then(|()| {
                changes
                    .contracts
                    .validate(|id| Ok(tables.contracts.get(&id).map(|c| c.version)))
            })
            .and_then(|()| {
                changes
                    .jobs
                    .validate(|id| Ok(tables.jobs.get(&id).map(|j| j.version)))
            });
        if let Err(err) = validated {
            tracing::warn!(%err, writes, "rejected in-memory commit");
            return Err(err);
        }

        for profile in changes.profiles.into_records() {
            tables.profiles.insert(profile.id, profile);
        }
        for contract in changes.contracts.into_records() {
            tables.contracts.insert(contract.id, contract);
        }
        for job in changes.jobs.into_records() {
            tables.jobs.insert(job.id(), job);
        }

        tracing::debug!(writes, "committed in-memory transaction");
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.changes.is_empty() {
            tracing::debug!(
                discarded = self.changes.len(),
                "rolled back in-memory transaction"
            );
        }
    }
}
