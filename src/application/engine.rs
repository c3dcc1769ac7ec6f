use crate::config::MarketplaceConfig;
use crate::domain::contract::{Contract, ContractId};
use crate::domain::dataset::DataSet;
use crate::domain::job::Job;
use crate::domain::money::Balance;
use crate::domain::ports::{StoreHandle, StoreTransaction};
use crate::domain::profile::{Profile, ProfileId};
use crate::error::{MarketplaceError, Result};
use mockable::{Clock, DefaultClock};
use std::sync::Arc;

/// The main entry point of the marketplace.
///
/// `MarketplaceEngine` owns a handle to the store and runs every operation in
/// its own store transaction. Mutating operations live in
/// [`payment`](super::payment), read-only reports in [`reports`](super::reports).
/// The engine is cheap to share behind an `Arc` across tasks.
pub struct MarketplaceEngine<C = DefaultClock>
where
    C: Clock + Send + Sync,
{
    pub(super) store: StoreHandle,
    pub(super) config: MarketplaceConfig,
    pub(super) clock: Arc<C>,
}

/// Counts of the records written by [`MarketplaceEngine::import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub profiles: usize,
    pub contracts: usize,
    pub jobs: usize,
}

impl MarketplaceEngine<DefaultClock> {
    /// Creates an engine stamping payments with the system clock.
    pub fn new(store: StoreHandle, config: MarketplaceConfig) -> Self {
        Self::with_clock(store, config, Arc::new(DefaultClock))
    }
}

impl<C> MarketplaceEngine<C>
where
    C: Clock + Send + Sync,
{
    pub fn with_clock(store: StoreHandle, config: MarketplaceConfig, clock: Arc<C>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Resolves the caller's profile.
    ///
    /// An unknown id means the caller cannot be identified, so this fails
    /// with `Unauthorized` rather than `NotFound`.
    pub async fn profile(&self, id: ProfileId) -> Result<Profile> {
        let tx = self.store.begin().await?;
        caller(tx.as_ref(), id).await
    }

    /// Contracts the caller is a party to that are not terminated.
    pub async fn active_contracts(&self, profile_id: ProfileId) -> Result<Vec<Contract>> {
        let tx = self.store.begin().await?;
        let profile = caller(tx.as_ref(), profile_id).await?;
        active_contracts_of(tx.as_ref(), &profile).await
    }

    /// A single contract, visible only to one of its two parties.
    pub async fn contract(&self, profile_id: ProfileId, contract_id: ContractId) -> Result<Contract> {
        let tx = self.store.begin().await?;
        let profile = caller(tx.as_ref(), profile_id).await?;
        tx.find_contract(contract_id)
            .await?
            .filter(|contract| contract.involves(profile.id))
            .ok_or_else(|| MarketplaceError::not_found("Contract", contract_id))
    }

    /// Unpaid jobs of the caller's active contracts, ordered by job id.
    pub async fn unpaid_jobs(&self, profile_id: ProfileId) -> Result<Vec<Job>> {
        let tx = self.store.begin().await?;
        let profile = caller(tx.as_ref(), profile_id).await?;
        unpaid_jobs_of(tx.as_ref(), &profile).await
    }

    /// Sum of the prices returned by [`unpaid_jobs`](Self::unpaid_jobs).
    pub async fn unpaid_jobs_total(&self, profile_id: ProfileId) -> Result<Balance> {
        Balance::total(self.unpaid_jobs(profile_id).await?.iter().map(Job::price))
    }

    /// Loads a batch of records in a single transaction.
    ///
    /// References are checked against the batch and the store combined, so a
    /// contract may point at a profile created earlier in the same batch. Any
    /// failure leaves the store untouched.
    pub async fn import(&self, data: DataSet) -> Result<ImportSummary> {
        let summary = ImportSummary {
            profiles: data.profiles.len(),
            contracts: data.contracts.len(),
            jobs: data.jobs.len(),
        };
        let mut tx = self.store.begin().await?;

        for profile in data.profiles {
            tx.create_profile(profile).await?;
        }

        for contract in data.contracts {
            let client = load_profile(tx.as_ref(), contract.client_id).await?;
            if !client.is_client() {
                return Err(MarketplaceError::validation(format!(
                    "contract {} names profile {} as client but it is a {}",
                    contract.id, client.id, client.role
                )));
            }
            let contractor = load_profile(tx.as_ref(), contract.contractor_id).await?;
            if !contractor.is_contractor() {
                return Err(MarketplaceError::validation(format!(
                    "contract {} names profile {} as contractor but it is a {}",
                    contract.id, contractor.id, contractor.role
                )));
            }
            tx.create_contract(contract).await?;
        }

        for job in data.jobs {
            if tx.find_contract(job.contract_id()).await?.is_none() {
                return Err(MarketplaceError::not_found("Contract", job.contract_id()));
            }
            tx.create_job(job).await?;
        }

        tx.commit().await?;
        tracing::info!(
            profiles = summary.profiles,
            contracts = summary.contracts,
            jobs = summary.jobs,
            "imported records"
        );
        Ok(summary)
    }
}

/// Loads a profile referenced by another record.
pub(super) async fn load_profile(tx: &dyn StoreTransaction, id: ProfileId) -> Result<Profile> {
    tx.find_profile(id)
        .await?
        .ok_or_else(|| MarketplaceError::not_found("Profile", id))
}

async fn caller(tx: &dyn StoreTransaction, id: ProfileId) -> Result<Profile> {
    tx.find_profile(id)
        .await?
        .ok_or(MarketplaceError::Unauthorized(id.0))
}

pub(super) async fn active_contracts_of(
    tx: &dyn StoreTransaction,
    profile: &Profile,
) -> Result<Vec<Contract>> {
    Ok(tx
        .contracts_involving(profile.id)
        .await?
        .into_iter()
        .filter(Contract::is_active)
        .collect())
}

/// Unpaid jobs on the active contracts where `profile` sits in the seat of its role.
pub(super) async fn unpaid_jobs_of(tx: &dyn StoreTransaction, profile: &Profile) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    for contract in active_contracts_of(tx, profile).await? {
        if !contract.belongs_to(profile) {
            continue;
        }
        jobs.extend(
            tx.jobs_of_contract(contract.id)
                .await?
                .into_iter()
                .filter(|job| !job.is_paid()),
        );
    }
    jobs.sort_by_key(Job::id);
    Ok(jobs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::contract::ContractStatus;
    use crate::domain::job::JobId;
    use crate::domain::money::Amount;
    use crate::domain::profile::ProfileRole;
    use crate::infrastructure::in_memory::InMemoryStore;
    use chrono::{DateTime, Local, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// A clock frozen at a fixed instant.
    pub(crate) struct FixedClock(pub DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    pub(crate) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    pub(crate) fn client(id: u32, first: &str, last: &str, balance: Decimal) -> Profile {
        Profile::new(ProfileId(id), first, last, "Wizard", ProfileRole::Client)
            .with_balance(Balance::new(balance))
    }

    pub(crate) fn contractor(id: u32, profession: &str) -> Profile {
        Profile::new(ProfileId(id), "John", "Lenon", profession, ProfileRole::Contractor)
    }

    pub(crate) fn contract(id: u32, status: ContractStatus, client: u32, contractor: u32) -> Contract {
        Contract::new(
            ContractId(id),
            "bla bla bla",
            status,
            ProfileId(client),
            ProfileId(contractor),
        )
    }

    pub(crate) fn job(id: u32, contract: u32, price: Decimal) -> Job {
        Job::new(JobId(id), ContractId(contract), "work", Amount::new(price).unwrap())
    }

    pub(crate) fn paid_job(id: u32, contract: u32, price: Decimal, on: DateTime<Utc>) -> Job {
        let mut job = job(id, contract, price);
        job.mark_paid(on).unwrap();
        job
    }

    /// Two clients, two contractors and a mix of contracts and jobs.
    pub(crate) fn sample_data() -> DataSet {
        DataSet {
            profiles: vec![
                client(1, "Harry", "Potter", dec!(1150)),
                client(2, "Mr", "Robot", dec!(231.11)),
                contractor(5, "Musician"),
                contractor(6, "Programmer"),
            ],
            contracts: vec![
                contract(1, ContractStatus::Terminated, 1, 5),
                contract(2, ContractStatus::InProgress, 1, 6),
                contract(3, ContractStatus::New, 2, 6),
                contract(4, ContractStatus::InProgress, 2, 5),
            ],
            jobs: vec![
                job(1, 1, dec!(200)),
                job(2, 2, dec!(201)),
                job(3, 3, dec!(202)),
                job(4, 4, dec!(200)),
                paid_job(5, 2, dec!(2020), at(2020, 8, 15)),
                paid_job(6, 4, dec!(21), at(2020, 8, 16)),
            ],
        }
    }

    pub(crate) async fn engine_with(data: DataSet) -> MarketplaceEngine<FixedClock> {
        let engine = MarketplaceEngine::with_clock(
            Arc::new(InMemoryStore::new()),
            MarketplaceConfig::default(),
            Arc::new(FixedClock(at(2021, 1, 1))),
        );
        engine.import(data).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_unknown_caller_is_unauthorized() {
        let engine = engine_with(sample_data()).await;
        assert!(matches!(
            engine.profile(ProfileId(99)).await,
            Err(MarketplaceError::Unauthorized(99))
        ));
        assert!(matches!(
            engine.unpaid_jobs(ProfileId(99)).await,
            Err(MarketplaceError::Unauthorized(99))
        ));
        assert_eq!(engine.profile(ProfileId(1)).await.unwrap().first_name, "Harry");
    }

    #[tokio::test]
    async fn test_active_contracts_exclude_terminated() {
        let engine = engine_with(sample_data()).await;

        let ids: Vec<_> = engine
            .active_contracts(ProfileId(1))
            .await
            .unwrap()
            .iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(ids, vec![2]);

        let ids: Vec<_> = engine
            .active_contracts(ProfileId(6))
            .await
            .unwrap()
            .iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_contract_is_visible_to_its_parties_only() {
        let engine = engine_with(sample_data()).await;

        let found = engine.contract(ProfileId(5), ContractId(1)).await.unwrap();
        assert_eq!(found.status, ContractStatus::Terminated);

        assert!(matches!(
            engine.contract(ProfileId(2), ContractId(1)).await,
            Err(MarketplaceError::NotFound { entity: "Contract", id: 1 })
        ));
        assert!(matches!(
            engine.contract(ProfileId(1), ContractId(42)).await,
            Err(MarketplaceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unpaid_jobs_follow_active_contracts() {
        let engine = engine_with(sample_data()).await;

        let client_jobs: Vec<_> = engine
            .unpaid_jobs(ProfileId(2))
            .await
            .unwrap()
            .iter()
            .map(|j| j.id().0)
            .collect();
        assert_eq!(client_jobs, vec![3, 4]);

        // Job 1 sits on a terminated contract.
        let contractor_jobs: Vec<_> = engine
            .unpaid_jobs(ProfileId(5))
            .await
            .unwrap()
            .iter()
            .map(|j| j.id().0)
            .collect();
        assert_eq!(contractor_jobs, vec![4]);

        assert_eq!(
            engine.unpaid_jobs_total(ProfileId(2)).await.unwrap(),
            Balance::new(dec!(402))
        );
        assert_eq!(
            engine.unpaid_jobs_total(ProfileId(1)).await.unwrap(),
            Balance::new(dec!(201))
        );
    }

    #[tokio::test]
    async fn test_import_rejects_mismatched_roles_atomically() {
        let engine = engine_with(DataSet::default()).await;
        let data = DataSet {
            profiles: vec![client(1, "Harry", "Potter", dec!(10)), client(2, "Mr", "Robot", dec!(10))],
            contracts: vec![contract(1, ContractStatus::New, 1, 2)],
            jobs: vec![],
        };

        assert!(matches!(
            engine.import(data).await,
            Err(MarketplaceError::ValidationError(_))
        ));
        assert!(matches!(
            engine.profile(ProfileId(1)).await,
            Err(MarketplaceError::Unauthorized(1))
        ));
    }

    #[tokio::test]
    async fn test_import_rejects_dangling_and_duplicate_records() {
        let engine = engine_with(sample_data()).await;

        let dangling = DataSet {
            jobs: vec![job(50, 77, dec!(1))],
            ..DataSet::default()
        };
        assert!(matches!(
            engine.import(dangling).await,
            Err(MarketplaceError::NotFound { entity: "Contract", id: 77 })
        ));

        let duplicate = DataSet {
            profiles: vec![contractor(5, "Musician")],
            ..DataSet::default()
        };
        assert!(matches!(
            engine.import(duplicate).await,
            Err(MarketplaceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_import_links_to_existing_records() {
        let engine = engine_with(sample_data()).await;
        let data = DataSet {
            profiles: vec![],
            contracts: vec![contract(9, ContractStatus::New, 2, 6)],
            jobs: vec![job(9, 9, dec!(12.5))],
        };

        let summary = engine.import(data).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                profiles: 0,
                contracts: 1,
                jobs: 1
            }
        );
        assert_eq!(
            engine.unpaid_jobs_total(ProfileId(2)).await.unwrap(),
            Balance::new(dec!(414.5))
        );
    }
}
