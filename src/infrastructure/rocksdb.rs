use super::changeset::{Changeset, Record};
use crate::domain::contract::{Contract, ContractId};
use crate::domain::job::{Job, JobId};
use crate::domain::ports::{MarketplaceStore, StoreTransaction, StoreTransactionBox};
use crate::domain::profile::{Profile, ProfileId};
use crate::domain::report::ReportWindow;
use crate::error::{MarketplaceError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing profiles.
pub const CF_PROFILES: &str = "profiles";
/// Column Family for storing contracts.
pub const CF_CONTRACTS: &str = "contracts";
/// Column Family for storing jobs.
pub const CF_JOBS: &str = "jobs";

/// A persistent store implementation using RocksDB.
///
/// Profiles, contracts and jobs live in separate Column Families, keyed by
/// their big-endian id and encoded as JSON. Transactions stage their writes
/// and commit them as one `WriteBatch` while holding the commit lock, so the
/// version check and the write cannot interleave with another commit.
///
/// Clones share the database handle and the commit lock.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens the database at `path`, creating it and any missing column
    /// family on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_PROFILES, CF_CONTRACTS, CF_JOBS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }
}

fn column<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        MarketplaceError::InternalError(Box::new(std::io::Error::other(format!(
            "{name} column family not found"
        ))))
    })
}

fn encode<R: Serialize>(record: &R) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

fn decode<R: DeserializeOwned>(bytes: &[u8]) -> Result<R> {
    Ok(serde_json::from_slice(bytes)?)
}

fn get<R: DeserializeOwned>(db: &DB, cf_name: &str, id: u32) -> Result<Option<R>> {
    let cf = column(db, cf_name)?;
    match db.get_cf(cf, id.to_be_bytes())? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn scan<R: DeserializeOwned>(db: &DB, cf_name: &str) -> Result<Vec<R>> {
    let cf = column(db, cf_name)?;
    let mut records = Vec::new();
    for item in db.iterator_cf(cf, IteratorMode::Start) {
        let (_key, value) = item?;
        records.push(decode(&value)?);
    }
    Ok(records)
}

fn current_version<R: Record + DeserializeOwned>(
    db: &DB,
    cf_name: &str,
    id: R::Id,
) -> Result<Option<u64>> {
    Ok(get::<R>(db, cf_name, id.into())?.map(|record| record.version()))
}

fn put_all<R: Record + Serialize>(
    db: &DB,
    batch: &mut WriteBatch,
    cf_name: &str,
    records: impl Iterator<Item = R>,
) -> Result<()> {
    let cf = column(db, cf_name)?;
    for record in records {
        let key: u32 = record.record_id().into();
        batch.put_cf(cf, key.to_be_bytes(), encode(&record)?);
    }
    Ok(())
}

#[async_trait]
impl MarketplaceStore for RocksDBStore {
    async fn begin(&self) -> Result<StoreTransactionBox> {
        Ok(Box::new(RocksDBTransaction {
            store: self.clone(),
            changes: Changeset::default(),
        }))
    }
}

pub struct RocksDBTransaction {
    store: RocksDBStore,
    changes: Changeset,
}

impl RocksDBTransaction {
    fn ensure_absent(&self, cf_name: &str, entity: &str, id: u32) -> Result<()> {
        let cf = column(&self.store.db, cf_name)?;
        if self.store.db.get_pinned_cf(cf, id.to_be_bytes())?.is_some() {
            return Err(MarketplaceError::conflict(format!(
                "{entity} {id} already exists"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for RocksDBTransaction {
    async fn find_profile(&self, id: ProfileId) -> Result<Option<Profile>> {
        if let Some(profile) = self.changes.profiles.get(id) {
            return Ok(Some(profile.clone()));
        }
        get(&self.store.db, CF_PROFILES, id.0)
    }

    async fn find_contract(&self, id: ContractId) -> Result<Option<Contract>> {
        if let Some(contract) = self.changes.contracts.get(id) {
            return Ok(Some(contract.clone()));
        }
        get(&self.store.db, CF_CONTRACTS, id.0)
    }

    async fn find_job(&self, id: JobId) -> Result<Option<Job>> {
        if let Some(job) = self.changes.jobs.get(id) {
            return Ok(Some(job.clone()));
        }
        get(&self.store.db, CF_JOBS, id.0)
    }

    async fn contracts_involving(&self, profile: ProfileId) -> Result<Vec<Contract>> {
        let committed: Vec<Contract> = scan(&self.store.db, CF_CONTRACTS)?;
        Ok(self
            .changes
            .contracts
            .overlay(committed, |contract| contract.involves(profile)))
    }

    async fn jobs_of_contract(&self, contract: ContractId) -> Result<Vec<Job>> {
        let committed: Vec<Job> = scan(&self.store.db, CF_JOBS)?;
        Ok(self
            .changes
            .jobs
            .overlay(committed, |job| job.contract_id() == contract))
    }

    async fn jobs_paid_within(&self, window: ReportWindow) -> Result<Vec<Job>> {
        let committed: Vec<Job> = scan(&self.store.db, CF_JOBS)?;
        Ok(self.changes.jobs.overlay(committed, |job| {
            job.paid_between(window.start(), window.end())
        }))
    }

    async fn create_profile(&mut self, profile: Profile) -> Result<()> {
        self.ensure_absent(CF_PROFILES, Profile::ENTITY, profile.id.0)?;
        self.changes.profiles.create(profile)
    }

    async fn create_contract(&mut self, contract: Contract) -> Result<()> {
        self.ensure_absent(CF_CONTRACTS, Contract::ENTITY, contract.id.0)?;
        self.changes.contracts.create(contract)
    }

    async fn create_job(&mut self, job: Job) -> Result<()> {
        self.ensure_absent(CF_JOBS, Job::ENTITY, job.id().0)?;
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

        let store = self.store.clone();
        let _guard = store.commit_lock.lock().await;
        let db = store.db.as_ref();

        let validated = changes
            .profiles
            .validate(|id| current_version::<Profile>(db, CF_PROFILES, id))
            .and_then(|()| {
                changes
                    .contracts
                    .validate(|id| current_version::<Contract>(db, CF_CONTRACTS, id))
            })
            .and_then(|()| {
                changes
                    .jobs
                    .validate(|id| current_version::<Job>(db, CF_JOBS, id))
            });
        if let Err(err) = validated {
            tracing::warn!(%err, writes, "rejected rocksdb commit");
            return Err(err);
        }

        let mut batch = WriteBatch::default();
        put_all(db, &mut batch, CF_PROFILES, changes.profiles.into_records())?;
        put_all(db, &mut batch, CF_CONTRACTS, changes.contracts.into_records())?;
        put_all(db, &mut batch, CF_JOBS, changes.jobs.into_records())?;
        db.write(batch)?;

        tracing::debug!(writes, "committed rocksdb transaction");
        Ok(())
    }
}

impl Drop for RocksDBTransaction {
    fn drop(&mut self) {
        if !self.changes.is_empty() {
            tracing::debug!(
                discarded = self.changes.len(),
                "rolled back rocksdb transaction"
            );
        }
    }
}
