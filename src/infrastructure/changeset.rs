//! Write staging shared by the store adapters.
//!
//! A transaction records its writes here instead of touching the store. At
//! commit the adapter validates the staged versions against what is
//! currently committed, then applies the records returned by
//! [`Staged::into_records`].

use crate::domain::contract::{Contract, ContractId};
use crate::domain::job::{Job, JobId};
use crate::domain::profile::{Profile, ProfileId};
use crate::error::{MarketplaceError, Result};
use std::collections::BTreeMap;

/// A stored record with an id and an optimistic concurrency version.
pub trait Record: Clone + Send + Sync {
    type Id: Ord + Copy + Into<u32> + Send + Sync;
    const ENTITY: &'static str;

    fn record_id(&self) -> Self::Id;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Record for Profile {
    type Id = ProfileId;
    const ENTITY: &'static str = "Profile";

    fn record_id(&self) -> ProfileId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Record for Contract {
    type Id = ContractId;
    const ENTITY: &'static str = "Contract";

    fn record_id(&self) -> ContractId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Record for Job {
    type Id = JobId;
    const ENTITY: &'static str = "Job";

    fn record_id(&self) -> JobId {
        self.id()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[derive(Debug, Clone)]
enum Write<R> {
    Create(R),
    Update(R),
}

impl<R> Write<R> {
    fn record(&self) -> &R {
        match self {
            Self::Create(record) | Self::Update(record) => record,
        }
    }
}

/// Pending writes for one record type.
pub struct Staged<R: Record> {
    writes: BTreeMap<R::Id, Write<R>>,
}

impl<R: Record> Default for Staged<R> {
    fn default() -> Self {
        Self {
            writes: BTreeMap::new(),
        }
    }
}

impl<R: Record> Staged<R> {
    pub fn get(&self, id: R::Id) -> Option<&R> {
        self.writes.get(&id).map(Write::record)
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn create(&mut self, record: R) -> Result<()> {
        let id = record.record_id();
        if self.writes.contains_key(&id) {
            return Err(duplicate::<R>(id));
        }
        self.writes.insert(id, Write::Create(record));
        Ok(())
    }

    pub fn update(&mut self, record: R) {
        let id = record.record_id();
        let write = match self.writes.remove(&id) {
            Some(Write::Create(_)) => Write::Create(record),
            _ => Write::Update(record),
        };
        self.writes.insert(id, write);
    }

    /// Merges committed records with the staged ones, staged winning, and
    /// keeps those matching `keep`, ordered by id.
    pub fn overlay<I, F>(&self, committed: I, keep: F) -> Vec<R>
    where
        I: IntoIterator<Item = R>,
        F: Fn(&R) -> bool,
    {
        let mut merged: BTreeMap<R::Id, R> = committed
            .into_iter()
            .map(|record| (record.record_id(), record))
            .collect();
        for (id, write) in &self.writes {
            merged.insert(*id, write.record().clone());
        }
        merged.into_values().filter(|record| keep(record)).collect()
    }

    /// Checks every staged write against the committed version of its record.
    ///
    /// `current` returns the committed version, or `None` if the id is free.
    pub fn validate<F>(&self, mut current: F) -> Result<()>
    where
        F: FnMut(R::Id) -> Result<Option<u64>>,
    {
        for (id, write) in &self.writes {
            match (write, current(*id)?) {
                (Write::Create(_), None) => {}
                (Write::Create(_), Some(_)) => return Err(duplicate::<R>(*id)),
                (Write::Update(_), None) => {
                    return Err(MarketplaceError::not_found(R::ENTITY, *id));
                }
                (Write::Update(record), Some(version)) if version == record.version() => {}
                (Write::Update(record), Some(version)) => {
                    let raw: u32 = (*id).into();
                    return Err(MarketplaceError::conflict(format!(
                        "{} {raw} changed concurrently (read version {}, now {version})",
                        R::ENTITY,
                        record.version(),
                    )));
                }
            }
        }
        Ok(())
    }

    /// Consumes the staged writes, yielding the records as they must be
    /// stored: created records at version 0, updated ones one version up.
    pub fn into_records(self) -> impl Iterator<Item = R> {
        self.writes.into_values().map(|write| match write {
            Write::Create(mut record) => {
                record.set_version(0);
                record
            }
            Write::Update(mut record) => {
                record.set_version(record.version() + 1);
                record
            }
        })
    }
}

fn duplicate<R: Record>(id: R::Id) -> MarketplaceError {
    let raw: u32 = id.into();
    MarketplaceError::conflict(format!("{} {raw} already exists", R::ENTITY))
}

/// All pending writes of one transaction.
#[derive(Default)]
pub struct Changeset {
    pub profiles: Staged<Profile>,
    pub contracts: Staged<Contract>,
    pub jobs: Staged<Job>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty() && self.contracts.is_empty() && self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.profiles.len() + self.contracts.len() + self.jobs.len()
    }
}
